//! Export contents of `mot` folder
mod assignment;
mod blob;
mod moving_object;
mod mot_errors;
mod object_tracker;
mod simple_queue;
mod track;

pub use self::{
    assignment::*,
    blob::*,
    moving_object::*,
    mot_errors::*,
    object_tracker::*,
    simple_queue::*,
    track::*,
};
