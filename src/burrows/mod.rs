//! Export contents of `burrows` folder
mod burrow;
mod centerline;
mod errors;
mod explored_area;
mod extraction;
mod lifecycle;
mod mouse_trail;
mod refinement;
mod segmentation;

pub use self::{
    burrow::*,
    centerline::*,
    errors::*,
    explored_area::*,
    extraction::*,
    lifecycle::*,
    mouse_trail::*,
    refinement::*,
    segmentation::*,
};
