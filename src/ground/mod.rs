//! Export contents of `ground` folder
mod ground_profile;

pub use self::ground_profile::*;
