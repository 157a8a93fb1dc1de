//! Export contents of `utils` folder
mod utils;
pub mod curves;
pub mod polygon;
pub mod raster;

pub use self::utils::*;
