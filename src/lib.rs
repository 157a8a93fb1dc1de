//! Tracking of moving objects and burrow regions across the frames of an
//! ant-farm style video.
//!
//! The crate exposes two engines that are combined by [`pass::FramePass`]:
//! - [`mot`]: greedy frame-to-frame assignment of moving blobs to tracks
//! - [`burrows`]: extraction, centerline computation, refinement and
//!   lifecycle management of burrow polygons
pub mod burrows;
pub mod context;
pub mod ground;
pub mod mot;
pub mod params;
pub mod pass;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_data;
