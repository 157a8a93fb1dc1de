use thiserror::Error;

use crate::ground::GroundError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("bad parameter: {0}")]
    BadParameter(String),
    #[error("frame {new} does not come after the last frame {last} of the track")]
    NonIncreasingFrame { last: usize, new: usize },
    #[error("no such object in tracker: {0}")]
    NoObject(String),
    #[error(transparent)]
    Ground(#[from] GroundError),
}
