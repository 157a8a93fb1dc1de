use thiserror::Error;

/// Reasons a ring of points cannot form a burrow
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BurrowError {
    #[error("a burrow outline needs at least three points, got {0}")]
    TooFewPoints(usize),
    #[error("burrow outline encloses no area")]
    ZeroArea,
    #[error("burrow outline intersects itself")]
    SelfIntersecting,
    #[error("burrow outline has non-finite coordinates")]
    NonFinite,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("mask does not contain any region")]
    EmptyMask,
    #[error("region area {area} is below the minimum of {min}")]
    AreaTooSmall { area: f64, min: f64 },
    #[error("outline degenerated to {0} points")]
    DegeneratePolygon(usize),
    #[error("invalid contour: {0}")]
    InvalidContour(#[from] BurrowError),
}

/// Failures of the refinement steps. They never end a pass, the caller keeps
/// the unrefined burrow instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefinementError {
    #[error("refinement failed: {0}")]
    RefinementFailed(String),
    #[error("segmentation failed: {0}")]
    SegmentationError(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
