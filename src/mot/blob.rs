use crate::utils::Point;

/// Common interface for everything stored in a [`Track`](crate::mot::Track).
/// Enables the generic containers `Track<B: Blob>` and `TrackList<B: Blob>`
///
/// Implementations:
/// - `MovingObject` - a moving blob (position = center of mass, size = area)
/// - `Burrow` - a burrow polygon (position = centroid, size = area)
pub trait Blob: Clone {
    /* Position and geometry */
    fn get_center(&self) -> Point;
    fn get_size(&self) -> f64;
}
