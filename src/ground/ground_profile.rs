use image::GrayImage;
use serde::Serialize;
use thiserror::Error;

use crate::utils::curves::{curve_distance, curve_length, get_projection_point, translate_points};
use crate::utils::raster::polygon_mask;
use crate::utils::Point;

#[derive(Debug, Error, PartialEq)]
pub enum GroundError {
    #[error("a ground profile needs at least two points, got {0}")]
    TooFewPoints(usize),
    #[error("ground profile points are not sorted by x at index {index}")]
    Unsorted { index: usize },
}

/// Polyline separating the sky (above) from the ground (below). The image y
/// axis points down, so "below the ground" means a larger y value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundProfile {
    points: Vec<Point>,
}

impl GroundProfile {
    /// Creates a profile from points with strictly increasing x
    ///
    /// Basic usage:
    ///
    /// ```
    /// use burrow_track::ground::GroundProfile;
    /// use burrow_track::utils::Point;
    /// let ground = GroundProfile::new(vec![Point::new(0.0, 50.0), Point::new(100.0, 70.0)]).unwrap();
    /// assert_eq!(ground.get_y(50.0), 60.0);
    /// ```
    pub fn new(points: Vec<Point>) -> Result<Self, GroundError> {
        if points.len() < 2 {
            return Err(GroundError::TooFewPoints(points.len()));
        }
        if let Some(index) = (1..points.len()).find(|&k| points[k].x <= points[k - 1].x) {
            return Err(GroundError::Unsorted { index });
        }
        Ok(GroundProfile { points })
    }
    pub fn points(&self) -> &[Point] {
        &self.points
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    /// Ground height at `x`, interpolated linearly and held constant beyond the ends
    pub fn get_y(&self, x: f64) -> f64 {
        let n = self.points.len();
        if x <= self.points[0].x {
            return self.points[0].y;
        }
        if x >= self.points[n - 1].x {
            return self.points[n - 1].y;
        }
        // first point right of x
        let k = self.points.partition_point(|p| p.x <= x);
        let (a, b) = (self.points[k - 1], self.points[k]);
        a.y + (x - a.x) / (b.x - a.x) * (b.y - a.y)
    }
    pub fn length(&self) -> f64 {
        curve_length(&self.points)
    }
    /// Height halfway between the highest and the lowest ground point
    pub fn midline(&self) -> f64 {
        let (y_min, y_max) = self
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        0.5 * (y_min + y_max)
    }
    pub fn distance(&self, p: &Point) -> f64 {
        curve_distance(&self.points, p)
    }
    pub fn projection(&self, p: &Point) -> Point {
        get_projection_point(&self.points, p)
    }
    /// Whether `p` lies above the ground line
    pub fn is_above(&self, p: &Point) -> bool {
        p.y < self.get_y(p.x)
    }
    /// Index of the profile point closest to `p`
    pub fn nearest_index(&self, p: &Point) -> usize {
        self.points
            .iter()
            .enumerate()
            .map(|(k, q)| (k, (q.x - p.x).powi(2) + (q.y - p.y).powi(2)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(k, _)| k)
    }
    pub fn translated(&self, dx: f64, dy: f64) -> GroundProfile {
        GroundProfile {
            points: translate_points(&self.points, dx, dy),
        }
    }
    /// Closed polygon of the region below the profile inside a frame of the given size
    pub fn polygon_points(&self, width: u32, height: u32) -> Vec<Point> {
        let (w, h) = (width as f64, height as f64);
        let mut points = Vec::with_capacity(self.points.len() + 4);
        points.push(Point::new(0.0, self.get_y(0.0)));
        points.extend(self.points.iter().filter(|p| p.x > 0.0 && p.x < w).copied());
        points.push(Point::new(w, self.get_y(w)));
        points.push(Point::new(w, h));
        points.push(Point::new(0.0, h));
        points
    }
    /// Binary mask that is set below the ground line
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        polygon_mask(&self.polygon_points(width, height), width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::flat_ground;
    use crate::utils::polygon::area;
    use crate::utils::raster::is_set;

    #[test]
    fn test_rejects_bad_points() {
        assert_eq!(
            GroundProfile::new(vec![Point::new(0.0, 0.0)]),
            Err(GroundError::TooFewPoints(1))
        );
        let points = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 5.0)];
        assert_eq!(GroundProfile::new(points), Err(GroundError::Unsorted { index: 2 }));
    }

    #[test]
    fn test_get_y() {
        let ground = GroundProfile::new(vec![
            Point::new(10.0, 40.0),
            Point::new(20.0, 60.0),
            Point::new(40.0, 60.0),
        ])
        .unwrap();
        assert_eq!(ground.get_y(0.0), 40.0);
        assert_eq!(ground.get_y(15.0), 50.0);
        assert_eq!(ground.get_y(20.0), 60.0);
        assert_eq!(ground.get_y(100.0), 60.0);
        assert_eq!(ground.midline(), 50.0);
        assert!(ground.is_above(&Point::new(15.0, 45.0)));
        assert!(!ground.is_above(&Point::new(15.0, 55.0)));
    }

    #[test]
    fn test_projection_and_distance() {
        let ground = flat_ground();
        assert_eq!(ground.projection(&Point::new(33.0, 80.0)), Point::new(33.0, 50.0));
        assert_eq!(ground.distance(&Point::new(33.0, 80.0)), 30.0);
        assert_eq!(ground.length(), 200.0);
        assert_eq!(ground.nearest_index(&Point::new(33.0, 80.0)), 3);
        assert_eq!(ground.translated(-10.0, -5.0).get_y(0.0), 45.0);
    }

    #[test]
    fn test_polygon_and_mask() {
        let ground = flat_ground();
        let polygon = ground.polygon_points(200, 100);
        assert!((area(&polygon) - 200.0 * 50.0).abs() < 1e-9);
        let mask = ground.mask(200, 100);
        assert!(!is_set(&mask, 100, 49));
        assert!(is_set(&mask, 100, 50));
        assert!(is_set(&mask, 100, 99));
    }
}
