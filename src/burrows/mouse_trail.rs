use crate::ground::GroundProfile;
use crate::params::ObjectParams;
use crate::utils::curves::curve_length;
use crate::utils::{euclidean_distance, Point};

/// Polyline from the ground to the current position of an object that moves
/// underground. It is the path the object took through its burrow, shortened
/// whenever the object turns back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseTrail {
    points: Vec<Point>,
}

impl MouseTrail {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn points(&self) -> &[Point] {
        &self.points
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn length(&self) -> f64 {
        curve_length(&self.points)
    }
    pub fn reset(&mut self) {
        self.points.clear();
    }
    /// Follows the object to `position`.
    ///
    /// Unknown positions and positions above ground reset the trail. Returns
    /// the distance along the trail (or straight to the ground) for
    /// positions underground.
    ///
    /// Basic usage:
    ///
    /// ```
    /// use burrow_track::burrows::MouseTrail;
    /// use burrow_track::ground::GroundProfile;
    /// use burrow_track::params::ObjectParams;
    /// use burrow_track::utils::Point;
    ///
    /// let ground = GroundProfile::new(vec![Point::new(0.0, 50.0), Point::new(200.0, 50.0)]).unwrap();
    /// let mut trail = MouseTrail::new();
    /// trail.update(Some(Point::new(100.0, 70.0)), &ground, &ObjectParams::default());
    /// assert_eq!(trail.points(), &[Point::new(100.0, 50.0), Point::new(100.0, 70.0)]);
    /// ```
    pub fn update(&mut self, position: Option<Point>, ground: &GroundProfile, params: &ObjectParams) -> Option<f64> {
        let position = match position {
            Some(p) if p.is_finite() => p,
            _ => {
                self.reset();
                return None;
            }
        };
        if position.y <= ground.get_y(position.x) + 0.5 * params.model_radius {
            self.reset();
            return None;
        }
        self.extend(position, ground, params)
    }
    /// Extends the trail by an underground position
    pub fn extend(&mut self, position: Point, ground: &GroundProfile, params: &ObjectParams) -> Option<f64> {
        let spacing = params.model_radius;

        // the object went back, forget the part in front of it
        if let Some(i) = self
            .points
            .iter()
            .position(|p| euclidean_distance(p, &position) < spacing)
        {
            self.points.truncate(i);
        }

        if let Some(first) = self.points.first_mut() {
            *first = ground.projection(first);
            if let Some(last) = self.points.last().copied() {
                if euclidean_distance(&last, &position) > spacing {
                    self.points.push(last.midpoint(&position));
                }
            }
            self.points.push(position);
            return Some(self.length());
        }

        // objects appearing deep underground do not start a trail
        let ground_point = ground.projection(&position);
        let ground_distance = euclidean_distance(&ground_point, &position);
        if ground_distance < params.speed_max {
            self.points = vec![ground_point, position];
        }
        Some(ground_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::flat_ground;

    #[test]
    fn test_trail_follows_object() {
        let params = ObjectParams::default();
        let ground = flat_ground();
        let mut trail = MouseTrail::new();

        // close to the ground surface
        assert_eq!(trail.update(Some(Point::new(100.0, 52.0)), &ground, &params), None);
        assert!(trail.is_empty());

        assert_eq!(trail.update(Some(Point::new(100.0, 70.0)), &ground, &params), Some(20.0));
        assert_eq!(trail.update(Some(Point::new(100.0, 85.0)), &ground, &params), Some(35.0));
        assert_eq!(
            trail.points(),
            &[
                Point::new(100.0, 50.0),
                Point::new(100.0, 70.0),
                Point::new(100.0, 77.5),
                Point::new(100.0, 85.0)
            ]
        );

        // turning back drops everything from the first close point on
        trail.update(Some(Point::new(100.0, 72.0)), &ground, &params);
        assert_eq!(
            trail.points(),
            &[Point::new(100.0, 50.0), Point::new(100.0, 61.0), Point::new(100.0, 72.0)]
        );
        assert!((trail.length() - 22.0).abs() < 1e-9);

        trail.update(None, &ground, &params);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_no_trail_deep_underground() {
        let params = ObjectParams::default();
        let ground = flat_ground();
        let mut trail = MouseTrail::new();
        assert_eq!(trail.update(Some(Point::new(100.0, 120.0)), &ground, &params), Some(70.0));
        assert!(trail.is_empty());
        trail.update(Some(Point::new(f64::NAN, 120.0)), &ground, &params);
        assert!(trail.is_empty());
    }
}
