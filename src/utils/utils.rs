use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(_x: f64, _y: f64, _width: f64, _height: f64) -> Self {
        Rect {
            x: _x,
            y: _y,
            width: _width,
            height: _height,
        }
    }
    /// Smallest rectangle holding all points. Empty input gives a zero rectangle.
    pub fn bounding(points: &[Point]) -> Self {
        if points.is_empty() {
            return Rect::default();
        }
        let mut x_min = f64::INFINITY;
        let mut y_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for p in points {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }
        Rect::new(x_min, y_min, x_max - x_min, y_max - y_min)
    }
    /// Grows the rectangle by `margin` on every side
    pub fn expanded(&self, margin: f64) -> Self {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x <= self.x + self.width && p.y <= self.y + self.height
    }
    /// Corner points in clockwise image order (y pointing down)
    pub fn corners(&self) -> Vec<Point> {
        vec![
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(_x: f64, _y: f64) -> Self {
        Point { x: _x, y: _y }
    }
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Point::new(self.x + dx, self.y + dy)
    }
    /// Point at `distance` from `self` in direction `angle` (radians)
    pub fn polar_offset(&self, distance: f64, angle: f64) -> Self {
        Point::new(
            self.x + distance * angle.cos(),
            self.y + distance * angle.sin(),
        )
    }
    pub fn midpoint(&self, other: &Point) -> Self {
        Point::new(0.5 * (self.x + other.x), 0.5 * (self.y + other.y))
    }
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        geo::Coord { x: p.x, y: p.y }
    }
}

impl From<geo::Coord<f64>> for Point {
    fn from(c: geo::Coord<f64>) -> Self {
        Point::new(c.x, c.y)
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(p: Point) -> Self {
        geo::Point::new(p.x, p.y)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(p: geo::Point<f64>) -> Self {
        Point::new(p.x(), p.y())
    }
}

pub fn euclidean_distance(p1: &Point, p2: &Point) -> f64 {
    let x_squared = (p1.x - p2.x).powi(2);
    let y_squared = (p1.y - p2.y).powi(2);
    f64::sqrt(x_squared + y_squared)
}

/// Mean of a set of points, `None` for an empty set
pub fn mean_point(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}
