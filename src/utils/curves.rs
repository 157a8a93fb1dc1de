//! Helpers for open polylines (curves)
use geo::{Closest, ClosestPoint, Simplify};
use itertools::Itertools;

use crate::utils::polygon::to_line_string;
use crate::utils::{euclidean_distance, Point};

/// Total length of a polyline
pub fn curve_length(points: &[Point]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| euclidean_distance(a, b))
        .sum()
}

/// Length of a closed ring (the closing segment is implied)
pub fn ring_length(points: &[Point]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 => {
            curve_length(points) + euclidean_distance(last, first)
        }
        _ => 0.0,
    }
}

pub fn translate_points(points: &[Point], dx: f64, dy: f64) -> Vec<Point> {
    points.iter().map(|p| p.translate(dx, dy)).collect()
}

/// Ramer-Douglas-Peucker simplification of an open polyline.
/// End points are always kept.
pub fn simplify_curve(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    to_line_string(points)
        .simplify(&tolerance)
        .coords()
        .map(|&c| Point::from(c))
        .collect()
}

/// Douglas-Peucker simplification of a closed ring given without repeated end point
pub fn simplify_ring(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 4 {
        return points.to_vec();
    }
    let mut closed = points.to_vec();
    closed.push(points[0]);
    let mut simplified = simplify_curve(&closed, tolerance);
    simplified.pop();
    simplified
}

/// Resamples a polyline such that consecutive points have (roughly) the given
/// spacing. The first and the last point are kept.
pub fn make_curve_equidistant(points: &[Point], spacing: f64) -> Vec<Point> {
    if points.len() < 2 || spacing <= 0.0 {
        return points.to_vec();
    }
    let mut cumulative = Vec::with_capacity(points.len());
    cumulative.push(0.0);
    for (a, b) in points.iter().tuple_windows() {
        let last = *cumulative.last().unwrap_or(&0.0);
        cumulative.push(last + euclidean_distance(a, b));
    }
    let length = *cumulative.last().unwrap_or(&0.0);
    if length == 0.0 {
        return vec![points[0]];
    }
    let segments = usize::max(1, (length / spacing).round() as usize);

    let mut result = Vec::with_capacity(segments + 1);
    let mut seg = 0;
    for k in 0..=segments {
        let s = length * k as f64 / segments as f64;
        while seg < points.len() - 2 && cumulative[seg + 1] < s {
            seg += 1;
        }
        let seg_len = cumulative[seg + 1] - cumulative[seg];
        let t = if seg_len == 0.0 {
            0.0
        } else {
            ((s - cumulative[seg]) / seg_len).clamp(0.0, 1.0)
        };
        let (a, b) = (points[seg], points[seg + 1]);
        result.push(Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
    }
    result
}

/// Resamples a closed ring. The result does not repeat its first point.
pub fn make_ring_equidistant(points: &[Point], spacing: f64) -> Vec<Point> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let mut closed = points.to_vec();
    closed.push(points[0]);
    let mut result = make_curve_equidistant(&closed, spacing);
    if result.len() > 1 {
        result.pop();
    }
    result
}

/// Closest point to `p` on a polyline along with its distance
pub fn nearest_point_on_curve(curve: &[Point], p: &Point) -> Option<(Point, f64)> {
    let closest = match curve {
        [] => return None,
        [q] => *q,
        _ => match to_line_string(curve).closest_point(&geo::Point::from(*p)) {
            Closest::Intersection(q) | Closest::SinglePoint(q) => q.into(),
            Closest::Indeterminate => return None,
        },
    };
    Some((closest, euclidean_distance(&closest, p)))
}

/// Projection of `p` onto a polyline. Returns `p` itself for an empty curve.
pub fn get_projection_point(curve: &[Point], p: &Point) -> Point {
    nearest_point_on_curve(curve, p).map_or(*p, |(q, _)| q)
}

/// Distance of `p` to a polyline (infinite for an empty curve)
pub fn curve_distance(curve: &[Point], p: &Point) -> f64 {
    nearest_point_on_curve(curve, p).map_or(f64::INFINITY, |(_, d)| d)
}
