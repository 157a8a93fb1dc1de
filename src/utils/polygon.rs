//! Helpers for simple polygons given as rings of points, on top of `geo`.
//!
//! Rings never repeat their first point at the end. Orientation is not
//! normalized; functions that depend on it use the absolute area.
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
    Area, BooleanOps, Centroid, Closest, ClosestPoint, Contains, ConvexHull, Coord, Intersects, Line, LineString,
    MultiPoint, MultiPolygon, Polygon, SimplifyVw,
};

use crate::utils::{euclidean_distance, Point, Rect};

const EPS: f64 = 1e-9;
/// Vertices of the half circles closing a buffered segment
const BUFFER_ARC_POINTS: usize = 16;

pub fn to_line_string(points: &[Point]) -> LineString<f64> {
    points.iter().map(|&p| Coord::from(p)).collect()
}

/// Polygon without holes; the ring is closed by `geo`
pub fn to_polygon(points: &[Point]) -> Polygon<f64> {
    Polygon::new(to_line_string(points), vec![])
}

/// Points of a ring without the closing point
pub fn ring_points(ring: &LineString<f64>) -> Vec<Point> {
    let mut points: Vec<Point> = ring.coords().map(|&c| Point::from(c)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Iterates over the segments of a polyline, including the closing segment for rings
pub fn edges(points: &[Point], closed: bool) -> impl Iterator<Item = Line<f64>> + '_ {
    let n = points.len();
    let count = match (closed, n) {
        (_, 0) | (_, 1) => 0,
        (true, _) => n,
        (false, _) => n - 1,
    };
    (0..count).map(move |k| Line::new(points[k], points[(k + 1) % n]))
}

/// Shoelace area, positive for clockwise rings in image coordinates
pub fn signed_area(points: &[Point]) -> f64 {
    to_polygon(points).signed_area()
}

pub fn area(points: &[Point]) -> f64 {
    to_polygon(points).unsigned_area()
}

/// Center of mass of the enclosed region. Degenerate rings give the center
/// of their outline.
pub fn centroid(points: &[Point]) -> Option<Point> {
    to_polygon(points).centroid().map(Point::from)
}

/// Whether the closed segments `p1`-`p2` and `q1`-`q2` share at least one point
pub fn segments_intersect(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    Line::new(*p1, *p2).intersects(&Line::new(*q1, *q2))
}

/// Points shared by two segments: the crossing, or both ends of a common
/// collinear piece
fn shared_points(a: Line<f64>, b: Line<f64>) -> Vec<Point> {
    match line_intersection(a, b) {
        Some(LineIntersection::SinglePoint { intersection, .. }) => vec![intersection.into()],
        Some(LineIntersection::Collinear { intersection }) => {
            vec![intersection.start.into(), intersection.end.into()]
        }
        None => Vec::new(),
    }
}

/// Position of `p` along the segment as a fraction of its length
fn fraction_along(segment: &Line<f64>, p: &Point) -> f64 {
    let (d, len2) = (segment.delta(), segment.dx().powi(2) + segment.dy().powi(2));
    if len2 == 0.0 {
        return 0.0;
    }
    (((p.x - segment.start.x) * d.x + (p.y - segment.start.y) * d.y) / len2).clamp(0.0, 1.0)
}

/// Point where two segments meet, if they do. Overlapping collinear segments
/// give the first shared point along `p1`-`p2`.
pub fn segment_intersection(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> Option<Point> {
    let segment = Line::new(*p1, *p2);
    shared_points(segment, Line::new(*q1, *q2))
        .into_iter()
        .min_by(|a, b| fraction_along(&segment, a).total_cmp(&fraction_along(&segment, b)))
}

/// Point in polygon test. Points on the outline are not contained.
pub fn contains_point(points: &[Point], p: &Point) -> bool {
    points.len() >= 3 && to_polygon(points).contains(&geo::Point::from(*p))
}

/// First point where the segment from `start` to `end` hits the outline
/// (closest to `start`)
pub fn get_ray_hitpoint(start: &Point, end: &Point, outline: &[Point], closed: bool) -> Option<Point> {
    let ray = Line::new(*start, *end);
    edges(outline, closed)
        .flat_map(|edge| shared_points(ray, edge))
        .min_by(|a, b| euclidean_distance(start, a).total_cmp(&euclidean_distance(start, b)))
}

/// Length that is guaranteed to carry a ray from `origin` past every point of `outline`
fn ray_reach(origin: &Point, outline: &[Point]) -> f64 {
    let rect = Rect::bounding(outline);
    let corner_dist = rect
        .corners()
        .iter()
        .map(|c| euclidean_distance(c, origin))
        .fold(0.0, f64::max);
    2.0 * corner_dist + 1.0
}

/// Casts rays from `origin` in every given direction and returns the first
/// hit of each ray with the outline
pub fn get_ray_intersections(
    origin: &Point,
    angles: &[f64],
    outline: &[Point],
    closed: bool,
) -> Vec<Option<Point>> {
    let reach = ray_reach(origin, outline);
    angles
        .iter()
        .map(|&angle| {
            let end = origin.polar_offset(reach, angle);
            get_ray_hitpoint(origin, &end, outline, closed)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Point,
    pub distance: f64,
    pub angle: f64,
}

/// Casts rays from `origin` and returns the hit that is farthest away.
/// Ties keep the earliest angle.
pub fn get_farthest_ray_intersection(
    origin: &Point,
    angles: &[f64],
    outline: &[Point],
    closed: bool,
) -> Option<RayHit> {
    let hits = get_ray_intersections(origin, angles, outline, closed);
    let mut best: Option<RayHit> = None;
    for (hit, &angle) in hits.into_iter().zip(angles) {
        let Some(point) = hit else { continue };
        let distance = euclidean_distance(origin, &point);
        if best.map_or(true, |b| distance > b.distance) {
            best = Some(RayHit { point, distance, angle });
        }
    }
    best
}

/// Evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![start],
        _ => (0..count)
            .map(|k| start + (end - start) * k as f64 / (count - 1) as f64)
            .collect(),
    }
}

/// Finds the first pair of non-adjacent ring edges that touch each other
fn find_self_intersection(points: &[Point]) -> Option<(usize, usize)> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let lines: Vec<Line<f64>> = edges(points, true).collect();
    for i in 0..n {
        for j in i + 2..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if lines[i].intersects(&lines[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Whether the ring is a simple polygon (no edge touches a non-adjacent one)
pub fn is_simple(points: &[Point]) -> bool {
    points.len() >= 3 && find_self_intersection(points).is_none()
}

/// Whether two polygons share any point
pub fn polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    to_polygon(a).intersects(&to_polygon(b))
}

fn closest_distance<G: ClosestPoint<f64>>(geometry: &G, p: &Point) -> f64 {
    match geometry.closest_point(&geo::Point::from(*p)) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(q) => euclidean_distance(p, &q.into()),
        Closest::Indeterminate => f64::INFINITY,
    }
}

/// Distance between a polygon and a polyline, zero if they overlap
pub fn polygon_curve_distance(polygon: &[Point], curve: &[Point]) -> f64 {
    if polygon.is_empty() || curve.is_empty() {
        return f64::INFINITY;
    }
    let shape = to_polygon(polygon);
    let line = to_line_string(curve);
    if curve.iter().any(|p| shape.intersects(&geo::Point::from(*p))) || shape.intersects(&line) {
        return 0.0;
    }
    let to_outline = curve.iter().map(|p| closest_distance(shape.exterior(), p));
    let to_curve = polygon.iter().map(|p| closest_distance(&line, p));
    to_outline.chain(to_curve).fold(f64::INFINITY, f64::min)
}

/// Visvalingam-Whyatt simplification: removes vertices whose removal changes
/// the enclosed area by less than `threshold`. The first vertex and at least
/// three vertices remain.
pub fn simplify_contour(points: &[Point], threshold: f64) -> Vec<Point> {
    if points.len() <= 3 {
        return points.to_vec();
    }
    ring_points(to_polygon(points).simplify_vw(&threshold).exterior())
}

/// Drops repeated points and vertices that lie on a straight line with their
/// neighbours (this includes spikes that double back on themselves)
fn remove_degenerate_vertices(points: &mut Vec<Point>) {
    points.dedup_by(|a, b| euclidean_distance(a, b) < EPS);
    while points.len() > 1 && euclidean_distance(&points[0], &points[points.len() - 1]) < EPS {
        points.pop();
    }
    loop {
        let n = points.len();
        if n < 3 {
            return;
        }
        let degenerate = (0..n).find(|&k| {
            let (prev, cur, next) = (points[(k + n - 1) % n], points[k], points[(k + 1) % n]);
            let cross = (cur.x - prev.x) * (next.y - prev.y) - (cur.y - prev.y) * (next.x - prev.x);
            let scale = euclidean_distance(&prev, &cur) * euclidean_distance(&cur, &next);
            cross.abs() <= EPS * scale.max(1.0) || euclidean_distance(&prev, &cur) < EPS
        });
        match degenerate {
            Some(k) => {
                points.remove(k);
            }
            None => return,
        }
    }
}

/// Turns an arbitrary ring into a simple polygon by removing degenerate
/// vertices and cutting off the smaller loop at every self intersection.
/// Returns an empty vector if nothing with a positive area is left.
pub fn regularize_contour_points(points: &[Point]) -> Vec<Point> {
    regularize_with_budget(points, 2 * points.len())
}

/// Like [`regularize_contour_points`], but gives up after `max_cuts` loops
/// were cut off. The ring returned then may still intersect itself.
pub fn regularize_with_budget(points: &[Point], max_cuts: usize) -> Vec<Point> {
    let mut contour: Vec<Point> = points.iter().copied().filter(Point::is_finite).collect();
    remove_degenerate_vertices(&mut contour);
    let mut cuts = 0;
    while let Some((i, j)) = find_self_intersection(&contour) {
        if cuts == max_cuts {
            break;
        }
        cuts += 1;
        let n = contour.len();
        let (a1, a2) = (contour[i], contour[(i + 1) % n]);
        let (b1, b2) = (contour[j], contour[(j + 1) % n]);
        let cut = segment_intersection(&a1, &a2, &b1, &b2).unwrap_or(b1);

        let mut inner = vec![cut];
        inner.extend_from_slice(&contour[i + 1..=j]);
        let mut outer = vec![cut];
        outer.extend(contour[j + 1..].iter().chain(contour[..=i].iter()).copied());

        contour = if area(&inner) > area(&outer) { inner } else { outer };
        remove_degenerate_vertices(&mut contour);
    }
    if contour.len() < 3 || area(&contour) < EPS {
        return Vec::new();
    }
    contour
}

fn lerp(a: &Point, b: &Point, t: f64) -> Point {
    Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

/// Pieces of a polyline running inside the polygon, in the order of the polyline
pub fn clip_curve(curve: &[Point], polygon: &[Point]) -> Vec<Vec<Point>> {
    let shape = to_polygon(polygon);
    let mut pieces: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for segment in edges(curve, false) {
        let (a, b) = (Point::from(segment.start), Point::from(segment.end));
        let mut ts = vec![0.0, 1.0];
        ts.extend(
            edges(polygon, true)
                .flat_map(|edge| shared_points(segment, edge))
                .map(|p| fraction_along(&segment, &p)),
        );
        ts.sort_by(|x, y| x.total_cmp(y));
        ts.dedup_by(|x, y| (*x - *y).abs() < EPS);
        for w in ts.windows(2) {
            let (start, end) = (lerp(&a, &b, w[0]), lerp(&a, &b, w[1]));
            let middle = lerp(&a, &b, 0.5 * (w[0] + w[1]));
            if shape.contains(&geo::Point::from(middle)) {
                let connected = current
                    .last()
                    .map_or(false, |last| euclidean_distance(last, &start) < EPS);
                if !connected {
                    if !current.is_empty() {
                        pieces.push(std::mem::take(&mut current));
                    }
                    current.push(start);
                }
                current.push(end);
            } else if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn usable(points: &[Point]) -> bool {
    points.len() >= 3 && points.iter().all(Point::is_finite)
}

/// Outline of the part with the largest area, regularized
fn largest_part(parts: MultiPolygon<f64>) -> Vec<Point> {
    parts
        .into_iter()
        .map(|part| (part.unsigned_area(), part))
        .fold(None, |best: Option<(f64, Polygon<f64>)>, (a, part)| match best {
            Some(b) if b.0 >= a => Some(b),
            _ => Some((a, part)),
        })
        .map(|(_, part)| regularize_contour_points(&ring_points(part.exterior())))
        .unwrap_or_default()
}

/// Outline of the union of the polygons. Disjoint parts are dropped except
/// for the largest one, holes are filled. The result never encloses less
/// area than the largest input.
pub fn union_polygons(polygons: &[&[Point]]) -> Vec<Point> {
    let inputs: Vec<&[Point]> = polygons.iter().copied().filter(|p| usable(p)).collect();
    let Some(largest_input) = inputs.iter().copied().max_by(|a, b| area(a).total_cmp(&area(b))) else {
        return Vec::new();
    };
    let union = inputs
        .iter()
        .fold(MultiPolygon::new(vec![]), |acc, p| acc.union(&MultiPolygon::new(vec![to_polygon(p)])));
    let outline = largest_part(union);
    // coordinates are snapped by the boolean operation
    if area(&outline) < area(largest_input) {
        return regularize_contour_points(largest_input);
    }
    outline
}

/// Outline of the largest part of the intersection of two polygons, empty if
/// they do not overlap
pub fn intersect_polygons(a: &[Point], b: &[Point]) -> Vec<Point> {
    if !usable(a) || !usable(b) {
        return Vec::new();
    }
    largest_part(to_polygon(a).intersection(&to_polygon(b)))
}

/// Convex hull of the disks of the given radius around both ends of a segment
fn capsule(a: &Point, b: &Point, radius: f64) -> Polygon<f64> {
    let step = std::f64::consts::TAU / (2 * BUFFER_ARC_POINTS) as f64;
    let points: Vec<geo::Point<f64>> = [a, b]
        .iter()
        .flat_map(|c| (0..2 * BUFFER_ARC_POINTS).map(move |k| geo::Point::from(c.polar_offset(radius, k as f64 * step))))
        .collect();
    MultiPoint::new(points).convex_hull()
}

/// Outline of the region within `radius` of the polyline
pub fn buffer_curve(curve: &[Point], radius: f64) -> Vec<Point> {
    if curve.is_empty() || !(radius > 0.0) || !curve.iter().all(Point::is_finite) {
        return Vec::new();
    }
    let capsules: Vec<Polygon<f64>> = match curve {
        [p] => vec![capsule(p, p, radius)],
        _ => curve.windows(2).map(|w| capsule(&w[0], &w[1], radius)).collect(),
    };
    let union = capsules
        .iter()
        .fold(MultiPolygon::new(vec![]), |acc, c| acc.union(&MultiPolygon::new(vec![c.clone()])));
    largest_part(union)
}
