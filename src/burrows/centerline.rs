//! Centerline of a burrow by ray casting.
//!
//! Starting at the exit on the ground line the centerline advances in steps
//! of `centerline_segment_length`. In every step rays are cast inside an
//! angular window around the last direction and the step follows the longest
//! ray. The window is set by the maximal radius of curvature, so the line
//! cannot bend more sharply than the burrow allows. The walk ends when the
//! longest ray is shorter than one step; the last point then lies half a
//! burrow width in front of the far wall.
use std::f64::consts::FRAC_PI_2;

use crate::burrows::Burrow;
use crate::ground::GroundProfile;
use crate::params::BurrowParams;
use crate::utils::curves::{make_ring_equidistant, ring_length};
use crate::utils::polygon::{get_farthest_ray_intersection, get_ray_intersections, linspace};
use crate::utils::{euclidean_distance, mean_point, Point};

/// Number of rays cast in every step
const RAY_COUNT: usize = 16;
/// Distance of the first anchor point from the exit
const EXIT_OFFSET: f64 = 5.0;

/// Point where the burrow meets the ground line.
///
/// The outline is resampled with the ground point distance; the exit is the
/// mean of all samples closer than that distance to the ground (or the
/// closest sample) projected onto the ground line.
pub fn estimate_exit(contour: &[Point], ground: &GroundProfile, params: &BurrowParams) -> Option<Point> {
    let threshold = params.ground_point_distance;
    let samples = make_ring_equidistant(contour, threshold);
    let distances: Vec<f64> = samples.iter().map(|p| ground.distance(p)).collect();
    let near: Vec<Point> = samples
        .iter()
        .zip(&distances)
        .filter(|(_, &d)| d < threshold)
        .map(|(p, _)| *p)
        .collect();
    let exit = match mean_point(&near) {
        Some(p) => p,
        None => samples
            .iter()
            .zip(&distances)
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(p, _)| *p)?,
    };
    Some(ground.projection(&exit))
}

/// Direction pointing into the ground at the exit, perpendicular to the
/// segment between the two ground points closest to it
fn initial_direction(exit: &Point, ground: &GroundProfile) -> f64 {
    let points = ground.points();
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        euclidean_distance(&points[a], exit).total_cmp(&euclidean_distance(&points[b], exit))
    });
    let (mut p1, mut p2) = (points[order[0]], points[order[1]]);
    if p1.x > p2.x {
        std::mem::swap(&mut p1, &mut p2);
    }
    (p2.y - p1.y).atan2(p2.x - p1.x) + FRAC_PI_2
}

/// Computes the centerline of a burrow outline from its ground exit to its
/// far end. An empty result means the outline is unusable.
pub fn compute_centerline(contour: &[Point], ground: &GroundProfile, params: &BurrowParams) -> Vec<Point> {
    let Some(exit) = estimate_exit(contour, ground, params) else {
        return Vec::new();
    };
    let mut angle = initial_direction(&exit, ground);
    let mut anchor = exit.polar_offset(EXIT_OFFSET, angle);

    let segment_length = params.centerline_segment_length;
    let ratio = segment_length / params.curvature_radius_max;
    let angle_max = (1.0 - 0.5 * ratio * ratio).clamp(-1.0, 1.0).acos();
    // every step covers one segment, so the walk cannot be longer than the outline
    let max_steps = (ring_length(contour) / segment_length).ceil() as usize + 10;

    let mut centerline = vec![exit];
    for _ in 0..max_steps {
        let angles = linspace(angle - angle_max, angle + angle_max, RAY_COUNT);
        let Some(hit) = get_farthest_ray_intersection(&anchor, &angles, contour, true) else {
            break;
        };
        angle = hit.angle;
        if hit.distance > segment_length {
            anchor = anchor.polar_offset(segment_length, angle);
            centerline.push(anchor);
            continue;
        }
        // stop half a burrow width before the far wall
        match half_width(&anchor, angle, contour) {
            Some(half) if hit.distance > half => centerline.push(anchor.polar_offset(hit.distance - half, angle)),
            Some(_) if centerline.len() == 1 => centerline.push(anchor),
            Some(_) => {}
            None => centerline.push(hit.point),
        }
        break;
    }
    centerline
}

/// Half of the width of the outline across the direction `angle` at `anchor`
fn half_width(anchor: &Point, angle: f64, contour: &[Point]) -> Option<f64> {
    let hits = get_ray_intersections(anchor, &[angle - FRAC_PI_2, angle + FRAC_PI_2], contour, true);
    match (hits[0], hits[1]) {
        (Some(left), Some(right)) => {
            Some(0.5 * (euclidean_distance(anchor, &left) + euclidean_distance(anchor, &right)))
        }
        _ => None,
    }
}

/// Adds a centerline to burrows that do not have one yet
pub fn ensure_centerline(burrow: Burrow, ground: &GroundProfile, params: &BurrowParams) -> Burrow {
    if burrow.centerline().is_some() {
        return burrow;
    }
    let centerline = compute_centerline(burrow.contour(), ground, params);
    if centerline.len() < 2 {
        return burrow;
    }
    burrow.set_centerline(centerline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{corridor_contour, flat_ground};
    use crate::utils::curves::curve_length;
    use crate::utils::polygon::contains_point;
    use crate::utils::Rect;

    #[test]
    fn test_exit_of_corridor() {
        let params = BurrowParams::default();
        let exit = estimate_exit(&corridor_contour(), &flat_ground(), &params).unwrap();
        assert!((exit.x - 100.0).abs() < 1e-9);
        assert!((exit.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_centerline_of_corridor() {
        let params = BurrowParams::default();
        let contour = corridor_contour();
        let centerline = compute_centerline(&contour, &flat_ground(), &params);
        assert!(centerline.len() > 4);
        // corridor of length 100 and width 20
        let length = curve_length(&centerline);
        assert!((length - 90.0).abs() < 0.5 * params.centerline_segment_length, "length {}", length);
        assert_eq!(centerline[0].y, 50.0);
        let end = centerline[centerline.len() - 1];
        assert!(end.y > 135.0 && end.y < 145.0, "end {:?}", end);
        for p in &centerline[1..] {
            assert!(contains_point(&contour, p));
        }
    }

    #[test]
    fn test_centerline_of_short_burrow() {
        let params = BurrowParams::default();
        // shallower than one step, the walk ends right away
        let contour = Rect::new(80.0, 50.0, 40.0, 12.0).corners();
        let centerline = compute_centerline(&contour, &flat_ground(), &params);
        assert_eq!(centerline.len(), 2);
        assert_eq!(centerline[0].y, 50.0);
        assert!((centerline[0].x - 100.0).abs() < 2.0);
        assert!(contains_point(&contour, &centerline[1]));
    }

    #[test]
    fn test_ensure_centerline_keeps_existing() {
        let params = BurrowParams::default();
        let line = vec![Point::new(100.0, 50.0), Point::new(100.0, 60.0)];
        let burrow = Burrow::new(corridor_contour()).unwrap().set_centerline(line.clone());
        let burrow = ensure_centerline(burrow, &flat_ground(), &params);
        assert_eq!(burrow.centerline(), Some(line.as_slice()));

        let burrow = ensure_centerline(Burrow::new(corridor_contour()).unwrap(), &flat_ground(), &params);
        assert!(burrow.length() > 70.0);
    }
}
