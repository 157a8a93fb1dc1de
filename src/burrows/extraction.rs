use image::GrayImage;
use tracing::debug;

use crate::burrows::{Burrow, ExtractionError, ExploredArea};
use crate::ground::GroundProfile;
use crate::params::{BurrowParams, Parameters};
use crate::utils::curves::{ring_length, simplify_ring, translate_points};
use crate::utils::polygon::{regularize_with_budget, simplify_contour};
use crate::utils::raster::{close, erode, largest_contour, open};
use crate::utils::Point;

/// Radius of the opening that removes thin spikes from the potential burrows
const SMOOTHING_RADIUS: u32 = 2;

/// Converts the largest region of a binary mask into a burrow.
///
/// `offset` is the position of the mask inside the frame; the ground profile
/// is given in frame coordinates and so is the returned burrow.
///
/// Basic usage:
///
/// ```
/// use burrow_track::burrows::{extract_burrow, ExtractionError};
/// use burrow_track::ground::GroundProfile;
/// use burrow_track::params::BurrowParams;
/// use burrow_track::utils::Point;
/// use image::{GrayImage, Luma};
///
/// let ground = GroundProfile::new(vec![Point::new(0.0, 5.0), Point::new(100.0, 5.0)]).unwrap();
/// let mut mask = GrayImage::new(100, 100);
/// for y in 20..26 {
///     for x in 20..31 {
///         mask.put_pixel(x, y, Luma([255]));
///     }
/// }
/// let result = extract_burrow(&mask, &ground, (0, 0), &BurrowParams::default());
/// assert!(matches!(result, Err(ExtractionError::AreaTooSmall { .. })));
/// ```
pub fn extract_burrow(
    mask: &GrayImage,
    ground: &GroundProfile,
    offset: (i32, i32),
    params: &BurrowParams,
) -> Result<Burrow, ExtractionError> {
    let (contour, area) = largest_contour(mask).ok_or(ExtractionError::EmptyMask)?;
    if area < params.area_min {
        return Err(ExtractionError::AreaTooSmall {
            area,
            min: params.area_min,
        });
    }

    let max_cuts = 2 * contour.len();
    outline_to_burrow(&contour, ground, offset, params, max_cuts)
}

/// Turns a traced outline in mask coordinates into a burrow in frame
/// coordinates. Regularization cuts off at most `max_cuts` loops.
fn outline_to_burrow(
    contour: &[Point],
    ground: &GroundProfile,
    offset: (i32, i32),
    params: &BurrowParams,
    max_cuts: usize,
) -> Result<Burrow, ExtractionError> {
    let tolerance = params.outline_simplification_threshold * ring_length(contour);
    let mut contour = simplify_ring(contour, tolerance);

    // snap points close to the ground onto the ground line
    let (dx, dy) = (offset.0 as f64, offset.1 as f64);
    let ground_local = ground.translated(-dx, -dy);
    for p in contour.iter_mut() {
        if ground_local.distance(p) < params.ground_point_distance {
            *p = ground_local.projection(p);
        }
    }

    let contour = simplify_contour(&contour, params.simplification_threshold_area);
    let contour = regularize_with_budget(&contour, max_cuts);
    if contour.len() < 3 {
        return Err(ExtractionError::DegeneratePolygon(contour.len()));
    }
    Ok(Burrow::new(translate_points(&contour, dx, dy))?)
}

/// Mask of the underground regions that objects explored and that are
/// connected to the ground line. Every connected region is a burrow candidate.
pub fn potential_burrows_mask(explored: &ExploredArea, ground: &GroundProfile, params: &Parameters) -> GrayImage {
    let (width, height) = explored.dimensions();
    let mut mask = explored.explored_mask();

    // explored pixels at the cage border are artifacts
    let margin = params.burrows.cage_margin;
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        if x < margin || y < margin || x + margin >= width || y + margin >= height {
            pixel[0] = 0;
        }
    }

    let radius = params.objects.model_radius.max(0.0).round() as u32;
    let mask_ground = ground.mask(width, height);
    // lowered ground, removes artifacts along the ground line
    let ground_low = erode(&mask_ground, radius);
    for ((pixel, low), ground) in mask.pixels_mut().zip(ground_low.pixels()).zip(mask_ground.pixels()) {
        let burrow = pixel[0] > 0 && low[0] > 0;
        // combined with the sky the closing reconnects burrows to the ground
        pixel[0] = if burrow || ground[0] == 0 { 255 } else { 0 };
    }
    let mut mask = close(&mask, radius);
    for (pixel, ground) in mask.pixels_mut().zip(mask_ground.pixels()) {
        if ground[0] == 0 {
            pixel[0] = 0;
        }
    }
    let mask = open(&mask, SMOOTHING_RADIUS);
    debug!(width, height, "built potential burrows mask");
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burrows::BurrowError;
    use crate::test_data::{flat_ground, rect_mask, FRAME_HEIGHT, FRAME_WIDTH};
    use crate::utils::polygon::{area, is_simple};
    use image::Luma;
    use crate::utils::raster::{is_set, label_components};
    use crate::utils::Rect;

    #[test]
    fn test_extract_corridor() {
        let params = BurrowParams::default();
        let burrow = extract_burrow(&rect_mask(90, 50, 110, 150), &flat_ground(), (0, 0), &params).unwrap();
        assert_eq!(burrow.contour().len(), 4);
        assert!((burrow.area() - 2000.0).abs() < 1e-9);
        assert!(burrow.centerline().is_none());
    }

    #[test]
    fn test_extract_with_offset() {
        let params = BurrowParams::default();
        // the corridor inside a sub-region starting at (80, 40)
        let full = rect_mask(90, 50, 110, 150);
        let local = image::imageops::crop_imm(&full, 80, 40, 40, 120).to_image();
        let burrow = extract_burrow(&local, &flat_ground(), (80, 40), &params).unwrap();
        let rect = Rect::bounding(burrow.contour());
        assert_eq!(rect, Rect::new(90.0, 50.0, 20.0, 100.0));
    }

    #[test]
    fn test_snaps_points_to_ground() {
        let params = BurrowParams::default();
        // the top edge is 5 pixels below the ground line
        let burrow = extract_burrow(&rect_mask(90, 55, 110, 150), &flat_ground(), (0, 0), &params).unwrap();
        assert!(burrow.contour().iter().any(|p| p.y == 50.0));
        assert!((area(burrow.contour()) - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_regions_are_rejected() {
        let params = BurrowParams::default();
        match extract_burrow(&rect_mask(10, 60, 20, 65), &flat_ground(), (0, 0), &params) {
            Err(ExtractionError::AreaTooSmall { area, min }) => {
                assert_eq!(area, 50.0);
                assert_eq!(min, 1000.0);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(
            extract_burrow(&GrayImage::new(20, 20), &flat_ground(), (0, 0), &params),
            Err(ExtractionError::EmptyMask)
        );
    }

    #[test]
    fn test_thin_line_degenerates() {
        let params = BurrowParams {
            area_min: 0.0,
            ..Default::default()
        };
        let mut mask = GrayImage::new(FRAME_WIDTH, FRAME_HEIGHT);
        for k in 100..140 {
            mask.put_pixel(k, k, Luma([255]));
        }
        let result = extract_burrow(&mask, &flat_ground(), (0, 0), &params);
        assert!(matches!(result, Err(ExtractionError::DegeneratePolygon(n)) if n < 3), "{:?}", result);
    }

    #[test]
    fn test_self_touching_region_is_regularized() {
        let params = BurrowParams::default();
        // two squares touching at a single corner form one 8-connected region
        let mut mask = rect_mask(60, 60, 89, 89);
        for (x, y, pixel) in rect_mask(90, 90, 119, 119).enumerate_pixels() {
            if pixel[0] > 0 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let burrow = extract_burrow(&mask, &flat_ground(), (0, 0), &params).unwrap();
        assert!(is_simple(burrow.contour()));
        assert!(burrow.area() > 700.0 && burrow.area() < 1000.0, "area {}", burrow.area());
    }

    #[test]
    fn test_unresolved_outline_is_invalid() {
        let params = BurrowParams::default();
        // bow tie with lobes of different size, far below the ground line
        let bow_tie = vec![
            Point::new(100.0, 100.0),
            Point::new(160.0, 160.0),
            Point::new(160.0, 100.0),
            Point::new(100.0, 190.0),
        ];
        assert_eq!(
            outline_to_burrow(&bow_tie, &flat_ground(), (0, 0), &params, 0),
            Err(ExtractionError::InvalidContour(BurrowError::SelfIntersecting))
        );
        let burrow = outline_to_burrow(&bow_tie, &flat_ground(), (0, 0), &params, 8).unwrap();
        assert!(is_simple(burrow.contour()));
    }

    #[test]
    fn test_potential_burrows_mask() {
        let params = Parameters::default();
        let mut explored = ExploredArea::new(200, 200);
        explored.mark_mask(&rect_mask(90, 50, 110, 150));
        // isolated speck and a region inside the cage margin
        explored.mark_mask(&rect_mask(40, 100, 40, 100));
        explored.mark_mask(&rect_mask(5, 100, 15, 120));
        let mask = potential_burrows_mask(&explored, &flat_ground(), &params);
        assert!(is_set(&mask, 100, 100));
        assert!(is_set(&mask, 100, 52));
        assert!(!is_set(&mask, 100, 40));
        assert!(!is_set(&mask, 40, 100));
        assert!(!is_set(&mask, 10, 110));
        assert_eq!(label_components(&mask).count, 1);
    }
}
