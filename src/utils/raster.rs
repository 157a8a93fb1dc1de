//! Binary and grayscale raster helpers on top of `image` and `imageproc`.
//!
//! Pixel `(x, y)` is identified with the point at its center, i.e. with the
//! integer coordinates `(x, y)`. Any non-zero pixel of a mask is foreground.
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{find_contours as trace_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::morphology;
use imageproc::point::Point as PixelPoint;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::utils::polygon::area;
use crate::utils::{Point, Rect};

/// Douglas-Peucker tolerance applied to traced pixel chains
const CONTOUR_TOLERANCE: f64 = 0.5;

#[inline]
pub fn is_set(mask: &GrayImage, x: i32, y: i32) -> bool {
    let (w, h) = mask.dimensions();
    x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h && mask.get_pixel(x as u32, y as u32)[0] > 0
}

pub fn count_nonzero(mask: &GrayImage) -> usize {
    mask.as_raw().iter().filter(|&&v| v > 0).count()
}

/// Fills the polygon with `value`. Vertices are rounded to the pixel grid
/// and the outline itself belongs to the region.
pub fn fill_polygon(mask: &mut GrayImage, points: &[Point], value: u8) {
    if points.iter().any(|p| !p.is_finite()) {
        return;
    }
    let mut poly: Vec<PixelPoint<i32>> = points
        .iter()
        .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() < 3 {
        return;
    }
    draw_polygon_mut(mask, &poly, Luma([value]));
}

/// Rasterizes a polygon into a fresh mask of the given size
pub fn polygon_mask(points: &[Point], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    fill_polygon(&mut mask, points, 255);
    mask
}

/// 8-connected component labelling. Label 0 is background.
#[derive(Debug, Clone)]
pub struct Labels {
    pub width: u32,
    pub height: u32,
    pub count: u32,
    labels: ImageBuffer<Luma<u32>, Vec<u32>>,
}

impl Labels {
    pub fn get(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return 0;
        }
        self.labels.get_pixel(x as u32, y as u32)[0]
    }
    /// Binary mask of a single component
    pub fn component_mask(&self, label: u32) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.labels.get_pixel(x, y)[0] == label { 255 } else { 0 }])
        })
    }
    /// Pixel count and center of mass of every component, indexed by `label - 1`
    pub fn moments(&self) -> Vec<(usize, Point)> {
        let mut sums = vec![(0usize, 0.0f64, 0.0f64); self.count as usize];
        for (x, y, pixel) in self.labels.enumerate_pixels() {
            let label = pixel[0];
            if label > 0 {
                let entry = &mut sums[(label - 1) as usize];
                entry.0 += 1;
                entry.1 += x as f64;
                entry.2 += y as f64;
            }
        }
        sums.into_iter()
            .map(|(n, sx, sy)| (n, Point::new(sx / n.max(1) as f64, sy / n.max(1) as f64)))
            .collect()
    }
}

pub fn label_components(mask: &GrayImage) -> Labels {
    let (width, height) = mask.dimensions();
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
    Labels {
        width,
        height,
        count,
        labels,
    }
}

/// External contours of all connected components of a mask. Pixels on
/// straight runs are dropped, only the corners of the pixel chain remain.
pub fn find_contours(mask: &GrayImage) -> Vec<Vec<Point>> {
    trace_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| {
            let mut corners = if contour.points.len() < 3 {
                contour.points
            } else {
                approximate_polygon_dp(&contour.points, CONTOUR_TOLERANCE, true)
            };
            while corners.len() > 1 && corners.first() == corners.last() {
                corners.pop();
            }
            corners
                .into_iter()
                .map(|p| Point::new(p.x as f64, p.y as f64))
                .collect()
        })
        .collect()
}

/// Outline of the connected region of a mask that encloses the largest area,
/// together with that area. Equal areas keep the region found first.
pub fn largest_contour(mask: &GrayImage) -> Option<(Vec<Point>, f64)> {
    find_contours(mask)
        .into_iter()
        .map(|contour| {
            let a = area(&contour);
            (contour, a)
        })
        .fold(None, |best: Option<(Vec<Point>, f64)>, (contour, a)| match best {
            Some(b) if b.1 >= a => Some(b),
            _ => Some((contour, a)),
        })
}

fn structuring_radius(radius: u32) -> u8 {
    radius.min(u8::MAX as u32) as u8
}

/// Binary dilation with a disk of the given radius
pub fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::dilate(mask, Norm::L2, structuring_radius(radius))
}

/// Binary erosion with a disk of the given radius. Pixels outside the image
/// do not erode the mask.
pub fn erode(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::erode(mask, Norm::L2, structuring_radius(radius))
}

pub fn close(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::close(mask, Norm::L2, structuring_radius(radius))
}

pub fn open(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    morphology::open(mask, Norm::L2, structuring_radius(radius))
}

/// Bilinear interpolation with clamping at the image borders
pub fn sample_bilinear(image: &GrayImage, x: f64, y: f64) -> f64 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let fetch = |ix: i64, iy: i64| -> f64 {
        let cx = ix.clamp(0, w as i64 - 1) as u32;
        let cy = iy.clamp(0, h as i64 - 1) as u32;
        image.get_pixel(cx, cy)[0] as f64
    };
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);
    fetch(ix, iy) * (1.0 - fx) * (1.0 - fy)
        + fetch(ix + 1, iy) * fx * (1.0 - fy)
        + fetch(ix, iy + 1) * (1.0 - fx) * fy
        + fetch(ix + 1, iy + 1) * fx * fy
}

/// Intensity profile along the segment from `a` to `b`, sampled at unit
/// spacing and averaged over `width` parallel lines
pub fn line_scan(image: &GrayImage, a: &Point, b: &Point, width: usize) -> Vec<f64> {
    let length = crate::utils::euclidean_distance(a, b);
    let count = length.round() as usize + 1;
    if length == 0.0 {
        return vec![sample_bilinear(image, a.x, a.y)];
    }
    let (dx, dy) = ((b.x - a.x) / length, (b.y - a.y) / length);
    let (nx, ny) = (-dy, dx);
    let width = width.max(1);
    (0..count)
        .map(|k| {
            let t = if count > 1 { k as f64 * length / (count - 1) as f64 } else { 0.0 };
            let (px, py) = (a.x + t * dx, a.y + t * dy);
            let sum: f64 = (0..width)
                .map(|o| {
                    let offset = o as f64 - (width - 1) as f64 / 2.0;
                    sample_bilinear(image, px + offset * nx, py + offset * ny)
                })
                .sum();
            sum / width as f64
        })
        .collect()
}

/// Pixel rectangle `(x, y, width, height)` of `rect` clipped to the image
pub fn clip_rect(rect: &Rect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.floor().max(0.0);
    let y0 = rect.y.floor().max(0.0);
    let x1 = (rect.x + rect.width).ceil().min(width as f64);
    let y1 = (rect.y + rect.height).ceil().min(height as f64);
    if !(x1 > x0 && y1 > y0) {
        return None;
    }
    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::polygon;

    #[test]
    fn test_fill_polygon_rectangle() {
        let rect = Rect::new(2.0, 3.0, 4.0, 5.0).corners();
        let mask = polygon_mask(&rect, 10, 10);
        assert_eq!(count_nonzero(&mask), 5 * 6);
        assert!(is_set(&mask, 2, 3));
        assert!(is_set(&mask, 6, 8));
        assert!(!is_set(&mask, 7, 8));
        // closed rings and degenerate input are accepted
        let mut closed = rect.clone();
        closed.push(rect[0]);
        assert_eq!(polygon_mask(&closed, 10, 10), mask);
        assert_eq!(count_nonzero(&polygon_mask(&rect[..2], 10, 10)), 0);
    }

    #[test]
    fn test_label_components() {
        let mut mask = GrayImage::new(20, 10);
        fill_polygon(&mut mask, &Rect::new(1.0, 1.0, 3.0, 3.0).corners(), 255);
        fill_polygon(&mut mask, &Rect::new(10.0, 2.0, 5.0, 5.0).corners(), 255);
        let labels = label_components(&mask);
        assert_eq!(labels.count, 2);
        let mut moments = labels.moments();
        moments.sort_by_key(|m| m.0);
        assert_eq!(moments[0].0, 16);
        assert_eq!(moments[0].1, Point::new(2.5, 2.5));
        assert_eq!(moments[1].0, 36);
        assert_eq!(moments[1].1, Point::new(12.5, 4.5));
        assert_eq!(labels.get(2, 2), labels.get(4, 4));
        assert_ne!(labels.get(2, 2), labels.get(12, 4));
        assert_eq!(labels.get(-1, 2), 0);
    }

    #[test]
    fn test_trace_rectangle_contour() {
        let rect = Rect::new(2.0, 3.0, 10.0, 5.0).corners();
        let mask = polygon_mask(&rect, 20, 20);
        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(Rect::bounding(&contours[0]), Rect::new(2.0, 3.0, 10.0, 5.0));
        assert!((polygon::area(&contours[0]) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_largest_contour() {
        let mut mask = polygon_mask(&Rect::new(2.0, 2.0, 4.0, 4.0).corners(), 40, 40);
        fill_polygon(&mut mask, &Rect::new(10.0, 10.0, 20.0, 10.0).corners(), 255);
        let (contour, a) = largest_contour(&mask).unwrap();
        assert_eq!(a, 200.0);
        assert_eq!(Rect::bounding(&contour), Rect::new(10.0, 10.0, 20.0, 10.0));
        assert!(largest_contour(&GrayImage::new(5, 5)).is_none());
    }

    #[test]
    fn test_morphology() {
        let mut mask = GrayImage::new(30, 30);
        mask.put_pixel(15, 15, Luma([255]));
        let dilated = dilate(&mask, 3);
        assert!(is_set(&dilated, 18, 15));
        assert!(is_set(&dilated, 15, 12));
        assert!(!is_set(&dilated, 19, 15));
        assert!(!is_set(&dilated, 18, 18));
        // a lone pixel does not survive opening
        assert_eq!(count_nonzero(&open(&mask, 1)), 0);
        // a square survives closing and erosion shrinks it
        let square = polygon_mask(&Rect::new(5.0, 5.0, 10.0, 10.0).corners(), 30, 30);
        assert_eq!(close(&square, 2), square);
        let core = erode(&square, 2);
        assert!(is_set(&core, 10, 10));
        assert!(!is_set(&core, 5, 10));
    }

    #[test]
    fn test_line_scan() {
        let image = GrayImage::from_fn(20, 5, |x, _| Luma([(10 * x) as u8]));
        let profile = line_scan(&image, &Point::new(2.0, 2.0), &Point::new(6.0, 2.0), 3);
        assert_eq!(profile, vec![20.0, 30.0, 40.0, 50.0, 60.0]);
    }
}
