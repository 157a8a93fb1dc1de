use serde::Serialize;

use crate::burrows::BurrowError;
use crate::mot::Blob;
use crate::utils::curves::{curve_length, ring_length, simplify_ring};
use crate::utils::polygon::{area, centroid, is_simple, polygon_curve_distance, polygons_intersect, regularize_contour_points};
use crate::utils::polygon::union_polygons;
use crate::utils::{Point, Rect};

/// Underground region given by a simple polygon and, once known, the
/// centerline running from the ground exit to the deepest point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Burrow {
    contour: Vec<Point>,
    centerline: Option<Vec<Point>>,
    refined: bool,
    // cached geometry
    area: f64,
    length: f64,
}

fn check_contour(contour: &[Point]) -> Result<f64, BurrowError> {
    if contour.len() < 3 {
        return Err(BurrowError::TooFewPoints(contour.len()));
    }
    if !contour.iter().all(Point::is_finite) {
        return Err(BurrowError::NonFinite);
    }
    let a = area(contour);
    if !(a > 0.0) {
        return Err(BurrowError::ZeroArea);
    }
    if !is_simple(contour) {
        return Err(BurrowError::SelfIntersecting);
    }
    Ok(a)
}

impl Burrow {
    /// Creates a burrow without centerline from a simple polygon
    ///
    /// Basic usage:
    ///
    /// ```
    /// use burrow_track::burrows::Burrow;
    /// use burrow_track::utils::Rect;
    /// let burrow = Burrow::new(Rect::new(90.0, 50.0, 20.0, 100.0).corners()).unwrap();
    /// assert_eq!(burrow.area(), 2000.0);
    /// assert!(burrow.centerline().is_none());
    /// ```
    pub fn new(contour: Vec<Point>) -> Result<Self, BurrowError> {
        let area = check_contour(&contour)?;
        Ok(Burrow {
            contour,
            centerline: None,
            refined: false,
            area,
            length: 0.0,
        })
    }
    pub fn with_centerline(contour: Vec<Point>, centerline: Vec<Point>, refined: bool) -> Result<Self, BurrowError> {
        let burrow = Burrow::new(contour)?;
        let mut burrow = burrow.set_centerline(centerline);
        burrow.refined = refined;
        Ok(burrow)
    }
    /// Same burrow with another outline; the centerline is kept
    pub fn with_contour(&self, contour: Vec<Point>) -> Result<Self, BurrowError> {
        let area = check_contour(&contour)?;
        Ok(Burrow {
            contour,
            area,
            ..self.clone()
        })
    }
    pub fn set_centerline(mut self, centerline: Vec<Point>) -> Self {
        self.length = curve_length(&centerline);
        self.centerline = Some(centerline);
        self
    }
    pub fn contour(&self) -> &[Point] {
        &self.contour
    }
    pub fn centerline(&self) -> Option<&[Point]> {
        self.centerline.as_deref()
    }
    pub fn is_refined(&self) -> bool {
        self.refined
    }
    pub fn area(&self) -> f64 {
        self.area
    }
    pub fn perimeter(&self) -> f64 {
        ring_length(&self.contour)
    }
    /// Length of the centerline, zero while it is unknown
    pub fn length(&self) -> f64 {
        self.length
    }
    pub fn centroid(&self) -> Point {
        centroid(&self.contour).unwrap_or_default()
    }
    /// Last point of the centerline
    pub fn end_point(&self) -> Option<Point> {
        self.centerline.as_ref().and_then(|c| c.last().copied())
    }
    pub fn is_valid(&self) -> bool {
        self.contour.len() >= 3 && self.area > 0.0 && self.contour.iter().all(|p| p.is_finite())
    }
    pub fn intersects(&self, other: &Burrow) -> bool {
        polygons_intersect(&self.contour, &other.contour)
    }
    /// Distance between the outline and a polyline, zero if they overlap
    pub fn distance_to_curve(&self, curve: &[Point]) -> f64 {
        polygon_curve_distance(&self.contour, curve)
    }
    pub fn bounding_rect(&self, margin: f64) -> Rect {
        Rect::bounding(&self.contour).expanded(margin)
    }
    /// Union of two burrows. The longer centerline survives and the result
    /// counts as unrefined. The merged outline covers at least the larger of
    /// the two areas; of disjoint burrows only the larger one remains.
    pub fn merge(&self, other: &Burrow) -> Result<Burrow, BurrowError> {
        let contour = union_polygons(&[&self.contour, &other.contour]);
        let longer = if other.length > self.length { other } else { self };
        let mut merged = Burrow::new(contour)?;
        if let Some(centerline) = &longer.centerline {
            merged = merged.set_centerline(centerline.clone());
        }
        Ok(merged)
    }
    /// Douglas-Peucker simplification with a tolerance relative to the
    /// perimeter. Keeps the outline if the simplified one is not valid.
    pub fn simplify_outline(&self, tolerance: f64) -> Burrow {
        let simplified = regularize_contour_points(&simplify_ring(&self.contour, tolerance * self.perimeter()));
        self.with_contour(simplified).unwrap_or_else(|_| self.clone())
    }
}

impl Blob for Burrow {
    fn get_center(&self) -> Point {
        self.centroid()
    }
    fn get_size(&self) -> f64 {
        self.area
    }
}
