//! Planar coordinates and the facility pool
//!
//! Coordinates are planar and expressed in meters. No projection is applied:
//! distances are straight-line Euclidean distances in the input plane.

use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::slice;

/// Meters per kilometer, used to report distances in kilometers
pub const METERS_PER_KM: f64 = 1000.0;

/// A point in the plane (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other` in meters
    #[inline]
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Euclidean distance to `other` in kilometers
    #[inline]
    pub fn distance_km(&self, other: &Point) -> f64 {
        self.distance_to(other) / METERS_PER_KM
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// One residence read from the record source
///
/// `index` is the ordinal position in the residence file and decides which
/// worker owns the record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidenceRecord {
    pub index: u64,
    pub point: Point,
}

/// Immutable, ordered set of facility coordinates
///
/// Every worker holds its own copy, loaded once before classification starts
/// and never mutated afterwards. An empty set is representable so that the
/// loader can report what it found; classification over it is rejected by
/// [`NearestBandClassifier::new`](crate::classify::NearestBandClassifier::new).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilitySet {
    points: Vec<Point>,
}

impl FacilitySet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }
}

impl From<Vec<Point>> for FacilitySet {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point> for FacilitySet {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for FacilitySet {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a FacilitySet {
    type Item = &'a Point;
    type IntoIter = slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
