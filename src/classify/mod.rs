//! Nearest-facility band classification
//!
//! Each residence is assigned to exactly one [`Band`] according to the
//! straight-line distance (in kilometers) to its *nearest* facility. The bands
//! partition `[0, ∞)` and each boundary belongs to the lower band:
//!
//! ```text
//! [0, 1]   (1, 2]   (2, 5]   (5, ∞)
//! ```
//!
//! # Example
//!
//! ```
//! use proxpulse::classify::{Band, NearestBandClassifier};
//! use proxpulse::geo::{FacilitySet, Point};
//!
//! let facilities = FacilitySet::new(vec![Point::new(0.0, 0.0)]);
//! let classifier = NearestBandClassifier::new(&facilities)?;
//!
//! assert_eq!(classifier.classify(&Point::new(1500.0, 0.0)), Band::OneToTwo);
//! assert_eq!(classifier.nearest_distance_km(&Point::new(3000.0, 4000.0)), 5.0);
//! # Ok::<(), proxpulse::error::ProximityError>(())
//! ```

use crate::error::ProximityError;
use crate::geo::{FacilitySet, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of proximity bands
pub const NUM_BANDS: usize = 4;

/// Proximity band keyed by distance to the nearest facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// `[0, 1]` km
    WithinOne,
    /// `(1, 2]` km
    OneToTwo,
    /// `(2, 5]` km
    TwoToFive,
    /// `(5, ∞)` km
    BeyondFive,
}

impl Band {
    /// All bands in ascending distance order
    pub const ALL: [Band; NUM_BANDS] = [
        Band::WithinOne,
        Band::OneToTwo,
        Band::TwoToFive,
        Band::BeyondFive,
    ];

    /// Map a distance in kilometers to its band
    ///
    /// Upper bounds are inclusive, so `1.0` is `WithinOne` and `5.0` is
    /// `TwoToFive`. Negative input cannot come out of a distance computation
    /// and is treated as zero.
    pub fn from_distance_km(km: f64) -> Band {
        if km <= 1.0 {
            Band::WithinOne
        } else if km <= 2.0 {
            Band::OneToTwo
        } else if km <= 5.0 {
            Band::TwoToFive
        } else {
            Band::BeyondFive
        }
    }

    /// Position of this band in tally arrays
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Band::WithinOne => 0,
            Band::OneToTwo => 1,
            Band::TwoToFive => 2,
            Band::BeyondFive => 3,
        }
    }

    /// Short label used in report tables
    pub const fn label(self) -> &'static str {
        match self {
            Band::WithinOne => "0-1",
            Band::OneToTwo => "1-2",
            Band::TwoToFive => "2-5",
            Band::BeyondFive => "> 5",
        }
    }

    /// Upper bound of the band in kilometers (`None` for the open band)
    pub const fn upper_km(self) -> Option<f64> {
        match self {
            Band::WithinOne => Some(1.0),
            Band::OneToTwo => Some(2.0),
            Band::TwoToFive => Some(5.0),
            Band::BeyondFive => None,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies residences against a fixed facility set
///
/// Borrowing the facility set keeps the classifier free of any state of its
/// own: every method is a pure function of the residence and the facilities.
#[derive(Debug, Clone, Copy)]
pub struct NearestBandClassifier<'a> {
    facilities: &'a FacilitySet,
}

impl<'a> NearestBandClassifier<'a> {
    /// Create a classifier over `facilities`
    ///
    /// Fails with [`ProximityError::InvalidInput`] when the set is empty, since
    /// there is no nearest facility to measure against.
    pub fn new(facilities: &'a FacilitySet) -> Result<Self, ProximityError> {
        if facilities.is_empty() {
            return Err(ProximityError::invalid_input(
                "facility set is empty; no nearest facility to measure",
            ));
        }
        Ok(Self { facilities })
    }

    pub fn facilities(&self) -> &'a FacilitySet {
        self.facilities
    }

    /// Band of the nearest facility to `residence`
    ///
    /// The scan stops as soon as some facility is within 1 km: no other
    /// facility can move the residence out of the lowest band. In every other
    /// case all facilities are visited, because a later facility may be
    /// strictly closer than any earlier one.
    pub fn classify(&self, residence: &Point) -> Band {
        let mut nearest = f64::INFINITY;
        for facility in self.facilities {
            let km = residence.distance_km(facility);
            if km < nearest {
                nearest = km;
                if Band::from_distance_km(nearest) == Band::WithinOne {
                    break;
                }
            }
        }
        Band::from_distance_km(nearest)
    }

    /// Exact distance (km) from `residence` to its nearest facility
    ///
    /// Always scans the full set.
    pub fn nearest_distance_km(&self, residence: &Point) -> f64 {
        self.nearest(residence).1
    }

    /// Index and distance (km) of the nearest facility
    ///
    /// Ties resolve to the facility that appears first in the set.
    pub fn nearest(&self, residence: &Point) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for (i, facility) in self.facilities.iter().enumerate() {
            let km = residence.distance_km(facility);
            if km < best.1 {
                best = (i, km);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin_only() -> FacilitySet {
        FacilitySet::new(vec![Point::new(0.0, 0.0)])
    }

    #[test]
    fn test_band_boundaries_inclusive_upper() {
        assert_eq!(Band::from_distance_km(0.0), Band::WithinOne);
        assert_eq!(Band::from_distance_km(1.0), Band::WithinOne);
        assert_eq!(Band::from_distance_km(1.000_001), Band::OneToTwo);
        assert_eq!(Band::from_distance_km(2.0), Band::OneToTwo);
        assert_eq!(Band::from_distance_km(2.5), Band::TwoToFive);
        assert_eq!(Band::from_distance_km(5.0), Band::TwoToFive);
        assert_eq!(Band::from_distance_km(5.000_001), Band::BeyondFive);
        assert_eq!(Band::from_distance_km(f64::INFINITY), Band::BeyondFive);
    }

    #[test]
    fn test_bands_partition_distance_axis() {
        // Sweep [0, 12] km in 10 m steps; every value lands in exactly one band
        // and band order never goes backwards.
        let mut previous = Band::WithinOne;
        for step in 0..=1200 {
            let km = step as f64 / 100.0;
            let band = Band::from_distance_km(km);
            let hits = Band::ALL.iter().filter(|b| **b == band).count();
            assert_eq!(hits, 1);
            assert!(band >= previous);
            if let Some(upper) = band.upper_km() {
                assert!(km <= upper);
            }
            previous = band;
        }
    }

    #[test]
    fn test_band_index_matches_all_order() {
        for (i, band) in Band::ALL.iter().enumerate() {
            assert_eq!(band.index(), i);
        }
        assert_eq!(Band::BeyondFive.to_string(), "> 5");
    }

    #[test]
    fn test_empty_facility_set_rejected() {
        let empty = FacilitySet::default();
        let err = NearestBandClassifier::new(&empty).unwrap_err();
        assert!(matches!(err, ProximityError::InvalidInput(_)));
    }

    #[test]
    fn test_one_residence_per_band() {
        let facilities = origin_only();
        let classifier = NearestBandClassifier::new(&facilities).unwrap();

        let cases = [
            (Point::new(500.0, 0.0), 0.5, Band::WithinOne),
            (Point::new(1500.0, 0.0), 1.5, Band::OneToTwo),
            (Point::new(3000.0, 4000.0), 5.0, Band::TwoToFive),
            (Point::new(10000.0, 0.0), 10.0, Band::BeyondFive),
        ];

        for (residence, km, band) in cases {
            assert_eq!(classifier.nearest_distance_km(&residence), km);
            assert_eq!(classifier.classify(&residence), band);
        }
    }

    #[test]
    fn test_closer_facility_later_in_set_wins() {
        // First facility is 8 km away, second 3 km, third 1.5 km.
        let facilities = FacilitySet::new(vec![
            Point::new(8000.0, 0.0),
            Point::new(0.0, 3000.0),
            Point::new(-1500.0, 0.0),
        ]);
        let classifier = NearestBandClassifier::new(&facilities).unwrap();
        let residence = Point::new(0.0, 0.0);

        assert_eq!(classifier.nearest(&residence), (2, 1.5));
        assert_eq!(classifier.classify(&residence), Band::OneToTwo);
    }

    #[test]
    fn test_not_classified_by_ring_counts() {
        // Many facilities in the 2-5 km ring, a single one just beyond 1 km.
        // Counting facilities per ring would pick (2,5]; the nearest is (1,2].
        let mut points: Vec<Point> = (0..10)
            .map(|i| Point::new(4000.0, i as f64 * 10.0))
            .collect();
        points.push(Point::new(0.0, 1200.0));
        let facilities = FacilitySet::new(points);
        let classifier = NearestBandClassifier::new(&facilities).unwrap();

        assert_eq!(classifier.classify(&Point::new(0.0, 0.0)), Band::OneToTwo);
    }

    #[test]
    fn test_early_exit_keeps_lowest_band() {
        let facilities = FacilitySet::new(vec![
            Point::new(900.0, 0.0),
            Point::new(100.0, 0.0),
        ]);
        let classifier = NearestBandClassifier::new(&facilities).unwrap();
        let residence = Point::new(0.0, 0.0);

        assert_eq!(classifier.classify(&residence), Band::WithinOne);
        // The exact distance still comes from the full scan.
        assert_eq!(classifier.nearest_distance_km(&residence), 0.1);
    }

    #[test]
    fn test_exact_boundary_distance() {
        let facilities = FacilitySet::new(vec![Point::new(0.0, 0.0)]);
        let classifier = NearestBandClassifier::new(&facilities).unwrap();

        assert_eq!(classifier.classify(&Point::new(1000.0, 0.0)), Band::WithinOne);
        assert_eq!(classifier.classify(&Point::new(0.0, 2000.0)), Band::OneToTwo);
        assert_eq!(classifier.classify(&Point::new(-5000.0, 0.0)), Band::TwoToFive);
    }
}
