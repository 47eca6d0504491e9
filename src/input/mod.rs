//! Input data access
//!
//! Two input files feed a run:
//!
//! - **Facilities**: whitespace-delimited coordinate pairs, loaded in full by
//!   every worker with [`load_facilities`].
//! - **Residences**: fixed-width text records, read by index through a
//!   [`RecordSource`] so that a worker only touches the records it owns.
//!
//! The classifier never performs file IO itself; it only sees [`Point`]s.

pub mod file;
pub mod generate;

use crate::error::ProximityError;
use crate::geo::{FacilitySet, Point, ResidenceRecord};
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::Path;

pub use file::FixedWidthRecordFile;

/// Random-access source of residence records
///
/// Index `i` addresses the `i`-th record in the source; workers use this to
/// jump straight to their owned records without scanning the ones in between.
pub trait RecordSource {
    /// Total number of records in the source
    fn record_count(&self) -> u64;

    /// Point stored at record `index`
    fn point_at(&mut self, index: u64) -> Result<Point>;

    /// Record `index` together with its position
    fn record_at(&mut self, index: u64) -> Result<ResidenceRecord> {
        let point = self.point_at(index)?;
        Ok(ResidenceRecord { index, point })
    }
}

/// Record source over points already in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecords {
    points: Vec<Point>,
}

impl InMemoryRecords {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

impl From<Vec<Point>> for InMemoryRecords {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl RecordSource for InMemoryRecords {
    fn record_count(&self) -> u64 {
        self.points.len() as u64
    }

    fn point_at(&mut self, index: u64) -> Result<Point> {
        self.points
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                ProximityError::invalid_input(format!(
                    "record {} out of range ({} records)",
                    index,
                    self.points.len()
                ))
                .into()
            })
    }
}

/// Parse one `x y` coordinate pair
///
/// Any run of ASCII whitespace separates the two values; anything after the
/// second value is rejected.
pub fn parse_point(text: &str) -> std::result::Result<Point, ProximityError> {
    let mut fields = text.split_ascii_whitespace();
    let x = parse_coord(fields.next(), text)?;
    let y = parse_coord(fields.next(), text)?;
    if let Some(extra) = fields.next() {
        return Err(ProximityError::invalid_input(format!(
            "unexpected trailing value '{}' in record '{}'",
            extra,
            text.trim()
        )));
    }
    Ok(Point::new(x, y))
}

fn parse_coord(field: Option<&str>, record: &str) -> std::result::Result<f64, ProximityError> {
    let field = field.ok_or_else(|| {
        ProximityError::invalid_input(format!("expected two coordinates in record '{}'", record.trim()))
    })?;
    let value: f64 = field.parse().map_err(|_| {
        ProximityError::invalid_input(format!("invalid coordinate '{}' in record '{}'", field, record.trim()))
    })?;
    if !value.is_finite() {
        return Err(ProximityError::invalid_input(format!(
            "non-finite coordinate '{}' in record '{}'",
            field,
            record.trim()
        )));
    }
    Ok(value)
}

/// Parse facility coordinates from text
///
/// Values are read as a flat whitespace-delimited stream and paired up, so
/// one pair per line and several pairs per line are both accepted.
pub fn parse_facilities(contents: &str) -> std::result::Result<FacilitySet, ProximityError> {
    let mut points = Vec::new();
    let mut pending: Option<(f64, usize)> = None;

    for (line_no, line) in contents.lines().enumerate() {
        for field in line.split_ascii_whitespace() {
            let value = parse_coord(Some(field), line).map_err(|e| at_line(e, line_no + 1))?;
            match pending.take() {
                Some((x, _)) => points.push(Point::new(x, value)),
                None => pending = Some((value, line_no + 1)),
            }
        }
    }

    if let Some((_, line)) = pending {
        return Err(ProximityError::invalid_input(format!(
            "line {}: facility coordinate has no matching y value",
            line
        )));
    }

    Ok(FacilitySet::new(points))
}

fn at_line(err: ProximityError, line: usize) -> ProximityError {
    match err {
        ProximityError::InvalidInput(msg) => ProximityError::InvalidInput(format!("line {}: {}", line, msg)),
        other => other,
    }
}

/// Load the facility file at `path`
///
/// An empty file loads as an empty set; rejecting it is left to
/// classification time.
pub fn load_facilities(path: &Path) -> Result<FacilitySet> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read facility file: {}", path.display()))?;

    let facilities = parse_facilities(&contents)
        .with_context(|| format!("Failed to parse facility file: {}", path.display()))?;

    tracing::debug!(path = %path.display(), facilities = facilities.len(), "loaded facility set");
    Ok(facilities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("  631204.5  4833112.25\n").unwrap(), Point::new(631204.5, 4833112.25));
        assert_eq!(parse_point("1\t-2").unwrap(), Point::new(1.0, -2.0));
    }

    #[test]
    fn test_parse_point_rejects_malformed() {
        assert!(parse_point("").is_err());
        assert!(parse_point("12.5").is_err());
        assert!(parse_point("12.5 abc").is_err());
        assert!(parse_point("1 2 3").is_err());
        assert!(parse_point("inf 2").is_err());
        assert!(parse_point("NaN 2").is_err());
    }

    #[test]
    fn test_parse_facilities() {
        let set = parse_facilities("0 0\n\n1000.5 2000\n  3 4 5 6\n").unwrap();
        assert_eq!(
            set.as_slice(),
            &[
                Point::new(0.0, 0.0),
                Point::new(1000.5, 2000.0),
                Point::new(3.0, 4.0),
                Point::new(5.0, 6.0),
            ]
        );
    }

    #[test]
    fn test_parse_facilities_odd_value_count() {
        let err = parse_facilities("1 2\n3\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_facilities_empty() {
        assert!(parse_facilities("").unwrap().is_empty());
        assert!(parse_facilities("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_load_facilities_missing_file() {
        let err = load_facilities(Path::new("/nonexistent/facilities.dat")).unwrap_err();
        assert!(err.to_string().contains("Failed to read facility file"));
    }

    #[test]
    fn test_in_memory_records() {
        let mut records = InMemoryRecords::new(vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);
        assert_eq!(records.record_count(), 2);
        assert_eq!(records.point_at(1).unwrap(), Point::new(2.0, 2.0));
        assert_eq!(
            records.record_at(0).unwrap(),
            ResidenceRecord { index: 0, point: Point::new(1.0, 1.0) }
        );

        let err = records.point_at(2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProximityError>(),
            Some(ProximityError::InvalidInput(_))
        ));
    }
}
