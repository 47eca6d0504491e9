//! JSON output formatting
//!
//! The report is written once, at the end of a successful run, by the
//! coordinator only:
//!
//! ```json
//! {
//!   "tool_version": "0.1.0",
//!   "generated_at": "2024-05-01T12:00:00Z",
//!   "worker_count": 2,
//!   "elapsed_secs": 1.25,
//!   "per_worker": [ { "worker_id": 0, "total_processed": 3, "bands": [ ... ] } ],
//!   "aggregate": { "total_processed": 5, "bands": [ ... ] }
//! }
//! ```

use crate::classify::Band;
use crate::distributed::ProximityReport;
use crate::stats::{AggregateResult, WorkerTally};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// One band row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBand {
    pub band: String,
    /// Inclusive upper bound in km; absent for the open-ended band
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_km: Option<f64>,
    pub count: u64,
    pub percentage: f64,
}

/// One worker's tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonWorker {
    pub worker_id: usize,
    pub total_processed: u64,
    pub bands: Vec<JsonBand>,
}

/// Global result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonAggregate {
    pub total_processed: u64,
    pub bands: Vec<JsonBand>,
}

/// Complete report document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
    pub worker_count: usize,
    pub elapsed_secs: f64,
    pub per_worker: Vec<JsonWorker>,
    pub aggregate: JsonAggregate,
}

fn bands<F>(row: F) -> Vec<JsonBand>
where
    F: Fn(Band) -> (u64, f64),
{
    Band::ALL
        .iter()
        .map(|&band| {
            let (count, percentage) = row(band);
            JsonBand {
                band: band.label().to_string(),
                upper_km: band.upper_km(),
                count,
                percentage,
            }
        })
        .collect()
}

fn worker_to_json(tally: &WorkerTally) -> JsonWorker {
    JsonWorker {
        worker_id: tally.worker_id,
        total_processed: tally.total_processed,
        bands: bands(|b| (tally.count(b), tally.percentage(b))),
    }
}

fn aggregate_to_json(aggregate: &AggregateResult) -> JsonAggregate {
    JsonAggregate {
        total_processed: aggregate.total_processed,
        bands: bands(|b| (aggregate.count(b), aggregate.percentage(b))),
    }
}

/// Build the JSON document for a report
pub fn build_json_report(report: &ProximityReport, generated_at: DateTime<Utc>) -> JsonReport {
    JsonReport {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at,
        worker_count: report.worker_count,
        elapsed_secs: report.elapsed_secs(),
        per_worker: report.per_worker.iter().map(worker_to_json).collect(),
        aggregate: aggregate_to_json(&report.aggregate),
    }
}

/// Write the report as JSON to `output_path`
pub fn write_json_report(output_path: &Path, report: &ProximityReport, pretty: bool) -> Result<()> {
    let doc = build_json_report(report, Utc::now());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON report: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, &doc)?;
    } else {
        serde_json::to_writer(writer, &doc)?;
    }

    tracing::info!(path = %output_path.display(), "JSON report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::reducer::combine;
    use crate::stats::LocalAggregator;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn report() -> ProximityReport {
        let mut w0 = LocalAggregator::new(0);
        w0.record(Band::WithinOne);
        w0.record(Band::WithinOne);
        w0.record(Band::BeyondFive);
        let w1 = LocalAggregator::new(1);

        let (per_worker, aggregate) = combine(2, vec![w0.finalize(), w1.finalize()]).unwrap();
        ProximityReport {
            worker_count: 2,
            elapsed: Duration::from_millis(250),
            per_worker,
            aggregate,
        }
    }

    #[test]
    fn test_build_json_report() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let doc = build_json_report(&report(), at);

        assert_eq!(doc.worker_count, 2);
        assert_eq!(doc.elapsed_secs, 0.25);
        assert_eq!(doc.per_worker.len(), 2);
        assert_eq!(doc.per_worker[1].total_processed, 0);
        assert!(doc.per_worker[1].bands.iter().all(|b| b.percentage == 0.0));

        let within = &doc.aggregate.bands[0];
        assert_eq!(within.band, "0-1");
        assert_eq!(within.upper_km, Some(1.0));
        assert_eq!(within.count, 2);
        assert!((within.percentage - 66.666).abs() < 0.01);
        assert_eq!(doc.aggregate.bands[3].upper_km, None);
    }

    #[test]
    fn test_json_field_names() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let value = serde_json::to_value(build_json_report(&report(), at)).unwrap();

        for key in ["generated_at", "worker_count", "elapsed_secs", "per_worker", "aggregate"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["generated_at"], "2024-05-01T12:00:00Z");
        assert!(value["aggregate"]["bands"][3].get("upper_km").is_none());
    }

    #[test]
    fn test_write_json_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        write_json_report(&path, &report(), true).unwrap();

        let doc: JsonReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.aggregate.total_processed, 3);
        assert_eq!(doc.tool_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_write_to_missing_directory() {
        let err = write_json_report(Path::new("/nonexistent/dir/report.json"), &report(), false).unwrap_err();
        assert!(err.to_string().contains("Failed to create JSON report"));
    }
}
