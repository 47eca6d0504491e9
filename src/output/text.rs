//! Human-readable text output

use crate::classify::Band;
use crate::distributed::ProximityReport;
use std::fmt::Write;

const TITLE: &str = "Proximity of Residential Addresses to Facilities";

/// Render the console report
///
/// Layout:
/// - title and run summary (worker count, elapsed seconds)
/// - one table per worker, ordered by worker id (when `per_worker` is set)
/// - the aggregate table
pub fn render_report(report: &ProximityReport, per_worker: bool) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", TITLE);
    let _ = writeln!(out, "{}", "-".repeat(TITLE.len()));
    let _ = writeln!(out);
    let _ = writeln!(out, "{:<27}{}", "Number of workers:", report.worker_count);
    let _ = writeln!(out, "{:<27}{:.6}", "Elapsed time in seconds:", report.elapsed_secs());
    let _ = writeln!(out);

    if per_worker {
        for tally in &report.per_worker {
            let _ = writeln!(
                out,
                "Worker #{} Results for {} Addresses",
                tally.worker_id,
                format_number(tally.total_processed)
            );
            let _ = writeln!(out);
            render_table(&mut out, |band| (tally.count(band), tally.percentage(band)));
        }
    }

    let aggregate = &report.aggregate;
    let _ = writeln!(
        out,
        "Aggregate Results for all {} Addresses",
        format_number(aggregate.total_processed)
    );
    let _ = writeln!(out);
    render_table(&mut out, |band| (aggregate.count(band), aggregate.percentage(band)));

    out
}

/// Print the console report
pub fn print_report(report: &ProximityReport, per_worker: bool) {
    print!("{}", render_report(report, per_worker));
}

fn render_table<F>(out: &mut String, row: F)
where
    F: Fn(Band) -> (u64, f64),
{
    let _ = writeln!(out, "{:<22}{:>20}{:>20}", "Nearest Facility (km)", "# of Addresses", "% of Addresses");
    let _ = writeln!(out, "{:<22}{:>20}{:>20}", "-".repeat(21), "-".repeat(14), "-".repeat(14));
    for band in Band::ALL {
        let (count, pct) = row(band);
        let _ = writeln!(out, "{:>12}{:>30}{:>20.2}", band.label(), format_number(count), pct);
    }
    let _ = writeln!(out);
}

/// Format number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::reducer::combine;
    use crate::stats::LocalAggregator;
    use std::time::Duration;

    fn report() -> ProximityReport {
        let mut w0 = LocalAggregator::new(0);
        w0.record(Band::WithinOne);
        w0.record(Band::TwoToFive);
        let mut w1 = LocalAggregator::new(1);
        w1.record(Band::OneToTwo);
        w1.record(Band::BeyondFive);

        let (per_worker, aggregate) = combine(2, vec![w0.finalize(), w1.finalize()]).unwrap();
        ProximityReport {
            worker_count: 2,
            elapsed: Duration::from_millis(1500),
            per_worker,
            aggregate,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_render_report() {
        let text = render_report(&report(), true);

        assert!(text.starts_with(TITLE));
        assert!(text.contains("Number of workers:         2"));
        assert!(text.contains("Elapsed time in seconds:   1.500000"));
        assert!(text.contains("Worker #0 Results for 2 Addresses"));
        assert!(text.contains("Worker #1 Results for 2 Addresses"));
        assert!(text.contains("Aggregate Results for all 4 Addresses"));
        assert!(text.contains("Nearest Facility (km)"));
        // Aggregate rows: one address per band, 25% each
        assert_eq!(text.matches("25.00").count(), 4);
        assert!(text.contains("> 5"));
    }

    #[test]
    fn test_render_aggregate_only() {
        let text = render_report(&report(), false);
        assert!(!text.contains("Worker #"));
        assert!(text.contains("Aggregate Results"));
    }

    #[test]
    fn test_rows_line_up() {
        let text = render_report(&report(), false);
        let widths: Vec<usize> = text
            .lines()
            .filter(|l| ["0-1", "1-2", "2-5", "> 5"].iter().any(|b| l.trim_start().starts_with(b)))
            .map(str::len)
            .collect();
        assert_eq!(widths.len(), 4);
        assert!(widths.iter().all(|&w| w == widths[0]));
    }
}
