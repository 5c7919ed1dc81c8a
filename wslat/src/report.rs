//! Human-readable rendering of run reports.

use std::fmt;
use wslat_client::RunReport;
use wslat_core::{Model, Summary};

/// Renders a [`RunReport`] as the text table printed at the end of a run.
///
/// Every latency is shown in nanoseconds, microseconds and milliseconds.
pub struct SummaryTable<'a>(pub &'a RunReport);

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let title = match report.model {
            Model::Push => "ONE-WAY LATENCY TEST RESULTS",
            Model::RequestResponse => "RTT LATENCY TEST RESULTS",
        };
        writeln!(f, "========== {title} ==========")?;
        writeln!(f, "Run: {} ({} model)", report.run_id, report.model)?;
        writeln!(
            f,
            "Ended: {} after {:.3} s",
            report.reason,
            report.elapsed.as_secs_f64()
        )?;

        let c = &report.counters;
        writeln!(
            f,
            "Messages: {} received, {} sent, {} malformed, {} send errors, {} unmatched",
            c.received, c.sent, c.parse_errors, c.send_errors, c.unmatched
        )?;
        writeln!(f, "Warm-up: {} of {} skipped", report.skipped, report.warmup)?;

        match report.model {
            Model::Push => write_summary(f, "One-way latency", &report.one_way)?,
            Model::RequestResponse => {
                if let Some(rtt) = &report.rtt {
                    write_summary(f, "Round-trip time", rtt)?;
                }
                write_summary(f, "Reply one-way latency", &report.one_way)?;
                if let Some(processing) = &report.server_processing {
                    write_summary(f, "Server processing", processing)?;
                }
            }
        }
        write!(f, "{}", "=".repeat(title.len() + 22))
    }
}

fn write_summary(f: &mut fmt::Formatter<'_>, label: &str, summary: &Summary) -> fmt::Result {
    writeln!(f, "{label}:")?;
    writeln!(f, "  Samples: {}", summary.count)?;
    if summary.is_empty() {
        return writeln!(f, "  (no samples after warm-up)");
    }
    write_latency(f, "Min", summary.min as f64)?;
    write_latency(f, "P10", summary.p10 as f64)?;
    write_latency(f, "P50", summary.p50 as f64)?;
    write_latency(f, "P90", summary.p90 as f64)?;
    write_latency(f, "P99", summary.p99 as f64)?;
    write_latency(f, "Max", summary.max as f64)?;
    write_latency(f, "Mean", summary.mean)
}

fn write_latency(f: &mut fmt::Formatter<'_>, name: &str, nanos: f64) -> fmt::Result {
    writeln!(
        f,
        "  {name}: {nanos:.0} ns ({:.3} µs, {:.3} ms)",
        nanos / 1_000.0,
        nanos / 1_000_000.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wslat_core::LatencyAggregator;

    fn summary(samples: &[i64]) -> Summary {
        let agg = LatencyAggregator::new(0);
        for s in samples {
            agg.add_sample(*s);
        }
        agg.summarize()
    }

    #[test]
    fn test_latency_units() {
        let s = summary(&[1_500_000]);
        let out = Line(&s).to_string();
        assert!(out.contains("Min: 1500000 ns (1500.000 µs, 1.500 ms)"));
        assert!(out.contains("Samples: 1"));
    }

    #[test]
    fn test_empty_summary() {
        let out = Line(&Summary::default()).to_string();
        assert!(out.contains("Samples: 0"));
        assert!(out.contains("no samples"));
        assert!(!out.contains("P50"));
    }

    struct Line<'a>(&'a Summary);

    impl fmt::Display for Line<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_summary(f, "Latency", self.0)
        }
    }
}
