//! Sweep report rendering

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{BenchmarkResult, SweepEntry};
use crate::util::format_throughput;
use crate::{DocBenchError, Result};

/// Output format of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = DocBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(DocBenchError::UnsupportedConfiguration(format!(
                "Unknown report format: {}",
                other
            ))),
        }
    }
}

fn write_benchmark(out: &mut String, result: &BenchmarkResult) {
    let _ = writeln!(out, "  {:<42} {}", "Benchmark type", result.benchmark_type());
    let _ = writeln!(out, "  {:<42} {}", "Concurrency level", result.concurrency_level());
    let _ = writeln!(
        out,
        "  {:<42} {:.2} ({})",
        "Average throughput (requests per second)",
        result.average_throughput(),
        format_throughput(result.average_throughput())
    );
}

/// Render one sweep entry
pub fn render_entry(entry: &SweepEntry, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(entry)?),
        ReportFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(
                out,
                "Results for {} process(es) at {}",
                entry.process_count,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
            write_benchmark(&mut out, entry.result.write());
            out.push('\n');
            write_benchmark(&mut out, entry.result.read());
            Ok(out)
        }
    }
}

/// Render a whole sweep; JSON output is one array
pub fn render_sweep(entries: &[SweepEntry], format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(entries)?),
        ReportFormat::Text => {
            let mut out = String::new();
            for entry in entries {
                out.push_str(&render_entry(entry, format)?);
                out.push('\n');
            }
            out.push_str(&render_summary(entries));
            Ok(out)
        }
    }
}

/// One row per process count with the summed write and read throughput
pub fn render_summary(entries: &[SweepEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:>18} {:>18}", "Processes", "Write (req/s)", "Read (req/s)");
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<10} {:>18.2} {:>18.2}",
            entry.process_count,
            entry.result.write().average_throughput(),
            entry.result.read().average_throughput()
        );
    }
    out
}
