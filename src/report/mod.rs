//! Report module: turns run outcomes into reports and renders them as text
//! blocks or JSON lines.

use serde::{Deserialize, Serialize};

use crate::bench::{RunOutcome, StatsSnapshot};
use crate::models::{BenchmarkReport, OperationKind};
use crate::util::units::{format_bytes, format_latency, format_mib_rate, mib_per_sec};
use crate::Result;

const SEPARATOR: &str = "----------------------------------------";

/// How reports are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human-readable block per benchmark
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Summarise a finished run
    pub fn report(outcome: &RunOutcome) -> BenchmarkReport {
        let (op_count, total_time_us, avg_us, min_us, max_us, throughput_ops_per_sec) =
            match outcome.snapshot {
                StatsSnapshot::Empty => (0, None, None, None, None, None),
                StatsSnapshot::Measured {
                    count,
                    total_us,
                    min_us,
                    max_us,
                    avg_us,
                    throughput_ops_per_sec,
                } => (
                    count,
                    Some(total_us),
                    Some(avg_us),
                    Some(min_us),
                    Some(max_us),
                    Some(throughput_ops_per_sec),
                ),
            };

        let throughput_mbps =
            total_time_us.and_then(|total| mib_per_sec(outcome.bytes_processed, total));

        BenchmarkReport {
            name: outcome.name.clone(),
            kind: outcome.kind,
            seed: outcome.seed,
            batch_size: outcome.batch_size,
            op_count,
            total_time_us,
            avg_us,
            min_us,
            max_us,
            throughput_ops_per_sec,
            not_found: outcome.not_found,
            failed: outcome.failed,
            commits: outcome.commits,
            rollbacks: outcome.rollbacks,
            wall_time_us: outcome.wall_time.as_secs_f64() * 1_000_000.0,
            bytes_processed: outcome.bytes_processed,
            throughput_mbps,
            status: outcome.status,
            error: outcome.error.as_ref().map(ToString::to_string),
            mix: outcome.mix,
        }
    }

    /// Render one report in the configured format
    pub fn render(&self, report: &BenchmarkReport) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(render_text(report)),
            OutputFormat::Json => Ok(serde_json::to_string(report)?),
        }
    }
}

fn render_text(report: &BenchmarkReport) -> String {
    let mut lines = vec![format!("\n{} Results:", report.name)];

    match (
        report.total_time_us,
        report.avg_us,
        report.min_us,
        report.max_us,
        report.throughput_ops_per_sec,
    ) {
        (Some(total), Some(avg), Some(min), Some(max), Some(rate)) => {
            lines.push(format!("  Total operations: {}", report.op_count));
            lines.push(format!("  Total time: {:.2} ms", total / 1000.0));
            lines.push(format!("  Average time: {:.2} µs", avg));
            lines.push(format!("  Min time: {:.2} µs", min));
            lines.push(format!("  Max time: {:.2} µs", max));
            lines.push(format!("  Throughput: {:.2} ops/sec", rate));
        }
        _ => lines.push("  No measured operations".to_string()),
    }

    if report.bytes_processed > 0 {
        let data = format_bytes(report.bytes_processed);
        lines.push(match report.throughput_mbps {
            Some(rate) => format!("  Data: {} ({})", data, format_mib_rate(rate)),
            None => format!("  Data: {}", data),
        });
    }
    if report.kind == OperationKind::Scan {
        lines.push(format!("  Rows scanned: {}", report.op_count));
    }
    if report.batch_size > 0 {
        lines.push(format!(
            "  Batch size: {} ({} commits, {} rollbacks)",
            report.batch_size, report.commits, report.rollbacks
        ));
    }
    if let Some(mix) = &report.mix {
        lines.push(format!(
            "  Mix: {} get, {} insert, {} update, {} delete",
            mix.get, mix.insert, mix.update, mix.delete
        ));
    }
    if report.not_found > 0 {
        lines.push(format!("  Not found: {}", report.not_found));
    }
    if report.is_failed() {
        lines.push(format!(
            "  FAILED after {} operations: {}",
            report.op_count,
            report.error.as_deref().unwrap_or("unknown backend failure")
        ));
    }
    lines.push(format!("  Wall time: {}", format_latency(report.wall_time_us)));
    lines.push(format!("  Seed: {}", report.seed));
    lines.push(SEPARATOR.to_string());
    lines.join("\n")
}
