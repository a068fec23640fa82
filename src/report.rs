//! Report generation for benchmark results.

use serde::{Deserialize, Serialize};

use crate::filler::FillReport;
use crate::plan::RunPlan;
use crate::runner::RunOutcome;

/// End-of-run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub operation: String,
    pub workers: usize,
    pub requested_calls: usize,
    pub scheduled_calls: usize,
    pub pipeline: usize,
    pub fake_data_succeeded: Option<u64>,
    pub fake_data_failed: Option<u64>,
    pub samples: u64,
    pub failed_samples: u64,
    pub success_rate: f64,
    pub calls_per_second: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_max_ms: f64,
    pub elapsed_secs: f64,
    pub flushed_batches: u64,
    pub failed_batches: u64,
    /// Samples in the final partial batch, which is never flushed
    pub unflushed_samples: usize,
    pub dropped_samples: u64,
}

impl RunReport {
    /// Create a report from a finished run
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let snapshot = &outcome.snapshot;
        let plan: &RunPlan = &outcome.plan;
        let split = plan.work_split();

        Self {
            operation: outcome.operation.to_string(),
            workers: plan.worker_count,
            requested_calls: plan.total_requests,
            scheduled_calls: plan.scheduled_calls(),
            pipeline: split.pipeline,
            fake_data_succeeded: outcome.fill.map(|f: FillReport| f.succeeded),
            fake_data_failed: outcome.fill.map(|f| f.failed),
            samples: snapshot.success_count + snapshot.error_count,
            failed_samples: snapshot.error_count,
            success_rate: snapshot.success_rate,
            calls_per_second: snapshot.calls_per_second,
            latency_p50_ms: snapshot.latency_p50,
            latency_p95_ms: snapshot.latency_p95,
            latency_p99_ms: snapshot.latency_p99,
            latency_max_ms: snapshot.latency_max,
            elapsed_secs: snapshot.elapsed_secs,
            flushed_batches: outcome.flushes.flushed,
            failed_batches: outcome.flushes.failed,
            unflushed_samples: plan.expected_remainder(),
            dropped_samples: outcome.pipeline_stats.dropped(),
        }
    }

    /// Print the report as an ASCII table
    pub fn print_table(&self) {
        println!();
        println!("┌────────────┬──────────┬────────────┬──────────┬──────────┬──────────┬──────────┬──────────┐");
        println!("│ Operation  │ Pipeline │ Calls/sec  │  p50(ms) │  p95(ms) │  p99(ms) │  max(ms) │ Success% │");
        println!("├────────────┼──────────┼────────────┼──────────┼──────────┼──────────┼──────────┼──────────┤");
        println!(
            "│ {:<10} │ {:>8} │ {:>10.1} │ {:>8.2} │ {:>8.2} │ {:>8.2} │ {:>8.2} │ {:>7.1}% │",
            self.operation,
            self.pipeline,
            self.calls_per_second,
            self.latency_p50_ms,
            self.latency_p95_ms,
            self.latency_p99_ms,
            self.latency_max_ms,
            self.success_rate
        );
        println!("└────────────┴──────────┴────────────┴──────────┴──────────┴──────────┴──────────┴──────────┘");
        println!();

        if let (Some(succeeded), Some(failed)) = (self.fake_data_succeeded, self.fake_data_failed) {
            println!(
                "Inserting fake data. Success: {}, Failure: {}.",
                succeeded, failed
            );
        }
        println!(
            "Workers: {}, calls scheduled: {} of {} requested",
            self.workers, self.scheduled_calls, self.requested_calls
        );
        println!(
            "Samples: {} ({} failed), metrics batches flushed: {} ({} failed), unflushed samples: {}",
            self.samples,
            self.failed_samples,
            self.flushed_batches,
            self.failed_batches,
            self.unflushed_samples
        );
        if self.dropped_samples > 0 {
            println!("Dropped samples: {}", self.dropped_samples);
        }
        println!();
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
