//! Benchmark orchestration: optional fill, worker launch, metrics pipeline, the
//! wait for the expected number of flushes and the final metrics drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, WorkerStats};
use crate::error::{BenchError, Result};
use crate::filler::{FillReport, Filler};
use crate::metrics::{
    FlushSummary, LatencyCollector, MetricsPipeline, MetricsSink, MetricsSnapshot,
    PipelineSettings, PipelineStats,
};
use crate::plan::RunPlan;
use crate::store::Store;
use crate::workload::{KeyCorpus, OperationDescriptor, WorkloadContext};

/// Interval between progress log lines
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Run-level options beyond the plan itself
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    /// Seed data before a read benchmark
    pub need_fake_data: bool,
    /// Records to seed
    pub fake_data_total: usize,
    /// Longest gap allowed between flush completions; `None` waits forever
    pub flush_timeout: Option<Duration>,
    pub pipeline: PipelineSettings,
}

/// Everything a finished run leaves behind
pub struct RunOutcome {
    pub plan: RunPlan,
    pub operation: &'static str,
    pub fill: Option<FillReport>,
    pub flushes: FlushSummary,
    pub snapshot: MetricsSnapshot,
    pub pipeline_stats: Arc<PipelineStats>,
    /// Detached worker handles; the run does not wait on them
    pub workers: Vec<JoinHandle<WorkerStats>>,
    /// Metrics loop handle, present only when it had not drained in time
    pub metrics_loop: Option<JoinHandle<()>>,
}

/// Drives one benchmark run against a store and a metrics sink
pub struct BenchmarkRunner<S: Store, K: MetricsSink> {
    plan: RunPlan,
    operation: &'static OperationDescriptor,
    store: Arc<S>,
    sink: K,
    settings: RunSettings,
    corpus: Arc<KeyCorpus>,
}

impl<S: Store, K: MetricsSink> BenchmarkRunner<S, K> {
    pub fn new(
        plan: RunPlan,
        operation: &'static OperationDescriptor,
        store: Arc<S>,
        sink: K,
        settings: RunSettings,
    ) -> Self {
        Self {
            plan,
            operation,
            store,
            sink,
            settings,
            corpus: Arc::new(KeyCorpus::new()),
        }
    }

    /// Key corpus shared by the filler and the workers
    pub fn corpus(&self) -> Arc<KeyCorpus> {
        self.corpus.clone()
    }

    /// Run the benchmark and wait for the expected number of metrics flushes
    pub async fn run(self) -> Result<RunOutcome> {
        let plan = self.plan;
        let op = self.operation;
        let ctx = WorkloadContext::new(
            self.corpus.clone(),
            plan.unique_key_budget,
            plan.payload_size,
        );

        let fill = if !op.is_write && self.settings.need_fake_data {
            let report = Filler::new(self.store.clone(), ctx.clone())
                .fill(op, self.settings.fake_data_total)
                .await;
            tracing::info!(
                succeeded = report.succeeded,
                failed = report.failed,
                "Inserted fake data"
            );
            if report.succeeded == 0 {
                tracing::error!("No fake data was written, aborting run");
                return Err(BenchError::EmptyCorpus);
            }
            Some(report)
        } else {
            None
        };

        let split = plan.work_split();
        if split.pipeline > 0 {
            tracing::info!("Using pipeline depth {}", split.pipeline);
        }

        let collector = Arc::new(LatencyCollector::new());
        let (pipeline, intake, mut tracker) = MetricsPipeline::new(
            self.sink,
            self.settings.pipeline.clone(),
            plan.expected_samples(),
            collector.clone(),
        );
        let pipeline_stats = pipeline.stats();

        collector.start();
        let dispatcher = Dispatcher::new(self.store.clone(), ctx, intake);
        let progress = dispatcher.progress();
        let workers = dispatcher.run(&plan, op);
        let mut metrics_loop = tokio::spawn(pipeline.run_loop());

        let expected = plan.expected_flushes();
        if expected == 0 {
            tracing::warn!(
                samples = plan.expected_samples(),
                "Fewer samples than one metrics batch, nothing to wait for"
            );
        } else {
            tracing::info!(expected = expected, "Waiting for metrics flushes");
        }

        let ticker = spawn_progress_ticker(progress, plan.scheduled_calls() as u64);
        let waited = tracker.wait_for(expected, self.settings.flush_timeout).await;

        let flushes = match waited {
            Ok(summary) => summary,
            Err(e) => {
                ticker.abort();
                collector.stop();
                tracing::error!("{}", e);
                return Err(e);
            }
        };
        if flushes.failed > 0 {
            tracing::warn!(failed = flushes.failed, "Some metrics batches failed to flush");
        }

        // The loop ends once the last worker drops its intake, so every sample is counted
        let drained = match self.settings.flush_timeout {
            Some(limit) => tokio::time::timeout(limit, &mut metrics_loop).await.ok(),
            None => Some((&mut metrics_loop).await),
        };
        ticker.abort();
        collector.stop();

        let metrics_loop = match drained {
            Some(Ok(())) => None,
            Some(Err(e)) => {
                tracing::error!("Metrics loop aborted: {}", e);
                None
            }
            None => {
                tracing::warn!(
                    received = pipeline_stats.received(),
                    expected = plan.expected_samples(),
                    "Metrics loop still draining, report covers samples received so far"
                );
                Some(metrics_loop)
            }
        };

        Ok(RunOutcome {
            plan,
            operation: op.name,
            fill,
            flushes,
            snapshot: collector.snapshot(),
            pipeline_stats,
            workers,
            metrics_loop,
        })
    }
}

/// Log issued calls once per interval until aborted
fn spawn_progress_ticker(progress: Arc<AtomicU64>, total: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let done = progress.load(Ordering::Relaxed);
            let percent = if total == 0 {
                100.0
            } else {
                done as f64 / total as f64 * 100.0
            };
            tracing::info!("Progress: {}/{} ({:.1}%)", done, total, percent);
        }
    })
}
