//! Worker dispatch: runs the chosen operation across concurrent workers.
//!
//! Each worker performs its share of rounds independently. A round is either one
//! un-pipelined call or one pipelined batch, and yields exactly one sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::metrics::{MetricsIntake, Sample};
use crate::plan::{RunPlan, WorkSplit};
use crate::store::{Pipeline, Store};
use crate::workload::{OperationDescriptor, WorkloadContext};

/// What one worker did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker_id: usize,
    /// Units of work completed (samples submitted)
    pub rounds: u64,
    /// Store calls issued
    pub calls: u64,
    /// Units of work that failed
    pub failures: u64,
}

/// Spawns and drives benchmark workers
pub struct Dispatcher<S: Store> {
    store: Arc<S>,
    ctx: WorkloadContext,
    intake: MetricsIntake,
    /// Store calls issued so far across all workers
    progress: Arc<AtomicU64>,
}

impl<S: Store> Dispatcher<S> {
    pub fn new(store: Arc<S>, ctx: WorkloadContext, intake: MetricsIntake) -> Self {
        Self {
            store,
            ctx,
            intake,
            progress: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of store calls issued, for progress reporting
    pub fn progress(&self) -> Arc<AtomicU64> {
        self.progress.clone()
    }

    /// Launch `plan.worker_count` workers running `operation`.
    ///
    /// Workers are detached: the handles may be awaited, but completion of a run is
    /// observed through the metrics pipeline. Consumes the dispatcher so that its
    /// intake handle is released once the last worker finishes.
    pub fn run(
        self,
        plan: &RunPlan,
        operation: &'static OperationDescriptor,
    ) -> Vec<JoinHandle<WorkerStats>> {
        let split = plan.work_split();
        tracing::info!(
            op = operation.name,
            workers = plan.worker_count,
            rounds = split.rounds,
            pipeline = split.pipeline,
            "Starting workers"
        );

        (0..plan.worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    worker_id,
                    store: self.store.clone(),
                    ctx: self.ctx.clone(),
                    intake: self.intake.clone(),
                    progress: self.progress.clone(),
                    operation,
                    split,
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }
}

struct Worker<S: Store> {
    worker_id: usize,
    store: Arc<S>,
    ctx: WorkloadContext,
    intake: MetricsIntake,
    progress: Arc<AtomicU64>,
    operation: &'static OperationDescriptor,
    split: WorkSplit,
}

impl<S: Store> Worker<S> {
    async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats {
            worker_id: self.worker_id,
            ..Default::default()
        };

        for _ in 0..self.split.rounds {
            let sample = if self.split.pipeline > 0 {
                self.pipelined_round(self.split.pipeline).await
            } else {
                self.single_round().await
            };

            stats.rounds += 1;
            stats.calls += sample.calls;
            if !sample.succeeded {
                stats.failures += 1;
            }
            self.progress.fetch_add(sample.calls, Ordering::Relaxed);
            self.intake.submit(sample);
        }

        tracing::debug!(
            worker = self.worker_id,
            rounds = stats.rounds,
            failures = stats.failures,
            "Worker finished"
        );
        stats
    }

    async fn single_round(&self) -> Sample {
        let start = Instant::now();
        let succeeded = match self.operation.generate(&self.ctx, true) {
            Ok(command) => match self.store.execute(command).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(worker = self.worker_id, "Store call failed: {}", e);
                    false
                }
            },
            Err(e) => {
                tracing::debug!(worker = self.worker_id, "Cannot build command: {}", e);
                false
            }
        };
        Sample::new(self.operation.name, start.elapsed(), succeeded)
    }

    /// One batch of `depth` calls, timed as a whole.
    ///
    /// Individual replies are not observable; the batch fails when its commit fails or
    /// when a call could not be generated.
    async fn pipelined_round(&self, depth: usize) -> Sample {
        let start = Instant::now();
        let mut pipeline = Pipeline::with_capacity(depth);
        let mut generated = true;

        for _ in 0..depth {
            match self.operation.generate(&self.ctx, true) {
                Ok(command) => pipeline.enqueue(command),
                Err(e) => {
                    tracing::debug!(worker = self.worker_id, "Cannot build command: {}", e);
                    generated = false;
                }
            }
        }

        let committed = match self.store.commit(pipeline).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(worker = self.worker_id, "Pipeline commit failed: {}", e);
                false
            }
        };

        Sample::new(self.operation.name, start.elapsed(), committed && generated)
            .with_calls(depth as u64)
    }
}
