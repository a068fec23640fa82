//! Pre-populates the store and the key corpus before a read benchmark.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::store::{Pipeline, Store};
use crate::workload::{OperationDescriptor, WorkloadContext};

/// Writes per pipelined round trip while filling
pub const FILL_BATCH_SIZE: usize = 100;

/// Concurrent fill tasks, independent of the benchmark's worker count
pub const FILL_CONCURRENCY: usize = 4;

/// Outcome of a fill: records written and records whose batch failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub succeeded: u64,
    pub failed: u64,
}

impl FillReport {
    fn merge(&mut self, other: FillReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Split `total` into batches of at most `batch_size`
fn batch_sizes(total: usize, batch_size: usize) -> Vec<usize> {
    let batch_size = batch_size.max(1);
    let mut sizes = vec![batch_size; total / batch_size];
    if total % batch_size > 0 {
        sizes.push(total % batch_size);
    }
    sizes
}

/// Seeds data through pipelined writes of the target's seed operation
pub struct Filler<S: Store> {
    store: Arc<S>,
    ctx: WorkloadContext,
    concurrency: usize,
    batch_size: usize,
}

impl<S: Store> Filler<S> {
    pub fn new(store: Arc<S>, ctx: WorkloadContext) -> Self {
        Self {
            store,
            ctx,
            concurrency: FILL_CONCURRENCY,
            batch_size: FILL_BATCH_SIZE,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Write `total` records for `target`'s seed operation.
    ///
    /// A batch whose commit fails counts every record in it as failed and adds nothing to
    /// the corpus; nothing is retried.
    pub async fn fill(&self, target: &'static OperationDescriptor, total: usize) -> FillReport {
        let seed = target.seed_operation();
        let batches = batch_sizes(total, self.batch_size);
        tracing::info!(
            op = target.name,
            seed = seed.name,
            records = total,
            batches = batches.len(),
            "Filling fake data"
        );

        let mut tasks = JoinSet::new();
        for filler in 0..self.concurrency.min(batches.len()) {
            let share: Vec<usize> = batches
                .iter()
                .skip(filler)
                .step_by(self.concurrency)
                .copied()
                .collect();
            let store = self.store.clone();
            let ctx = self.ctx.clone();

            tasks.spawn(async move {
                let mut report = FillReport::default();
                for size in share {
                    let mut pipeline = Pipeline::with_capacity(size);
                    let mut written = Vec::with_capacity(size);
                    for _ in 0..size {
                        match seed.generate_with_records(&ctx) {
                            Ok((command, records)) => {
                                pipeline.enqueue(command);
                                written.extend(records);
                            }
                            Err(e) => tracing::debug!("Failed to generate fill command: {}", e),
                        }
                    }

                    match store.commit(pipeline).await {
                        Ok(()) => {
                            ctx.corpus.extend(written);
                            report.succeeded += size as u64;
                        }
                        Err(e) => {
                            report.failed += size as u64;
                            tracing::debug!(filler = filler, "Fill batch failed: {}", e);
                        }
                    }
                }
                report
            });
        }

        let mut report = FillReport::default();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(part) => report.merge(part),
                Err(e) => tracing::error!("Fill task aborted: {}", e),
            }
        }
        report
    }
}
