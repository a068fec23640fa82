//! Non-blocking metrics pipeline.
//!
//! Workers submit samples through a [`MetricsIntake`] without ever waiting. A single
//! loop drains the intake into fixed-size batches and hands each full batch to a
//! spawned flush task. Every successful flush reports one completion on the
//! [`FlushTracker`], which the orchestrator uses to wait for the run to finish.
//! The final partial batch is never flushed; its size is kept in [`PipelineStats`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;

use super::collector::LatencyCollector;
use super::sample::{Point, PointBatch, Sample};
use super::sink::MetricsSink;
use crate::error::{BenchError, Result};
use crate::plan::FLUSH_BATCH_SIZE;

/// Settings for the metrics pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Sink database the batches are written to
    pub database: String,
    /// Measurement name of every point
    pub measurement: String,
    /// Samples per flushed batch
    pub batch_size: usize,
    /// Flush tasks allowed in flight at once
    pub max_inflight_flushes: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            database: "udp".to_string(),
            measurement: "kv_loadgen".to_string(),
            batch_size: FLUSH_BATCH_SIZE,
            max_inflight_flushes: 16,
        }
    }
}

/// Counters describing what happened to submitted samples
#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    dropped: AtomicU64,
    received: AtomicU64,
    flushed_batches: AtomicU64,
    failed_batches: AtomicU64,
    unflushed: AtomicU64,
}

impl PipelineStats {
    /// Samples accepted by the intake
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Samples rejected because the intake was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Samples drained by the metrics loop
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn flushed_batches(&self) -> u64 {
        self.flushed_batches.load(Ordering::Relaxed)
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Relaxed)
    }

    /// Samples left in the final partial batch once the intake closed
    pub fn unflushed(&self) -> u64 {
        self.unflushed.load(Ordering::Relaxed)
    }
}

/// Producer side of the pipeline, cloned into every worker
#[derive(Debug, Clone)]
pub struct MetricsIntake {
    tx: mpsc::Sender<Sample>,
    stats: Arc<PipelineStats>,
}

impl MetricsIntake {
    /// Enqueue a sample without blocking.
    ///
    /// The intake is sized to the run's sample count, so a full queue means the plan
    /// was exceeded; such samples are counted as dropped.
    pub fn submit(&self, sample: Sample) {
        match self.tx.try_send(sample) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Metrics intake full, dropping sample");
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Metrics intake closed, dropping sample");
            }
        }
    }
}

/// Result of one flush task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed { points: usize },
    Failed,
}

/// Completion counts observed by [`FlushTracker::wait_for`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub flushed: u64,
    pub failed: u64,
}

/// Receives one outcome per flush task
#[derive(Debug)]
pub struct FlushTracker {
    rx: mpsc::UnboundedReceiver<FlushOutcome>,
}

impl FlushTracker {
    /// Wait until `expected` batches have been flushed successfully.
    ///
    /// Failed flushes never count towards `expected`. `timeout` bounds the gap between
    /// two completions, not the whole wait. Fails with [`BenchError::FlushStalled`] when
    /// no completion arrives within `timeout`, or when the pipeline has shut down and
    /// no further completion can arrive.
    pub async fn wait_for(
        &mut self,
        expected: u64,
        timeout: Option<Duration>,
    ) -> Result<FlushSummary> {
        let mut summary = FlushSummary::default();

        while summary.flushed < expected {
            let next = match timeout {
                Some(idle) => tokio::time::timeout(idle, self.rx.recv())
                    .await
                    .unwrap_or(None),
                None => self.rx.recv().await,
            };

            match next {
                Some(FlushOutcome::Flushed { .. }) => summary.flushed += 1,
                Some(FlushOutcome::Failed) => summary.failed += 1,
                None => {
                    return Err(BenchError::FlushStalled {
                        completed: summary.flushed,
                        expected,
                        failed: summary.failed,
                    })
                }
            }
        }

        Ok(summary)
    }
}

/// Consumer side of the pipeline: batches samples and spawns flushes
pub struct MetricsPipeline<K: MetricsSink> {
    rx: mpsc::Receiver<Sample>,
    sink: Arc<K>,
    settings: PipelineSettings,
    stats: Arc<PipelineStats>,
    collector: Arc<LatencyCollector>,
    completions: mpsc::UnboundedSender<FlushOutcome>,
    flush_permits: Arc<Semaphore>,
}

impl<K: MetricsSink> MetricsPipeline<K> {
    /// Build a pipeline whose intake holds up to `capacity` samples
    pub fn new(
        sink: K,
        settings: PipelineSettings,
        capacity: usize,
        collector: Arc<LatencyCollector>,
    ) -> (Self, MetricsIntake, FlushTracker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (completions, completions_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(PipelineStats::default());
        let flush_permits = Arc::new(Semaphore::new(settings.max_inflight_flushes.max(1)));

        let pipeline = Self {
            rx,
            sink: Arc::new(sink),
            settings,
            stats: stats.clone(),
            collector,
            completions,
            flush_permits,
        };
        let intake = MetricsIntake { tx, stats };
        let tracker = FlushTracker { rx: completions_rx };

        (pipeline, intake, tracker)
    }

    /// Shared counters, readable after the loop has been spawned
    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Drain the intake until every producer is gone
    pub async fn run_loop(mut self) {
        let batch_size = self.settings.batch_size.max(1);
        let mut batch = self.new_batch();

        while let Some(sample) = self.rx.recv().await {
            self.stats.received.fetch_add(1, Ordering::Relaxed);
            self.collector.record(&sample);
            batch.add(Point::from_sample(&self.settings.measurement, &sample));

            if batch.len() >= batch_size {
                let full = std::mem::replace(&mut batch, self.new_batch());
                self.spawn_flush(full).await;
            }
        }

        self.stats
            .unflushed
            .store(batch.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            received = self.stats.received(),
            unflushed = batch.len(),
            "Metrics intake closed"
        );
    }

    fn new_batch(&self) -> PointBatch {
        PointBatch::new(&self.settings.database, self.settings.batch_size)
    }

    async fn spawn_flush(&self, batch: PointBatch) {
        let permit = match self.flush_permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let sink = self.sink.clone();
        let stats = self.stats.clone();
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let points = batch.len();
            let outcome = match sink.send(batch).await {
                Ok(()) => {
                    stats.flushed_batches.fetch_add(1, Ordering::Relaxed);
                    FlushOutcome::Flushed { points }
                }
                Err(e) => {
                    stats.failed_batches.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(points = points, "Failed to flush metrics batch: {}", e);
                    FlushOutcome::Failed
                }
            };
            let _ = completions.send(outcome);
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use std::sync::Mutex;

    /// Sink that remembers batch sizes and can be told to fail
    #[derive(Default)]
    struct RecordingSink {
        sizes: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl MetricsSink for Arc<RecordingSink> {
        async fn send(&self, batch: PointBatch) -> std::result::Result<(), SinkError> {
            self.sizes.lock().unwrap().push(batch.len());
            if self.fail {
                return Err(SinkError::Status(503));
            }
            Ok(())
        }
    }

    fn pipeline(
        sink: Arc<RecordingSink>,
        capacity: usize,
    ) -> (MetricsPipeline<Arc<RecordingSink>>, MetricsIntake, FlushTracker) {
        MetricsPipeline::new(
            sink,
            PipelineSettings::default(),
            capacity,
            Arc::new(LatencyCollector::new()),
        )
    }

    fn sample() -> Sample {
        Sample::new("set", Duration::from_micros(100), true)
    }

    #[tokio::test]
    async fn test_flush_every_hundred_samples() {
        let sink = Arc::new(RecordingSink::default());
        let (pipeline, intake, mut tracker) = pipeline(sink.clone(), 250);
        let stats = pipeline.stats();
        let handle = tokio::spawn(pipeline.run_loop());

        for _ in 0..250 {
            intake.submit(sample());
        }
        drop(intake);

        let summary = tracker
            .wait_for(2, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(summary, FlushSummary { flushed: 2, failed: 0 });

        handle.await.unwrap();
        assert_eq!(*sink.sizes.lock().unwrap(), vec![100, 100]);
        assert_eq!(stats.submitted(), 250);
        assert_eq!(stats.received(), 250);
        assert_eq!(stats.flushed_batches(), 2);
        assert_eq!(stats.unflushed(), 50);
        assert_eq!(stats.dropped(), 0);
    }

    #[tokio::test]
    async fn test_no_flush_below_batch_size() {
        let sink = Arc::new(RecordingSink::default());
        let (pipeline, intake, mut tracker) = pipeline(sink.clone(), 99);
        let stats = pipeline.stats();
        let handle = tokio::spawn(pipeline.run_loop());

        for _ in 0..99 {
            intake.submit(sample());
        }
        drop(intake);
        handle.await.unwrap();

        assert!(sink.sizes.lock().unwrap().is_empty());
        assert_eq!(stats.unflushed(), 99);
        assert_eq!(tracker.wait_for(0, None).await.unwrap(), FlushSummary::default());
    }

    #[tokio::test]
    async fn test_full_intake_drops_instead_of_blocking() {
        let sink = Arc::new(RecordingSink::default());
        let (pipeline, intake, _tracker) = pipeline(sink, 2);
        let stats = pipeline.stats();

        intake.submit(sample());
        intake.submit(sample());
        intake.submit(sample());

        assert_eq!(stats.submitted(), 2);
        assert_eq!(stats.dropped(), 1);
        drop(pipeline);
    }

    #[tokio::test]
    async fn test_failed_flush_stalls_wait() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let (pipeline, intake, mut tracker) = pipeline(sink, 100);
        let stats = pipeline.stats();
        let handle = tokio::spawn(pipeline.run_loop());

        for _ in 0..100 {
            intake.submit(sample());
        }
        drop(intake);

        let err = tracker
            .wait_for(1, Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        match err {
            BenchError::FlushStalled {
                completed,
                expected,
                failed,
            } => {
                assert_eq!(completed, 0);
                assert_eq!(expected, 1);
                assert_eq!(failed, 1);
            }
            other => panic!("expected FlushStalled, got {:?}", other),
        }
        handle.await.unwrap();
        assert_eq!(stats.failed_batches(), 1);
    }

    #[tokio::test]
    async fn test_wait_times_out_while_producers_alive() {
        let sink = Arc::new(RecordingSink::default());
        let (pipeline, intake, mut tracker) = pipeline(sink, 10);
        let _handle = tokio::spawn(pipeline.run_loop());

        intake.submit(sample());
        let err = tracker
            .wait_for(1, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::FlushStalled { completed: 0, .. }));
    }

    #[tokio::test]
    async fn test_steady_flushes_outlast_idle_timeout() {
        let sink = Arc::new(RecordingSink::default());
        let (pipeline, intake, mut tracker) = pipeline(sink.clone(), 300);
        let handle = tokio::spawn(pipeline.run_loop());

        let producer = tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(80)).await;
                for _ in 0..100 {
                    intake.submit(sample());
                }
            }
        });

        // ~240 ms in total, but no gap between completions reaches 150 ms
        let summary = tracker
            .wait_for(3, Some(Duration::from_millis(150)))
            .await
            .unwrap();
        assert_eq!(summary, FlushSummary { flushed: 3, failed: 0 });

        producer.await.unwrap();
        handle.await.unwrap();
        assert_eq!(*sink.sizes.lock().unwrap(), vec![100, 100, 100]);
    }
}
