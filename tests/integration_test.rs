// Integration tests for kv-loadgen
//
// These tests drive full benchmark runs against the in-memory store and a
// recording metrics sink: fill, dispatch, batching and the flush wait.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use kv_loadgen::dispatcher::WorkerStats;
use kv_loadgen::error::{BenchError, SinkError};
use kv_loadgen::metrics::{MetricsSink, PointBatch};
use kv_loadgen::plan::RunPlan;
use kv_loadgen::report::RunReport;
use kv_loadgen::runner::{BenchmarkRunner, RunOutcome, RunSettings};
use kv_loadgen::store::{MockStore, MockStoreConfig};
use kv_loadgen::workload::lookup;

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Sink that remembers the size of every batch it receives
#[derive(Clone, Default)]
struct RecordingSink {
    sizes: Arc<Mutex<Vec<usize>>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn sizes(&self) -> Vec<usize> {
        self.sizes.lock().unwrap().clone()
    }
}

impl MetricsSink for RecordingSink {
    async fn send(&self, batch: PointBatch) -> Result<(), SinkError> {
        self.sizes.lock().unwrap().push(batch.len());
        if self.fail {
            return Err(SinkError::Status(500));
        }
        Ok(())
    }
}

fn plan(worker_count: usize, total_requests: usize, pipeline_depth: usize) -> RunPlan {
    RunPlan {
        worker_count,
        total_requests,
        pipeline_depth,
        unique_key_budget: total_requests,
        payload_size: 16,
    }
}

fn settings() -> RunSettings {
    RunSettings {
        flush_timeout: Some(Duration::from_secs(10)),
        ..Default::default()
    }
}

/// Join the detached workers so store counters are final
async fn settle(mut outcome: RunOutcome) -> (RunOutcome, Vec<WorkerStats>) {
    let mut stats = Vec::new();
    for worker in outcome.workers.drain(..) {
        stats.push(worker.await.unwrap());
    }
    assert!(outcome.metrics_loop.is_none());
    (outcome, stats)
}

// ==================================================================================================
// End-to-end runs
// ==================================================================================================

#[tokio::test]
async fn test_unpipelined_set_run() {
    let store = Arc::new(MockStore::default());
    let sink = RecordingSink::default();

    let runner = BenchmarkRunner::new(
        plan(4, 400, 0),
        lookup("set").unwrap(),
        store.clone(),
        sink.clone(),
        settings(),
    );
    let corpus = runner.corpus();
    let (outcome, workers) = settle(runner.run().await.unwrap()).await;

    assert_eq!(workers.len(), 4);
    for stats in &workers {
        assert_eq!(stats.rounds, 100);
        assert_eq!(stats.calls, 100);
        assert_eq!(stats.failures, 0);
    }
    assert_eq!(outcome.flushes.flushed, 4);
    assert_eq!(outcome.flushes.failed, 0);
    assert!(outcome.fill.is_none());
    assert_eq!(store.single_calls(), 400);
    assert_eq!(store.command_count("SET"), 400);
    assert_eq!(store.commits(), 0);
    assert_eq!(sink.sizes(), vec![100, 100, 100, 100]);
    assert_eq!(outcome.pipeline_stats.received(), 400);
    assert_eq!(outcome.pipeline_stats.unflushed(), 0);
    assert_eq!(corpus.len(), 400);
}

#[tokio::test]
async fn test_pipelined_get_run_with_fake_data() {
    let store = Arc::new(MockStore::default());
    let sink = RecordingSink::default();

    let runner = BenchmarkRunner::new(
        plan(5, 1000, 10),
        lookup("get").unwrap(),
        store.clone(),
        sink.clone(),
        RunSettings {
            need_fake_data: true,
            fake_data_total: 1000,
            ..settings()
        },
    );
    let (outcome, _) = settle(runner.run().await.unwrap()).await;

    let fill = outcome.fill.unwrap();
    assert_eq!(fill.succeeded, 1000);
    assert_eq!(fill.failed, 0);
    assert_eq!(store.command_count("SET"), 1000);

    // 5 workers x 20 rounds of 10 GETs
    assert_eq!(store.command_count("GET"), 1000);
    assert_eq!(store.commits(), 10 + 100);
    assert_eq!(store.single_calls(), 0);

    assert_eq!(outcome.flushes.flushed, 1);
    assert_eq!(sink.sizes(), vec![100]);
    assert_eq!(outcome.pipeline_stats.received(), 100);
    assert_eq!(outcome.pipeline_stats.unflushed(), 0);
}

#[tokio::test]
async fn test_uneven_division_drops_remainder() {
    let store = Arc::new(MockStore::default());
    let sink = RecordingSink::default();

    let runner = BenchmarkRunner::new(
        plan(5, 37, 0),
        lookup("set").unwrap(),
        store.clone(),
        sink.clone(),
        settings(),
    );
    let (outcome, _) = settle(runner.run().await.unwrap()).await;

    // 37 / 5 = 7 per worker, so 35 of 37 requested calls are scheduled
    assert_eq!(outcome.plan.scheduled_calls(), 35);
    assert_eq!(store.single_calls(), 35);
    assert_eq!(outcome.flushes.flushed, 0);
    assert!(sink.sizes().is_empty());
    assert_eq!(outcome.pipeline_stats.unflushed(), 35);

    let report = RunReport::from_outcome(&outcome);
    assert_eq!(report.requested_calls, 37);
    assert_eq!(report.scheduled_calls, 35);
    assert_eq!(report.unflushed_samples, 35);
    assert_eq!(report.samples, 35);
}

#[tokio::test]
async fn test_report_counts_samples_without_joining_workers() {
    let store = Arc::new(MockStore::new(MockStoreConfig {
        latency: Duration::from_millis(2),
        ..Default::default()
    }));

    let runner = BenchmarkRunner::new(
        plan(5, 37, 0),
        lookup("set").unwrap(),
        store,
        RecordingSink::default(),
        settings(),
    );
    let outcome = runner.run().await.unwrap();
    let report = RunReport::from_outcome(&outcome);

    assert_eq!(report.scheduled_calls, 35);
    assert_eq!(report.samples, 35);
    assert_eq!(report.failed_samples, 0);
    assert!(report.calls_per_second > 0.0);
    assert!(report.latency_p50_ms >= 2.0);
    assert_eq!(outcome.pipeline_stats.unflushed(), 35);
}

#[tokio::test]
async fn test_partial_batch_left_unflushed() {
    let store = Arc::new(MockStore::default());
    let sink = RecordingSink::default();

    let runner = BenchmarkRunner::new(
        plan(5, 250, 0),
        lookup("sadd").unwrap(),
        store.clone(),
        sink.clone(),
        settings(),
    );
    let (outcome, _) = settle(runner.run().await.unwrap()).await;

    assert_eq!(outcome.flushes.flushed, 2);
    assert_eq!(sink.sizes(), vec![100, 100]);
    assert_eq!(outcome.pipeline_stats.unflushed(), 50);
    assert_eq!(store.command_count("SADD"), 250);
}

// ==================================================================================================
// Failure handling
// ==================================================================================================

#[tokio::test]
async fn test_failing_sink_stalls_flush_wait() {
    let store = Arc::new(MockStore::default());

    let runner = BenchmarkRunner::new(
        plan(2, 200, 0),
        lookup("hset").unwrap(),
        store,
        RecordingSink::failing(),
        RunSettings {
            flush_timeout: Some(Duration::from_millis(500)),
            ..Default::default()
        },
    );

    match runner.run().await {
        Err(BenchError::FlushStalled {
            completed,
            expected,
            failed,
        }) => {
            assert_eq!(completed, 0);
            assert_eq!(expected, 2);
            assert_eq!(failed, 2);
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("run should stall on a failing sink"),
    }
}

#[tokio::test]
async fn test_failed_fill_aborts_read_run() {
    let store = Arc::new(MockStore::new(MockStoreConfig {
        error_rate: 1.0,
        ..Default::default()
    }));

    let runner = BenchmarkRunner::new(
        plan(2, 100, 0),
        lookup("smembers").unwrap(),
        store.clone(),
        RecordingSink::default(),
        RunSettings {
            need_fake_data: true,
            fake_data_total: 100,
            ..settings()
        },
    );

    let err = runner.run().await.err().unwrap();
    assert!(matches!(err, BenchError::EmptyCorpus));
    assert_eq!(store.command_count("SADD"), 100);
    assert_eq!(store.command_count("SMEMBERS"), 0);
}

#[tokio::test]
async fn test_store_failures_are_samples_not_errors() {
    let store = Arc::new(MockStore::new(MockStoreConfig {
        error_rate: 1.0,
        ..Default::default()
    }));
    let sink = RecordingSink::default();

    let runner = BenchmarkRunner::new(
        plan(1, 100, 0),
        lookup("zadd").unwrap(),
        store,
        sink.clone(),
        settings(),
    );
    let (outcome, _) = settle(runner.run().await.unwrap()).await;

    assert_eq!(outcome.flushes.flushed, 1);
    assert_eq!(sink.sizes(), vec![100]);
}

#[test]
fn test_unknown_operation() {
    let err = lookup("flushall").unwrap_err();
    assert!(matches!(err, BenchError::UnknownOperation(_)));
}
