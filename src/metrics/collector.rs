//! Run-wide latency summary using HdrHistogram for accurate percentile calculations.

use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::sample::Sample;

/// Thread-safe latency collector fed by the metrics loop
pub struct LatencyCollector {
    /// Histogram for unit-of-work latency (microseconds)
    latency_histogram: Mutex<Histogram<u64>>,
    /// Units of work that succeeded
    success_count: AtomicU64,
    /// Units of work that failed
    error_count: AtomicU64,
    /// Store calls represented by the recorded units
    calls: AtomicU64,
    start_time: Mutex<Option<Instant>>,
    end_time: Mutex<Option<Instant>>,
}

impl LatencyCollector {
    pub fn new() -> Self {
        Self {
            // Latencies up to 10 minutes with 3 significant figures
            latency_histogram: Mutex::new(
                Histogram::new_with_bounds(1, 600_000_000, 3).expect("static histogram bounds"),
            ),
            success_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            calls: AtomicU64::new(0),
            start_time: Mutex::new(None),
            end_time: Mutex::new(None),
        }
    }

    /// Mark the start of the measured phase
    pub fn start(&self) {
        if let Ok(mut start) = self.start_time.lock() {
            *start = Some(Instant::now());
        }
    }

    /// Mark the end of the measured phase
    pub fn stop(&self) {
        if let Ok(mut end) = self.end_time.lock() {
            *end = Some(Instant::now());
        }
    }

    /// Record one sample
    pub fn record(&self, sample: &Sample) {
        let latency_us = (sample.duration_secs * 1_000_000.0) as u64;
        if let Ok(mut hist) = self.latency_histogram.lock() {
            let _ = hist.record(latency_us.max(1));
        }

        if sample.succeeded {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.calls.fetch_add(sample.calls, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_samples(&self) -> u64 {
        self.success_count() + self.error_count()
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_samples();
        if total == 0 {
            return 100.0;
        }
        (self.success_count() as f64 / total as f64) * 100.0
    }

    pub fn elapsed(&self) -> Duration {
        let start = self.start_time.lock().map(|s| *s).unwrap_or(None);
        let end = self.end_time.lock().map(|e| *e).unwrap_or(None);
        match (start, end) {
            (Some(s), Some(e)) => e.duration_since(s),
            (Some(s), None) => s.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Store calls per second over the measured phase
    pub fn calls_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.calls.load(Ordering::Relaxed) as f64 / elapsed
    }

    /// Latency percentile in milliseconds
    pub fn latency_percentile(&self, percentile: f64) -> f64 {
        self.latency_histogram
            .lock()
            .map(|hist| hist.value_at_percentile(percentile) as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    fn latency_max(&self) -> f64 {
        self.latency_histogram
            .lock()
            .map(|hist| hist.max() as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            success_count: self.success_count(),
            error_count: self.error_count(),
            calls: self.calls.load(Ordering::Relaxed),
            success_rate: self.success_rate(),
            calls_per_second: self.calls_per_second(),
            latency_p50: self.latency_percentile(50.0),
            latency_p95: self.latency_percentile(95.0),
            latency_p99: self.latency_percentile(99.0),
            latency_max: self.latency_max(),
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }
}

impl Default for LatencyCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of collected latency metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub success_count: u64,
    pub error_count: u64,
    pub calls: u64,
    pub success_rate: f64,
    pub calls_per_second: f64,
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_max: f64,
    pub elapsed_secs: f64,
}
