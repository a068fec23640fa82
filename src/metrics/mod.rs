//! Metrics pipeline for latency samples.
//!
//! This module provides:
//! - Samples, points and batches in the InfluxDB data model
//! - Sinks writing batches over UDP or HTTP
//! - The batching pipeline with deterministic flush tracking
//! - HdrHistogram-based latency summary for the end-of-run report

pub mod collector;
pub mod pipeline;
pub mod sample;
pub mod sink;

pub use collector::{LatencyCollector, MetricsSnapshot};
pub use pipeline::{
    FlushSummary, FlushTracker, MetricsIntake, MetricsPipeline, PipelineSettings, PipelineStats,
};
pub use sample::{Point, PointBatch, Sample};
pub use sink::{DiscardSink, HttpSink, MetricsSink, UdpSink};
