//! Latency samples and the points/batches written to the metrics sink.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One completed unit of work: a single command or a pipelined batch
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub duration_secs: f64,
    pub operation: &'static str,
    pub succeeded: bool,
    pub timestamp: DateTime<Utc>,
    /// Store calls covered by this unit of work
    pub calls: u64,
}

impl Sample {
    /// Sample for a single call, stamped with the current time
    pub fn new(operation: &'static str, elapsed: Duration, succeeded: bool) -> Self {
        Self {
            duration_secs: elapsed.as_secs_f64(),
            operation,
            succeeded,
            timestamp: Utc::now(),
            calls: 1,
        }
    }

    /// Mark the sample as covering a pipelined batch of `calls`
    pub fn with_calls(mut self, calls: u64) -> Self {
        self.calls = calls;
        self
    }
}

/// A measurement point in the sink's data model
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub op: &'static str,
    pub failed: bool,
    pub latency_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn from_sample(measurement: &str, sample: &Sample) -> Self {
        Self {
            measurement: measurement.to_string(),
            op: sample.operation,
            failed: !sample.succeeded,
            latency_secs: sample.duration_secs,
            timestamp: sample.timestamp,
        }
    }

    /// Append this point in InfluxDB line protocol, nanosecond precision
    pub fn write_line(&self, buf: &mut BytesMut) {
        let nanos = self.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let line = format!(
            "{},op={},failed={} latency={} {}\n",
            escape_tag(&self.measurement),
            escape_tag(self.op),
            self.failed,
            self.latency_secs,
            nanos
        );
        buf.put_slice(line.as_bytes());
    }
}

/// Commas, spaces and equals signs must be escaped in measurement names and tag values
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Points flushed together in one sink write
#[derive(Debug, Clone, Default)]
pub struct PointBatch {
    pub database: String,
    points: Vec<Point>,
}

impl PointBatch {
    /// Empty batch destined for `database`
    pub fn new(database: &str, capacity: usize) -> Self {
        Self {
            database: database.to_string(),
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Encode every point, one line each
    pub fn to_line_protocol(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.points.len() * 96);
        for point in &self.points {
            point.write_line(&mut buf);
        }
        buf
    }
}
