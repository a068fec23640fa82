//! Metrics sinks: InfluxDB over UDP or HTTP, or nowhere.

use std::future::Future;
use std::time::Duration;
use tokio::net::UdpSocket;

use super::sample::PointBatch;
use crate::error::SinkError;

/// Destination for flushed point batches
pub trait MetricsSink: Send + Sync + 'static {
    fn send(&self, batch: PointBatch) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Writes line protocol datagrams to an InfluxDB UDP listener.
///
/// The UDP listener is bound to its database server-side, so the batch database is unused.
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    /// Bind an ephemeral local socket and connect it to `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self, SinkError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;
        Ok(Self { socket })
    }
}

impl MetricsSink for UdpSink {
    async fn send(&self, batch: PointBatch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let payload = batch.to_line_protocol();
        self.socket.send(&payload).await?;
        Ok(())
    }
}

/// Writes batches to the InfluxDB HTTP `/write` endpoint
pub struct HttpSink {
    client: reqwest::Client,
    write_url: String,
}

impl HttpSink {
    /// Create a sink posting to `base_url` (e.g. `http://127.0.0.1:8086`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            write_url: format!("{}/write", base_url.trim_end_matches('/')),
        })
    }
}

impl MetricsSink for HttpSink {
    async fn send(&self, batch: PointBatch) -> Result<(), SinkError> {
        let body = batch.to_line_protocol().freeze();
        let response = self
            .client
            .post(&self.write_url)
            .query(&[("db", batch.database.as_str()), ("precision", "ns")])
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Accepts and drops every batch
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl MetricsSink for DiscardSink {
    async fn send(&self, _batch: PointBatch) -> Result<(), SinkError> {
        Ok(())
    }
}
