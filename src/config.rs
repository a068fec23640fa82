use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use crate::error::BenchError;
use crate::metrics::PipelineSettings;
use crate::plan::{RunPlan, FLUSH_BATCH_SIZE};
use crate::runner::RunSettings;
use crate::store::StoreTimeouts;

/// Key-value store pressure test tool
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Target store host
    #[arg(long, env = "KV_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Target store port
    #[arg(short, long, env = "KV_PORT", default_value = "6379")]
    pub port: u16,

    /// Number of concurrent workers
    #[arg(short, long, env = "KV_WORKER", default_value = "20")]
    pub worker: usize,

    /// Total request count
    #[arg(long, env = "KV_TOTAL")]
    pub total: usize,

    /// Operation to benchmark (set, mset, lpush, rpush, sadd, zadd, hset, hmset, get,
    /// mget, lrange, smembers, scard, zcard, zcount, zscore, zrange, zrangebyscore,
    /// zrevrangebyscore, zrank, hget, hmget, hgetall)
    #[arg(long, env = "KV_OP")]
    pub op: String,

    /// Unique key count (defaults to the total request count)
    #[arg(long, env = "KV_TOTAL_KEY")]
    pub total_key: Option<usize>,

    /// Requests per pipeline (0 disables pipelining)
    #[arg(long, env = "KV_PIPELINE", default_value = "0")]
    pub pipeline: usize,

    /// Value size in KB
    #[arg(long, env = "KV_DATA_SIZE", default_value = "2")]
    pub data_size: usize,

    /// Number of fake records to write before a read benchmark (defaults to total)
    #[arg(long, env = "KV_TOTAL_DATA")]
    pub total_data: Option<usize>,

    /// Write fake data before a read benchmark
    #[arg(long, env = "KV_NEED_FAKEDATA")]
    pub need_fakedata: bool,

    /// InfluxDB host
    #[arg(long, env = "INFLUXDB_HOST", default_value = "127.0.0.1")]
    pub influxdb_host: String,

    /// InfluxDB port
    #[arg(long, env = "INFLUXDB_PORT", default_value = "8083")]
    pub influxdb_port: u16,

    /// InfluxDB database
    #[arg(long, env = "INFLUXDB_DATABASE", default_value = "udp")]
    pub influxdb_database: String,

    /// Metrics sink (udp, http, none)
    #[arg(long, env = "METRICS_SINK", default_value = "udp")]
    pub metrics_sink: String,

    /// Measurement name of written points
    #[arg(long, env = "METRICS_MEASUREMENT", default_value = "kv_loadgen")]
    pub measurement: String,

    /// Connections in the shared store pool
    #[arg(long, env = "KV_CONNECTIONS", default_value = "8")]
    pub connections: usize,

    /// Read timeout per store call in milliseconds
    #[arg(long, env = "KV_READ_TIMEOUT_MS", default_value = "500")]
    pub read_timeout_ms: u64,

    /// Write timeout per store call in milliseconds
    #[arg(long, env = "KV_WRITE_TIMEOUT_MS", default_value = "200")]
    pub write_timeout_ms: u64,

    /// Seconds to wait for the next metrics flush before giving up (0 waits forever)
    #[arg(long, env = "FLUSH_TIMEOUT", default_value = "300")]
    pub flush_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SinkKind {
    Udp,
    Http,
    None,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Target store
    pub host: String,
    pub port: u16,
    pub connections: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,

    // Workload
    pub operation: String,
    pub worker: usize,
    pub total: usize,
    pub total_key: usize,
    pub pipeline: usize,
    pub data_size_kb: usize,
    pub total_data: usize,
    pub need_fake_data: bool,

    // Metrics
    pub metrics_sink: SinkKind,
    pub influxdb_host: String,
    pub influxdb_port: u16,
    pub influxdb_database: String,
    pub measurement: String,
    pub flush_timeout: Option<Duration>,

    // Output
    pub log_level: String,
    pub json: bool,
}

impl Config {
    /// Load configuration with priority: CLI > ENV (.env included) > defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let args = CliArgs::parse();
        Ok(Self::from_args(args)?)
    }

    /// Build configuration from parsed arguments, filling derived defaults
    pub fn from_args(args: CliArgs) -> std::result::Result<Self, BenchError> {
        let metrics_sink = parse_sink_kind(&args.metrics_sink).ok_or_else(|| {
            BenchError::Config(format!("Unknown metrics sink: {}", args.metrics_sink))
        })?;

        Ok(Config {
            host: args.host,
            port: args.port,
            connections: args.connections,
            read_timeout: Duration::from_millis(args.read_timeout_ms),
            write_timeout: Duration::from_millis(args.write_timeout_ms),

            operation: args.op.to_lowercase(),
            worker: args.worker,
            total: args.total,
            total_key: args.total_key.unwrap_or(args.total),
            pipeline: args.pipeline,
            data_size_kb: args.data_size,
            total_data: args.total_data.unwrap_or(args.total),
            need_fake_data: args.need_fakedata,

            metrics_sink,
            influxdb_host: args.influxdb_host,
            influxdb_port: args.influxdb_port,
            influxdb_database: args.influxdb_database,
            measurement: args.measurement,
            flush_timeout: match args.flush_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },

            log_level: args.log_level,
            json: args.json,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), BenchError> {
        if self.worker == 0 {
            return Err(BenchError::Config("worker must be at least 1".to_string()));
        }
        if self.total == 0 {
            return Err(BenchError::Config("total must be at least 1".to_string()));
        }
        if self.total_key == 0 {
            return Err(BenchError::Config("total-key must be at least 1".to_string()));
        }
        if self.connections == 0 {
            return Err(BenchError::Config("connections must be at least 1".to_string()));
        }
        if self.influxdb_database.is_empty() {
            return Err(BenchError::Config(
                "influxdb-database cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Derive the run plan
    pub fn run_plan(&self) -> RunPlan {
        RunPlan {
            worker_count: self.worker,
            total_requests: self.total,
            pipeline_depth: self.pipeline,
            unique_key_budget: self.total_key,
            payload_size: self.data_size_kb * 1024,
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            need_fake_data: self.need_fake_data,
            fake_data_total: self.total_data,
            flush_timeout: self.flush_timeout,
            pipeline: PipelineSettings {
                database: self.influxdb_database.clone(),
                measurement: self.measurement.clone(),
                batch_size: FLUSH_BATCH_SIZE,
                ..Default::default()
            },
        }
    }

    pub fn store_timeouts(&self) -> StoreTimeouts {
        StoreTimeouts {
            read: self.read_timeout,
            write: self.write_timeout,
        }
    }

    /// Base URL of the InfluxDB HTTP API
    pub fn influxdb_url(&self) -> String {
        format!("http://{}:{}", self.influxdb_host, self.influxdb_port)
    }
}

/// Parse metrics sink kind from string
fn parse_sink_kind(s: &str) -> Option<SinkKind> {
    match s.to_lowercase().as_str() {
        "udp" => Some(SinkKind::Udp),
        "http" => Some(SinkKind::Http),
        "none" | "off" => Some(SinkKind::None),
        _ => None,
    }
}
