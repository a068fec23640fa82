use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use kv_loadgen::config::{Config, SinkKind};
use kv_loadgen::metrics::{DiscardSink, HttpSink, MetricsSink, UdpSink};
use kv_loadgen::report::RunReport;
use kv_loadgen::runner::BenchmarkRunner;
use kv_loadgen::store::RedisStore;
use kv_loadgen::workload;

/// Timeout for one HTTP write to InfluxDB
const HTTP_SINK_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let operation = match workload::lookup(&config.operation) {
        Ok(op) => op,
        Err(e) => {
            tracing::error!("{}", e);
            anyhow::bail!("Startup failed: {}", e);
        }
    };

    tracing::info!("🚀 kv-loadgen starting...");
    tracing::info!(
        "Target {}:{}, op {}, {} workers, {} requests",
        config.host,
        config.port,
        operation.name,
        config.worker,
        config.total
    );

    let store = match RedisStore::connect(
        &config.host,
        config.port,
        config.connections,
        config.store_timeouts(),
    )
    .await
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("❌ Failed to connect to {}:{}: {}", config.host, config.port, e);
            anyhow::bail!("Startup failed: store unreachable");
        }
    };
    tracing::info!("✅ Store connection pool ready ({} connections)", config.connections);

    match config.metrics_sink {
        SinkKind::Udp => {
            let sink = UdpSink::connect(&config.influxdb_host, config.influxdb_port).await?;
            tracing::info!(
                "✅ Writing metrics over UDP to {}:{}",
                config.influxdb_host,
                config.influxdb_port
            );
            run_with_sink(&config, operation, store, sink).await
        }
        SinkKind::Http => {
            let sink = HttpSink::new(&config.influxdb_url(), HTTP_SINK_TIMEOUT)?;
            tracing::info!("✅ Writing metrics over HTTP to {}", config.influxdb_url());
            run_with_sink(&config, operation, store, sink).await
        }
        SinkKind::None => {
            tracing::warn!("Metrics sink disabled, batches are discarded");
            run_with_sink(&config, operation, store, DiscardSink).await
        }
    }
}

async fn run_with_sink<K: MetricsSink>(
    config: &Config,
    operation: &'static workload::OperationDescriptor,
    store: Arc<RedisStore>,
    sink: K,
) -> Result<()> {
    let runner = BenchmarkRunner::new(
        config.run_plan(),
        operation,
        store,
        sink,
        config.run_settings(),
    );
    let outcome = runner.run().await?;

    let report = RunReport::from_outcome(&outcome);
    if config.json {
        println!("{}", report.to_json());
    } else {
        report.print_table();
    }

    tracing::info!("✅ Benchmark complete");
    Ok(())
}
