//! Queue worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ottcms_queue::JobQueue;
use ottcms_worker::{JobExecutor, WorkerConfig, WorkerContext};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ottcms=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
    info!("Worker shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    info!("Starting ottcms-worker");

    let config = WorkerConfig::from_env();
    config
        .validate()
        .map_err(|missing| anyhow::anyhow!("invalid configuration: {missing} must be set"))?;
    info!(
        max_jobs = config.max_concurrent_jobs,
        public_base_url = %config.public_base_url,
        "Worker config loaded"
    );

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install metrics exporter")?;
        info!("Prometheus metrics on {}", addr);
    }

    let queue = JobQueue::from_env().context("failed to create job queue")?;
    let ctx = WorkerContext::from_env(config)
        .await
        .context("failed to create worker context")?;
    let executor = Arc::new(JobExecutor::new(queue, ctx));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await.context("executor error")?;
    Ok(())
}
