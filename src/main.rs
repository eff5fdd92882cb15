//! Payment signal relay: binary entrypoint.
//! Loads config, picks a sink, and serves the signal intake API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use payment_signal_relay::api::{self, AppState};
use payment_signal_relay::config::PipelineConfig;
use payment_signal_relay::metrics::Metrics;
use payment_signal_relay::notify::{
    finish_webhook_worker, spawn_webhook_worker, ChannelSink, LogSink, WebhookNotifier,
};
use payment_signal_relay::pipeline::Pipeline;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_WEBHOOK_QUEUE: usize = 64;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_WEBHOOK_ATTEMPTS: u8 = 3;
/// How long queued webhook deliveries may keep running after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("payment_signal_relay=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PipelineConfig::load_default().context("load pipeline config")?;
    let metrics = Metrics::init(&cfg.dedup).context("install prometheus recorder")?;

    let mut worker = None;
    let pipeline = match std::env::var("WEBHOOK_URL").ok().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            let queue = env_parse::<usize>("WEBHOOK_QUEUE").unwrap_or(DEFAULT_WEBHOOK_QUEUE);
            let notifier = WebhookNotifier::new(url)
                .with_timeout(
                    env_parse("WEBHOOK_TIMEOUT_SECS").unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS),
                )
                .with_retries(env_parse("WEBHOOK_RETRIES").unwrap_or(DEFAULT_WEBHOOK_ATTEMPTS));
            tracing::info!(
                queue,
                timeout_secs = notifier.timeout().as_secs(),
                attempts = notifier.max_attempts(),
                "forwarding payment events to webhook"
            );
            let (sink, rx) = ChannelSink::bounded(queue);
            worker = Some(spawn_webhook_worker(rx, Arc::new(notifier)));
            Pipeline::new(&cfg, sink)
        }
        None => {
            tracing::info!("WEBHOOK_URL not set, logging payment events only");
            Pipeline::new(&cfg, LogSink)
        }
    }
    .context("build pipeline")?;

    let router = api::create_router(AppState::new(pipeline)).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "listening");

    // The router owns the pipeline and with it the queue sender; once serve
    // returns, the worker sees a closed queue and drains what is left.
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    if let Some(handle) = worker {
        if finish_webhook_worker(handle, SHUTDOWN_GRACE).await {
            tracing::info!("webhook queue drained");
        }
    }
    Ok(())
}
