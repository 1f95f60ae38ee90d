//! meter-server: recorder admission service.
//!
//! Serves the job/recorder HTTP API and drives the assignment and
//! queue-update loops against a shared lease store.
//!
//! # Usage
//!
//! ```bash
//! # Single instance, in-memory store
//! meter-server --store memory
//!
//! # Redis-backed, with a profile (reads PROD_STORE_REDIS_URL etc.)
//! meter-server --profile PROD
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use meter_core::config::{self, Config};
use meter_notify::{issuer_from_config, RecorderProcessor, SignalClient};
use meter_queue::{KeySpace, PoolTracker, RequestQueue};
use meter_scheduler::{LoopMetrics, LoopRunner, SchedulerLoop, UpdateLoop};
use meter_server::{build_router, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Recorder admission service.
#[derive(Parser, Debug)]
#[command(name = "meter-server", version, about)]
struct Cli {
    /// Config profile; env vars prefixed `{PROFILE}_` take precedence.
    #[arg(long, env = "METER_PROFILE", default_value = "")]
    profile: String,

    /// Override the HTTP port from config.
    #[arg(long)]
    port: Option<u16>,

    /// Override the store backend: "memory" or "redis".
    #[arg(long)]
    store: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    config::load_dotenv();
    let cli = Cli::parse();

    let mut config = if cli.profile.is_empty() {
        Config::from_env()
    } else {
        Config::for_profile(&cli.profile)
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(store) = cli.store {
        config.store.backend = store;
    }
    config.log_summary();

    serve(config).await
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate().context("refusing to start with unsafe lock settings")?;

    let store = meter_store::open_store(&config.store)
        .await
        .context("failed to open lease store")?;
    let keys = KeySpace::new(config.store.namespace.clone());

    let tracker = Arc::new(PoolTracker::new(store.clone(), keys.clone(), &config.tracker));
    let queue = Arc::new(RequestQueue::new(store.clone(), keys, &config.queue));

    let signal = SignalClient::new(&config.notify).context("failed to build signaling client")?;
    let credentials = issuer_from_config(&config.notify).context("invalid recorder credentials")?;
    let processor = Arc::new(RecorderProcessor::new(tracker.clone(), signal, credentials));
    let metrics = Arc::new(LoopMetrics::new());

    let runner = LoopRunner::start(
        SchedulerLoop::new(
            queue.clone(),
            processor.clone(),
            config.scheduler.assign_interval(),
            metrics.clone(),
        ),
        UpdateLoop::new(
            queue.clone(),
            processor,
            config.scheduler.update_interval(),
            metrics.clone(),
        ),
    );

    let state = Arc::new(AppState {
        queue,
        tracker,
        metrics,
        backend: store.backend_name().to_string(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("stopping scheduler loops");
    runner.stop().await;
    served?;

    info!("meter-server exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler, waiting on ctrl_c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
