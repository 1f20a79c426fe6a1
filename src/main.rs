//! Endpoint routing engine server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Registering owners                               Requests
//!   (admin API, config file)                            │
//!          │                                            ▼
//!          ▼                                   ┌─────────────────┐
//!   ┌─────────────┐  publish   ┌──────────┐    │  http (front)   │
//!   │ apply loop  │──────────▶│ registry │◀───│  Engine::route  │
//!   │ (1 writer)  │           │ ArcSwap  │    └─────────────────┘
//!   └──────┬──────┘           └──────────┘
//!          │ ReconcileTask         ▲ transition
//!          ▼                       │
//!   ┌─────────────┐  provision ┌──────────┐
//!   │ controller  │──────────▶│ backend  │
//!   └─────────────┘           └──────────┘
//!
//!   EngineEvent broadcast → observability::events (logs + metrics)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use endpoint_router::admin;
use endpoint_router::backend::LocalBackend;
use endpoint_router::config::registrations::{apply_reloads, plan_reload};
use endpoint_router::config::schema::RegistrationsConfig;
use endpoint_router::config::watcher::ConfigWatcher;
use endpoint_router::config::{load_config, EngineConfig};
use endpoint_router::lifecycle::{signals, Shutdown};
use endpoint_router::observability::{events::run_event_logger, logging, metrics};
use endpoint_router::resilience::RetryPolicy;
use endpoint_router::{Engine, HttpServer};

#[derive(Parser)]
#[command(name = "endpoint-router", version, about = "Endpoint registration and routing engine")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "ROUTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    logging::init(&config.observability.log_level).map_err(|e| e.to_string())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "endpoint-router starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let shutdown = Shutdown::new();
    let backend = Arc::new(LocalBackend::new());
    let (engine, tasks) = Engine::start(backend, RetryPolicy::from(&config.provisioning), &shutdown);
    let event_logger = tokio::spawn(run_event_logger(engine.subscribe(), shutdown.subscribe()));

    let initial = plan_reload(&RegistrationsConfig::default(), &config.registrations)?;
    if !initial.is_empty() {
        let receipt = engine.submit(initial).await?;
        tracing::info!(snapshot = %receipt.snapshot_id, "static registrations applied");
    }

    // Dropping the watcher stops it, so it lives until main returns.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(apply_reloads(engine.clone(), config.clone(), updates, shutdown.clone()));
            Some(watcher.run()?)
        }
        None => None,
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(engine.clone(), &config.admin.api_key);
        Some(tokio::spawn(admin::run_admin(listener, router, shutdown.clone())))
    } else {
        None
    };

    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(engine.clone(), &config.server);
    let served = server.run(listener, shutdown.clone()).await;
    shutdown.trigger();

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "admin API failed"),
            Err(e) => tracing::error!(error = %e, "admin API panicked"),
            Ok(Ok(())) => {}
        }
    }
    tasks.join().await;
    let _ = event_logger.await;

    served?;
    tracing::info!("shutdown complete");
    Ok(())
}
