//! Process entry point: builds the store, transport, and scheduler from
//! config, then runs the scheduler loop until a shutdown signal arrives. No
//! wire protocol of its own — this binary only runs the scheduler loop; the
//! web request/response layer that would consume the write API is out of
//! scope here.

mod config;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use cadence_core::SystemClock;
use cadence_email::{EmailBackend, OAuthEmailBackend, OAuthEmailConfig};
use cadence_scheduler::{Scheduler, SchedulerConfig};
use cadence_store::FollowupStore;
use cadence_store_memory::MemoryStore;
use cadence_store_sqlite::{SqliteConfig, SqliteStore};

use config::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cadence=info")),
        )
        .init();

    let cli = Cli::parse();
    info!(?cli, "starting cadence-server");

    let input_tz = cadence_core::clock::parse_input_tz(&cli.input_tz)
        .map_err(|e| format!("invalid --input-tz: {e}"))?;
    let scheduler_config = SchedulerConfig::new(cli.tick_seconds, input_tz)
        .map_err(|e| format!("invalid --tick-seconds: {e}"))?;

    let store: Arc<dyn FollowupStore> = if cli.no_db {
        info!("--no-db set: running against an in-process, non-durable store");
        Arc::new(MemoryStore::new())
    } else {
        let sqlite_config = SqliteConfig::default().with_db_path(cli.db_path.clone());
        Arc::new(
            SqliteStore::connect(&sqlite_config)
                .await
                .map_err(|e| format!("failed to open store at {:?}: {e}", cli.db_path))?,
        )
    };

    let transport: Arc<dyn EmailBackend> = Arc::new(OAuthEmailBackend::new(OAuthEmailConfig {
        send_endpoint: cli.oauth_send_endpoint.clone().unwrap_or_else(|| {
            tracing::warn!(
                "no --oauth-send-endpoint configured; sends will fail until one is set"
            );
            String::new()
        }),
    }));

    let (scheduler, shutdown_tx) =
        Scheduler::new(store, transport, SystemClock, scheduler_config);

    let run_handle = tokio::spawn(scheduler.run());

    shutdown_signal().await;
    info!("shutdown signal received, stopping scheduler loop");
    let _ = shutdown_tx.send(()).await;
    drop(shutdown_tx);

    if let Err(e) = run_handle.await {
        tracing::error!(error = %e, "scheduler task panicked");
    }

    info!("cadence-server stopped");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful
/// shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
