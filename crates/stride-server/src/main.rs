//! stride-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, starts the reconciliation scheduler and serves
//! the JSON API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use stride_api::AppState;
use stride_core::clock::{Clock, SystemClock};
use stride_engine::{Reconciler, Scheduler};
use stride_server::{ServerConfig, expand_tilde};
use stride_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Stride progress sync server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("STRIDE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  // Open SQLite store.
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);

  // Build services.
  let reconciler = Arc::new(Reconciler::new(
    store.clone(),
    clock.clone(),
    server_cfg.scheduler.settings(),
  ));
  let scheduler = Arc::new(Scheduler::new(
    reconciler,
    clock.clone(),
    server_cfg.scheduler.schedule(),
  ));

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let jobs = if server_cfg.scheduler.enabled {
    scheduler.clone().start(shutdown_rx)
  } else {
    tracing::info!("scheduler disabled; jobs run only when triggered");
    Vec::new()
  };

  let state = Arc::new(AppState::new(store, clock, scheduler));
  let app = stride_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // Stop the job loops. A run in progress completes first.
  let _ = shutdown_tx.send(true);
  for job in jobs {
    job.await.context("scheduler task panicked")?;
  }

  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
    Err(err) => {
      tracing::error!(error = %err, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  }
}
