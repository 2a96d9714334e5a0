//! shajareh-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the JSON API over HTTP. Domain
//! events are drained by a logging subscriber — the stand-in for the
//! external per-user push channel.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use shajareh_core::event::EventBus;
use shajareh_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shajareh genealogy API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8008 }
fn default_store_path() -> PathBuf { PathBuf::from("shajareh.db") }

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
    .add_source(config::Environment::with_prefix("SHAJAREH"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.store_path)
    })?;

  // Drain domain events into the log. A real deployment replaces this
  // subscriber with the push-notification channel.
  let events = EventBus::default();
  let mut rx = events.subscribe();
  tokio::spawn(async move {
    loop {
      match rx.recv().await {
        Ok(event) => {
          tracing::info!(
            user = %event.user_id,
            kind = ?event.kind,
            "notification"
          );
        }
        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "notification subscriber lagged");
        }
        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
      }
    }
  });

  let app = shajareh_api::api_router(Arc::new(store), events)
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
