//! clowder-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the engine API over HTTP.
//!
//! # Helper modes
//!
//! Seed (or replace) the matching configuration from a TOML file and exit:
//!
//! ```
//! clowder-server --seed-config matching.toml
//! ```
//!
//! Run one processing batch and exit, printing the counters:
//!
//! ```
//! clowder-server --run-batch
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use clowder_core::{config::MatchConfig, store::EntityStore as _};
use clowder_server::ServerConfig;
use clowder_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Clowder identity-resolution server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Load matching thresholds and m/u parameters from this TOML file into
  /// the store, then exit. Invalid configurations are rejected unwritten.
  #[arg(long, value_name = "FILE")]
  seed_config: Option<PathBuf>,

  /// Process one batch of staged records and exit.
  #[arg(long)]
  run_batch: bool,
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
    .add_source(config::Environment::with_prefix("CLOWDER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: seed matching configuration and exit.
  if let Some(path) = cli.seed_config {
    let match_cfg: MatchConfig = config::Config::builder()
      .add_source(config::File::from(path.clone()))
      .build()
      .with_context(|| format!("failed to read {path:?}"))?
      .try_deserialize()
      .context("failed to deserialise MatchConfig")?;
    store
      .save_match_config(&match_cfg)
      .await
      .context("matching configuration rejected")?;
    tracing::info!(
      thresholds = match_cfg.thresholds.len(),
      parameters = match_cfg.parameters.len(),
      "matching configuration seeded"
    );
    return Ok(());
  }

  // Helper mode: run one batch and exit.
  if cli.run_batch {
    let outcome =
      clowder_engine::process_batch(&store, None, server_cfg.batch_limit)
        .await
        .context("batch failed")?;
    println!(
      "processed={} succeeded={} errors={}",
      outcome.processed, outcome.succeeded, outcome.errors
    );
    return Ok(());
  }

  let app = clowder_server::router(Arc::new(store));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
