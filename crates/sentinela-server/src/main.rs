//! sentinela server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers
//! `SENTINELA_*` environment variables over it, opens the SQLite store and
//! serves the JSON API under `/api`.
//!
//! Nested keys use a double underscore, e.g.
//! `SENTINELA_POLICY__MAX_PHOTOS=5`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use sentinela_core::clock::SystemClock;
use sentinela_engine::Engine;
use sentinela_server::{ServerConfig, spawn_sweeper, upload::DirectoryUploader};
use sentinela_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Sentinela flood-alert server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("SENTINELA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate()?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let photo_dir = expand_tilde(&server_cfg.photo_dir);
  let uploader = DirectoryUploader::create(&photo_dir)
    .await
    .with_context(|| format!("failed to prepare photo directory {photo_dir:?}"))?;

  let engine = Arc::new(Engine::with_clock(
    Arc::new(store),
    Arc::new(uploader),
    server_cfg.policy.clone(),
    Arc::new(SystemClock),
    server_cfg.poll_interval(),
  ));

  if let Some(every) = server_cfg.sweep_interval() {
    tracing::info!(every_secs = every.as_secs(), "expiry sweep enabled");
    spawn_sweeper(engine.clone(), every);
  }

  let app = sentinela_server::app(engine);
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
