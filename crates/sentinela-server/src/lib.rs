//! Sentinela HTTP server: configuration, evidence storage on disk, and the
//! wiring between them and the engine.

pub mod upload;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::Router;
use sentinela_core::{policy::Policy, store::AlertStore, upload::EvidenceUploader};
use sentinela_engine::Engine;
use serde::Deserialize;
use tokio::{
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SENTINELA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Where the evidence uploader writes photos.
  #[serde(default = "default_photo_dir")]
  pub photo_dir:           PathBuf,
  #[serde(default = "default_poll_interval_secs")]
  pub poll_interval_secs:  u64,
  /// Persist lazy expiry on a timer. Off when absent or zero.
  #[serde(default)]
  pub sweep_interval_secs: Option<u64>,
  #[serde(default)]
  pub policy:              Policy,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("sentinela.db") }
fn default_photo_dir() -> PathBuf { PathBuf::from("photos") }
fn default_poll_interval_secs() -> u64 { 30 }

impl ServerConfig {
  pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs) }

  pub fn sweep_interval(&self) -> Option<Duration> {
    self.sweep_interval_secs.filter(|s| *s > 0).map(Duration::from_secs)
  }

  /// Refuse to start on settings the engine cannot run with.
  pub fn validate(&self) -> anyhow::Result<()> {
    anyhow::ensure!(self.poll_interval_secs > 0, "poll_interval_secs must be positive");
    self.policy.validate().context("invalid [policy] section")?;
    Ok(())
  }
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API under `/api`, with request tracing.
pub fn app<S, U>(engine: Arc<Engine<S, U>>) -> Router
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  Router::new()
    .nest("/api", sentinela_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

/// Run [`sentinela_engine::LifecycleManager::sweep_expired`] every `every`,
/// starting now. Failures are logged and retried on the next tick.
pub fn spawn_sweeper<S, U>(engine: Arc<Engine<S, U>>, every: Duration) -> JoinHandle<()>
where
  S: AlertStore + 'static,
  U: EvidenceUploader + 'static,
{
  tokio::spawn(async move {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match engine.manager().sweep_expired().await {
        Ok(0) => {}
        Ok(n) => tracing::info!(expired = n, "sweep persisted expiry"),
        Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
      }
    }
  })
}
