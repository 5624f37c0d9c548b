//! Genkai sync service: configuration, the periodic scheduler and a JSON
//! read API over the update ledger, notifications and titles.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = genkai_server::router(engine.clone());
//! ```

pub mod error;
pub mod handlers;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use genkai_core::{catalog::ContentKind, store::CatalogStore, task::TaskQueue};
use genkai_sync::{Engine, fetch::FeedConfig, push::PushConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("genkai.db") }
fn default_interval() -> u64 { 600 }

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
  /// Seconds between scheduled update requests. `0` disables the scheduler.
  #[serde(default = "default_interval")]
  pub interval_secs: u64,
}

impl Default for ScheduleConfig {
  fn default() -> Self { Self { interval_secs: default_interval() } }
}

/// Runtime configuration, deserialised from `config.toml` and `GENKAI__*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub feed:       FeedConfig,
  #[serde(default)]
  pub push:       PushConfig,
  #[serde(default)]
  pub schedule:   ScheduleConfig,
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` under `GENKAI__`-prefixed
  /// environment variables (`GENKAI__FEED__TOKEN` sets `feed.token`).
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.into()).required(false))
      .add_source(
        config::Environment::with_prefix("GENKAI")
          .prefix_separator("__")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The read API, with paths relative to its mount point.
pub fn api_router<S, Q>(engine: Arc<Engine<S, Q>>) -> Router<()>
where
  S: CatalogStore + 'static,
  Q: TaskQueue + 'static,
{
  Router::new()
    .route("/updates", get(handlers::updates::list::<S, Q>))
    .route(
      "/updates/{id}",
      get(handlers::updates::get_one::<S, Q>).post(handlers::updates::trigger::<S, Q>),
    )
    .route("/notifications", get(handlers::notifications::list::<S, Q>))
    .route("/titles/{id}", get(handlers::titles::get_one::<S, Q>))
    .with_state(engine)
}

/// The full application: the API under `/api` with request tracing.
pub fn router<S, Q>(engine: Arc<Engine<S, Q>>) -> Router
where
  S: CatalogStore + 'static,
  Q: TaskQueue + 'static,
{
  Router::new()
    .nest("/api", api_router(engine))
    .layer(TraceLayer::new_for_http())
}

// ─── Scheduler ────────────────────────────────────────────────────────────────

/// Request an update for every content kind each `interval`. The first tick
/// fires immediately. Never returns.
pub async fn run_scheduler<S, Q>(engine: Arc<Engine<S, Q>>, interval: Duration)
where
  S: CatalogStore,
  Q: TaskQueue,
{
  info!(interval_secs = interval.as_secs(), "scheduler started");
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    for kind in ContentKind::ALL {
      if let Err(e) = engine.request_update(kind, false).await {
        warn!(%kind, error = %e, "scheduled update request failed");
      }
    }
  }
}

// ─── Integration tests ────────────────────────────────────────────────────────
