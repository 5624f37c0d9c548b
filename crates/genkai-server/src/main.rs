//! genkai binary.
//!
//! `genkai serve` runs the task worker, the update scheduler and the read API.
//! `genkai sync --kind series` runs one update in the foreground, prints a
//! summary and then runs the fan-out and deliveries it enqueued.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use genkai_core::{catalog::ContentKind, store::CatalogStore as _, task::Task};
use genkai_server::{ServerConfig, router, run_scheduler};
use genkai_store_sqlite::SqliteStore;
use genkai_sync::{
  Engine,
  dispatch::{Dispatcher, drain_pending, run_worker},
};
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Genkai catalog sync service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the worker, the scheduler and the HTTP API.
  Serve,
  /// Run a single update in the foreground.
  Sync {
    #[arg(long)]
    kind:    ContentKind,
    /// Read only the first, smaller page.
    #[arg(long)]
    preview: bool,
  },
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
  let config = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  // No run can be in flight at startup; stale counters would block triggers.
  store
    .admission_clear_all()
    .await
    .context("failed to reset admission counters")?;

  let (dispatcher, mut rx) = Dispatcher::channel();
  let engine = Engine::from_config(store, dispatcher, config.feed.clone(), &config.push)
    .context("failed to build sync engine")?;
  let engine = Arc::new(engine);

  match cli.command {
    Command::Serve => serve(engine, rx, &config).await,
    Command::Sync { kind, preview } => {
      let run = engine
        .run_update(kind, preview)
        .await
        .context("update run failed")?;
      println!(
        "{kind} run {}: {} new episodes, without_errors = {}",
        run.update_id,
        run.added_episodes.len(),
        run.without_errors,
      );

      let handled = drain_pending(&engine, &mut rx).await;
      info!(handled, "follow-up tasks finished");
      Ok(())
    }
  }
}

async fn serve(
  engine: Arc<Engine<SqliteStore, Dispatcher>>,
  rx: UnboundedReceiver<Task>,
  config: &ServerConfig,
) -> anyhow::Result<()> {
  tokio::spawn(run_worker(engine.clone(), rx));

  if config.schedule.interval_secs > 0 {
    tokio::spawn(run_scheduler(
      engine.clone(),
      Duration::from_secs(config.schedule.interval_secs),
    ));
  } else {
    info!("scheduler disabled");
  }

  let app = router(engine);
  let address = format!("{}:{}", config.host, config.port);

  info!("Listening on http://{address}");
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
