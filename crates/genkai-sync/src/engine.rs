//! [`Engine`]: the store, task queue and outbound clients bundled together.
//!
//! Each component adds its operations in its own module: `ledger`
//! (`run_update`), `fanout` (`fan_out`), `push` (`deliver`) and `dispatch`
//! (`request_update`, `handle`).

use std::sync::Arc;

use genkai_core::{store::CatalogStore, task::TaskQueue};
use tracing::warn;

use crate::{
  Result,
  fetch::{CatalogFetcher, FeedConfig},
  push::{PushConfig, PushSender},
};

pub struct Engine<S, Q> {
  pub(crate) store:   Arc<S>,
  pub(crate) queue:   Q,
  pub(crate) fetcher: CatalogFetcher,
  /// `None` when no VAPID key is configured; deliveries are then skipped.
  pub(crate) pusher:  Option<PushSender>,
}

impl<S, Q> Engine<S, Q>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  pub fn new(
    store: Arc<S>,
    queue: Q,
    fetcher: CatalogFetcher,
    pusher: Option<PushSender>,
  ) -> Self {
    Self { store, queue, fetcher, pusher }
  }

  pub fn from_config(
    store: Arc<S>,
    queue: Q,
    feed: FeedConfig,
    push: &PushConfig,
  ) -> Result<Self> {
    let fetcher = CatalogFetcher::new(feed)?;
    let pusher = PushSender::from_config(push)?;
    if pusher.is_none() {
      warn!("no VAPID private key configured, push delivery is disabled");
    }
    Ok(Self::new(store, queue, fetcher, pusher))
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn queue(&self) -> &Q { &self.queue }
}
