//! In-process task dispatch, run admission and the worker loop.

use std::sync::Arc;

use genkai_core::{
  catalog::ContentKind,
  store::CatalogStore,
  task::{Task, TaskQueue},
};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{Instrument as _, debug, error, info, info_span, warn};

use crate::{Engine, Error, Result};

#[derive(Debug, Error)]
#[error("task channel closed, dropped {0} task")]
pub struct DispatchError(&'static str);

/// A [`TaskQueue`] backed by an unbounded channel drained by [`run_worker`].
#[derive(Clone)]
pub struct Dispatcher {
  tx: UnboundedSender<Task>,
}

impl Dispatcher {
  pub fn channel() -> (Self, UnboundedReceiver<Task>) {
    let (tx, rx) = unbounded_channel();
    (Self { tx }, rx)
  }
}

impl TaskQueue for Dispatcher {
  type Error = DispatchError;

  fn enqueue(&self, task: Task) -> Result<(), DispatchError> {
    let name = task.name();
    self.tx.send(task).map_err(|_| DispatchError(name))
  }
}

/// Admission counter key for update runs of `kind`.
pub fn admission_key(kind: ContentKind) -> String { format!("update:{kind}") }

impl<S, Q> Engine<S, Q>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  /// Enqueue an update run unless one for `kind` is already admitted.
  ///
  /// Returns whether a run was enqueued. `force` bypasses the admission
  /// counter, which is then left as it was.
  pub async fn request_update(&self, kind: ContentKind, force: bool) -> Result<bool> {
    if !force {
      let count = self
        .store
        .admission_increment(admission_key(kind))
        .await
        .map_err(Error::store)?;
      if count != 1 {
        debug!(%kind, count, "update already pending, trigger coalesced");
        return Ok(false);
      }
    }
    self
      .queue
      .enqueue(Task::RunUpdate { kind, admitted: !force })
      .map_err(Error::queue)?;
    info!(%kind, force, "update run enqueued");
    Ok(true)
  }

  /// Execute one task.
  ///
  /// A finished admitted update run, successful or not, clears its admission
  /// counter so the next trigger is admitted. Forced runs never took the
  /// counter and leave it alone.
  pub async fn handle(&self, task: Task) -> Result<()> {
    match task {
      Task::RunUpdate { kind, admitted } => {
        let outcome = self.run_update(kind, false).await;
        if admitted {
          self
            .store
            .admission_clear(admission_key(kind))
            .await
            .map_err(Error::store)?;
        }
        outcome.map(|_| ())
      }
      Task::FanOut { update_id } => self.fan_out_run(update_id).await.map(|_| ()),
      Task::Deliver { notification_id } => self.deliver(notification_id).await.map(|_| ()),
    }
  }
}

/// Drain `rx`, running each task on its own tokio task. Returns once every
/// [`Dispatcher`] is dropped.
pub async fn run_worker<S>(engine: Arc<Engine<S, Dispatcher>>, mut rx: UnboundedReceiver<Task>)
where
  S: CatalogStore + 'static,
{
  while let Some(task) = rx.recv().await {
    let engine = engine.clone();
    let span = info_span!("task", name = task.name());
    tokio::spawn(
      async move {
        if let Err(e) = engine.handle(task).await {
          error!(error = %e, "task failed");
        }
      }
      .instrument(span),
    );
  }
  debug!("task channel closed, worker stopping");
}

/// Run every task already in `rx`, and the tasks those enqueue, in order on
/// the current task. Failures are logged and do not stop the drain. Returns
/// the number of tasks run.
pub async fn drain_pending<S>(
  engine: &Engine<S, Dispatcher>,
  rx: &mut UnboundedReceiver<Task>,
) -> usize
where
  S: CatalogStore,
{
  let mut handled = 0;
  while let Ok(task) = rx.try_recv() {
    let name = task.name();
    if let Err(e) = engine.handle(task).await {
      warn!(task = name, error = %e, "task failed");
    }
    handled += 1;
  }
  handled
}
