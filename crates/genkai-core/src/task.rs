//! Units of asynchronous work and the queue they are handed off through.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ContentKind;

/// A unit of work handed to the task-dispatch primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
  /// Ingest the whole feed for one content kind. `admitted` is set when the
  /// run holds the kind's admission counter and must clear it when done.
  RunUpdate { kind: ContentKind, admitted: bool },
  /// Create subscription notifications for a recorded run's new episodes.
  FanOut { update_id: Uuid },
  /// Push one notification to every endpoint of its user.
  Deliver { notification_id: Uuid },
}

impl Task {
  pub fn name(&self) -> &'static str {
    match self {
      Self::RunUpdate { .. } => "run_update",
      Self::FanOut { .. } => "fan_out",
      Self::Deliver { .. } => "deliver",
    }
  }
}

/// An at-least-once task dispatch primitive.
///
/// `enqueue` must not block on the task's execution; it only hands the task
/// off.
pub trait TaskQueue: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn enqueue(&self, task: Task) -> Result<(), Self::Error>;
}
