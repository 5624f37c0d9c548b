//! The update-run ledger.
//!
//! One row per ingestion run of one content kind. Rows are append-only:
//! neither the error flag nor the set of added episodes is ever edited after
//! the run is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ContentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRun {
  pub update_id:      Uuid,
  pub kind:           ContentKind,
  pub created_at:     DateTime<Utc>,
  pub without_errors: bool,
  /// Exactly the episodes whose creation succeeded during this run.
  pub added_episodes: Vec<Uuid>,
}

/// Input to [`crate::store::CatalogStore::record_update`].
#[derive(Debug, Clone)]
pub struct NewUpdateRun {
  pub kind:           ContentKind,
  pub without_errors: bool,
  pub added_episodes: Vec<Uuid>,
}
