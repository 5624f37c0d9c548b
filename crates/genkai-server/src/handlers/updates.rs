//! Handlers for `/updates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/updates` | Optional `?kind=series\|movies&limit=N`, newest first |
//! | `GET`  | `/updates/{id}` | 404 if not found |
//! | `POST` | `/updates/{kind}` | Admission-controlled trigger, `?force=true` bypasses |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use genkai_core::{
  catalog::ContentKind,
  store::CatalogStore,
  task::TaskQueue,
  update::UpdateRun,
};
use genkai_sync::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub kind:  Option<ContentKind>,
  pub limit: Option<usize>,
}

/// `GET /updates[?kind=<kind>&limit=<n>]`
pub async fn list<S, Q>(
  State(engine): State<Arc<Engine<S, Q>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<UpdateRun>>, ApiError>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let runs = engine
    .store()
    .list_updates(params.kind, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(runs))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /updates/{id}`
pub async fn get_one<S, Q>(
  State(engine): State<Arc<Engine<S, Q>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<UpdateRun>, ApiError>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  let run = engine
    .store()
    .get_update(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("update run {id} not found")))?;
  Ok(Json(run))
}

// ─── Trigger ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
  #[serde(default)]
  pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
  pub kind:     ContentKind,
  /// `false` when the trigger was coalesced into a pending run.
  pub enqueued: bool,
}

/// `POST /updates/{kind}[?force=true]`
pub async fn trigger<S, Q>(
  State(engine): State<Arc<Engine<S, Q>>>,
  Path(kind): Path<String>,
  Query(params): Query<TriggerParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  let kind: ContentKind = kind.parse().map_err(ApiError::BadRequest)?;
  let enqueued = engine.request_update(kind, params.force).await?;
  Ok((StatusCode::ACCEPTED, Json(TriggerResponse { kind, enqueued })))
}
