use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use genkai_core::{store::CatalogStore, task::TaskQueue, title::Title};
use genkai_sync::Engine;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /titles/{id}`
pub async fn get_one<S, Q>(
  State(engine): State<Arc<Engine<S, Q>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Title>, ApiError>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  let title = engine
    .store()
    .get_title(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("title {id} not found")))?;
  Ok(Json(title))
}
