//! `GET /notifications?user_id=<uuid>`: a user's notifications, newest first.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use genkai_core::{notification::Notification, store::CatalogStore, task::TaskQueue};
use genkai_sync::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user_id: Uuid,
}

pub async fn list<S, Q>(
  State(engine): State<Arc<Engine<S, Q>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  let notifications = engine
    .store()
    .list_notifications(params.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(notifications))
}
