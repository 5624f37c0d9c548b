//! The update-run ledger: one full ingestion run per call, always recorded.

use genkai_core::{
  catalog::ContentKind,
  store::CatalogStore,
  task::{Task, TaskQueue},
  update::{NewUpdateRun, UpdateRun},
};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{Engine, Error, Result, feed::FeedItem, reconcile::Reconciler};

impl<S, Q> Engine<S, Q>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  /// Fetch every page of `kind`, reconcile each item and record the run.
  ///
  /// Item-level failures skip the item; any other failure stops the run
  /// early. Either way the run is recorded with `without_errors = false`.
  /// When the run added episodes, a [`Task::FanOut`] is enqueued after the
  /// row is written.
  pub async fn run_update(&self, kind: ContentKind, preview: bool) -> Result<UpdateRun> {
    info!(%kind, preview, "update run started");

    let mut added: Vec<Uuid> = Vec::new();
    let mut without_errors = true;
    let reconciler = Reconciler::new(&*self.store, kind);
    let mut pages = self.fetcher.pages(kind, preview);

    'pages: loop {
      let page = match pages.next_page().await {
        Ok(Some(page)) => page,
        Ok(None) => break,
        Err(e) => {
          error!(%kind, error = %e, "fetching feed page failed");
          without_errors = false;
          break;
        }
      };

      for raw in &page.items {
        match self.ingest_item(&reconciler, raw, kind, &mut added).await {
          Ok(()) => {}
          Err(e) if e.is_item_level() => {
            warn!(%kind, item = %raw, error = %e, "skipping feed item");
            without_errors = false;
          }
          Err(e) => {
            error!(%kind, item = %raw, error = %e, "update run aborted");
            without_errors = false;
            break 'pages;
          }
        }
      }
    }

    let run = self
      .store
      .record_update(NewUpdateRun { kind, without_errors, added_episodes: added })
      .await
      .map_err(Error::store)?;

    info!(
      %kind,
      run_id = %run.update_id,
      added = run.added_episodes.len(),
      without_errors = run.without_errors,
      "update run recorded",
    );

    if !run.added_episodes.is_empty() {
      self
        .queue
        .enqueue(Task::FanOut { update_id: run.update_id })
        .map_err(Error::queue)?;
    }

    Ok(run)
  }

  /// Reconcile every release of one raw item. Episodes are collected into
  /// `added` as they are created, so a later failure keeps earlier ones.
  async fn ingest_item(
    &self,
    reconciler: &Reconciler<'_, S>,
    raw: &Value,
    kind: ContentKind,
    added: &mut Vec<Uuid>,
  ) -> Result<()> {
    let item = FeedItem::parse(raw, kind)?;
    for release in item.releases(kind)? {
      let outcome = reconciler.reconcile(&item, &release).await?;
      added.extend(outcome.episodes.iter().map(|e| e.episode_id));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{Json, Router, http::StatusCode, routing::post};
  use genkai_core::{catalog::TranslationKey, resolver::Service, title::NewTitle};
  use genkai_store_sqlite::SqliteStore;
  use serde_json::json;

  use super::*;
  use crate::{
    fetch::{CatalogFetcher, FeedConfig},
    testutil::{RecordingQueue, serve},
  };

  fn scenario_item() -> Value {
    json!({
      "id": "serial-1",
      "type": "anime-serial",
      "title": "Mob Psycho 100",
      "shikimori_id": "32182",
      "translation": {"id": 610, "title": "AniLibria.TV"},
      "seasons": {"1": {"link": "u1", "episodes": {"1": "e1", "2": "e2"}}},
      "material_data": {"countries": ["Japan"]},
    })
  }

  /// A feed that serves `pages` in order and then keeps serving the last one.
  /// `{base}` in a `next_page` link is replaced with the server's address.
  async fn feed(pages: Vec<Value>) -> String {
    let pages = Arc::new(Mutex::new(pages));
    let base = Arc::new(Mutex::new(String::new()));
    let router = {
      let base = base.clone();
      Router::new().route(
        "/list",
        post(move || {
          let pages = pages.clone();
          let base = base.clone();
          async move {
            let mut pages = pages.lock().unwrap();
            let mut page = if pages.len() > 1 { pages.remove(0) } else { pages[0].clone() };
            let next = page
              .get("next_page")
              .and_then(Value::as_str)
              .map(|next| next.replace("{base}", &base.lock().unwrap()));
            if let Some(next) = next {
              page["next_page"] = Value::String(next);
            }
            Json(page)
          }
        }),
      )
    };
    let url = serve(router).await;
    *base.lock().unwrap() = url.clone();
    url
  }

  fn engine(base: &str, store: SqliteStore) -> Engine<SqliteStore, RecordingQueue> {
    let fetcher = CatalogFetcher::new(FeedConfig {
      api_url:              format!("{base}/list"),
      token:                "t".into(),
      request_timeout_secs: 5,
    })
    .unwrap();
    Engine::new(Arc::new(store), RecordingQueue::default(), fetcher, None)
  }

  #[tokio::test]
  async fn single_series_item_scenario() {
    let base = feed(vec![json!({"results": [scenario_item()]})]).await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(&base, store.clone());

    let run = engine.run_update(ContentKind::Series, false).await.unwrap();
    assert!(run.without_errors);
    assert_eq!(run.added_episodes.len(), 2);
    assert_eq!(engine.queue.take(), vec![Task::FanOut { update_id: run.update_id }]);

    let recorded = store.get_update(run.update_id).await.unwrap().unwrap();
    assert_eq!(recorded.added_episodes, run.added_episodes);

    let (_, created) = store
      .get_or_create_title(NewTitle {
        shikimori_id: Some(32182),
        season:       Some(1),
        name:         "Mob Psycho 100".into(),
        other_names:  Vec::new(),
        year:         None,
      })
      .await
      .unwrap();
    assert!(!created, "exactly one title exists for the item");

    let (translation, _) = store
      .get_or_create_translation(
        TranslationKey {
          external_id: "serial-1".into(),
          service:     Service::Kodik,
          season:      Some(1),
        },
        None,
      )
      .await
      .unwrap();
    let title = store.get_title(translation.title_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(title.countries.len(), 1);
    assert_eq!(title.countries[0].slug, "japan");
  }

  #[tokio::test]
  async fn replayed_item_adds_nothing() {
    let base = feed(vec![json!({"results": [scenario_item()]})]).await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(&base, store);

    engine.run_update(ContentKind::Series, false).await.unwrap();
    engine.queue.take();

    let second = engine.run_update(ContentKind::Series, false).await.unwrap();
    assert!(second.without_errors);
    assert!(second.added_episodes.is_empty());
    assert!(engine.queue.take().is_empty(), "no fan-out for an empty run");
  }

  #[tokio::test]
  async fn invalid_item_is_skipped_and_flags_the_run() {
    let mut broken = scenario_item();
    broken.as_object_mut().unwrap().remove("title");
    let mut other = scenario_item();
    other["id"] = json!("serial-2");
    other["shikimori_id"] = json!("30276");

    let base = feed(vec![json!({"results": [broken, other]})]).await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(&base, store.clone());

    let run = engine.run_update(ContentKind::Series, false).await.unwrap();
    assert!(!run.without_errors);
    assert_eq!(run.added_episodes.len(), 2, "the valid item is still reconciled");

    let listed = store.list_updates(Some(ContentKind::Series), 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].without_errors);
  }

  #[tokio::test]
  async fn fetch_failure_still_records_a_run() {
    let router = Router::new().route("/list", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let base = serve(router).await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(&base, store.clone());

    let run = engine.run_update(ContentKind::Movies, false).await.unwrap();
    assert!(!run.without_errors);
    assert!(run.added_episodes.is_empty());
    assert!(store.get_update(run.update_id).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn items_across_pages_are_all_reconciled() {
    let mut other = scenario_item();
    other["id"] = json!("serial-2");
    other["shikimori_id"] = json!("30276");

    let base = feed(vec![
      json!({"results": [scenario_item()], "next_page": "{base}/list"}),
      json!({"results": [other]}),
    ])
    .await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(&base, store);

    let run = engine.run_update(ContentKind::Series, false).await.unwrap();
    assert!(run.without_errors);
    assert_eq!(run.added_episodes.len(), 4);
  }

  #[tokio::test]
  async fn preview_reads_only_the_first_page() {
    let mut other = scenario_item();
    other["id"] = json!("serial-2");
    other["shikimori_id"] = json!("30276");

    let base = feed(vec![
      json!({"results": [scenario_item()], "next_page": "{base}/list"}),
      json!({"results": [other]}),
    ])
    .await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(&base, store);

    let run = engine.run_update(ContentKind::Series, true).await.unwrap();
    assert_eq!(run.added_episodes.len(), 2);
    assert_eq!(engine.queue.take(), vec![Task::FanOut { update_id: run.update_id }]);
  }
}
