//! Subscription matching and notification fan-out.

use genkai_core::{
  notification::{NewNotification, Notification},
  store::CatalogStore,
  task::{Task, TaskQueue},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Engine, Error, Result};

impl<S, Q> Engine<S, Q>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  /// Fan out the episodes a recorded run added. A missing run is a no-op.
  pub async fn fan_out_run(&self, update_id: Uuid) -> Result<Vec<Notification>> {
    let run = self.store.get_update(update_id).await.map_err(Error::store)?;
    let Some(run) = run else {
      warn!(run_id = %update_id, "fan-out for unknown run");
      return Ok(Vec::new());
    };
    self.fan_out(&run.added_episodes).await
  }

  /// Create one subscription notification per matching subscriber of each
  /// episode, in one batch, then enqueue a delivery for each created row.
  ///
  /// Notifications that already exist for `(user, episode)` are not created
  /// again, so a redelivered fan-out sends no duplicate pushes.
  pub async fn fan_out(&self, episodes: &[Uuid]) -> Result<Vec<Notification>> {
    let mut pending = Vec::new();
    for &episode_id in episodes {
      let users = self
        .store
        .subscribers_for_episode(episode_id)
        .await
        .map_err(Error::store)?;
      debug!(episode_id = %episode_id, subscribers = users.len(), "matched subscribers");
      pending.extend(
        users
          .into_iter()
          .map(|user| NewNotification::subscription(user, episode_id)),
      );
    }

    if pending.is_empty() {
      return Ok(Vec::new());
    }

    let created = self
      .store
      .create_notifications(pending)
      .await
      .map_err(Error::store)?;

    for notification in &created {
      self
        .queue
        .enqueue(Task::Deliver { notification_id: notification.notification_id })
        .map_err(Error::queue)?;
    }

    info!(episodes = episodes.len(), notifications = created.len(), "fan-out complete");
    Ok(created)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use genkai_core::{
    catalog::{ContentKind, TranslationKey},
    resolver::Service,
    title::NewTitle,
    update::NewUpdateRun,
  };
  use genkai_store_sqlite::SqliteStore;

  use super::*;
  use crate::{
    fetch::{CatalogFetcher, FeedConfig},
    testutil::RecordingQueue,
  };

  struct Fixture {
    engine:     Engine<SqliteStore, RecordingQueue>,
    title:      Uuid,
    translator: Uuid,
    episode:    Uuid,
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let translator = store.create_translator("AniDub".into()).await.unwrap();
    let (title, _) = store
      .get_or_create_title(NewTitle {
        shikimori_id: Some(32182),
        season:       Some(1),
        name:         "Mob Psycho 100".into(),
        other_names:  Vec::new(),
        year:         None,
      })
      .await
      .unwrap();
    let (mut translation, _) = store
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
    translation.title_id = Some(title.title_id);
    translation.translator_id = Some(translator.translator_id);
    let translation = store.save_translation(translation).await.unwrap();
    let (episode, _) = store
      .get_or_create_episode(translation.translation_id, 3, "//e3".into())
      .await
      .unwrap();

    let fetcher = CatalogFetcher::new(FeedConfig {
      api_url:              "http://127.0.0.1:9/list".into(),
      token:                String::new(),
      request_timeout_secs: 1,
    })
    .unwrap();

    Fixture {
      engine: Engine::new(Arc::new(store), RecordingQueue::default(), fetcher, None),
      title: title.title_id,
      translator: translator.translator_id,
      episode: episode.episode_id,
    }
  }

  #[tokio::test]
  async fn matching_subscription_gets_one_notification() {
    let f = fixture().await;
    let user = Uuid::new_v4();
    let other_translator = f.engine.store.create_translator("Other".into()).await.unwrap();
    f.engine.store.add_subscription(user, f.title, f.translator).await.unwrap();
    f.engine
      .store
      .add_subscription(Uuid::new_v4(), f.title, other_translator.translator_id)
      .await
      .unwrap();

    let run = f
      .engine
      .store
      .record_update(NewUpdateRun {
        kind:           ContentKind::Series,
        without_errors: true,
        added_episodes: vec![f.episode],
      })
      .await
      .unwrap();

    let created = f.engine.fan_out_run(run.update_id).await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].user_id, user);
    assert_eq!(created[0].episode_id, Some(f.episode));
    assert_eq!(f.engine.queue.take(), vec![Task::Deliver {
      notification_id: created[0].notification_id
    }]);
  }

  #[tokio::test]
  async fn repeated_fan_out_creates_no_duplicates() {
    let f = fixture().await;
    let user = Uuid::new_v4();
    f.engine.store.add_subscription(user, f.title, f.translator).await.unwrap();

    assert_eq!(f.engine.fan_out(&[f.episode]).await.unwrap().len(), 1);
    f.engine.queue.take();

    assert!(f.engine.fan_out(&[f.episode]).await.unwrap().is_empty());
    assert!(f.engine.queue.take().is_empty());
    assert_eq!(f.engine.store.list_notifications(user).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn unknown_run_is_a_no_op() {
    let f = fixture().await;
    assert!(f.engine.fan_out_run(Uuid::new_v4()).await.unwrap().is_empty());
  }
}
