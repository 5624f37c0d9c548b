//! Integration tests for `SqliteStore` against an in-memory database.

use genkai_core::{
  catalog::{ContentKind, TranslationKey},
  notification::{NewNotification, NewPushEndpoint, PushKeys},
  resolver::{EntityKind, Service},
  store::CatalogStore,
  title::{AgeRating, NewTitle, TitleMetadata, TitleStatus},
  update::NewUpdateRun,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn key(external_id: &str, season: Option<i32>) -> TranslationKey {
  TranslationKey {
    external_id: external_id.into(),
    service: Service::Kodik,
    season,
  }
}

fn new_title(name: &str, shikimori_id: Option<u64>, season: Option<i32>) -> NewTitle {
  NewTitle {
    shikimori_id,
    season,
    name: name.into(),
    other_names: Vec::new(),
    year: Some(2016),
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_unknown_key_returns_none() {
  let s = store().await;
  let found = s
    .resolve(Service::Kodik, EntityKind::Translator, "610".into())
    .await
    .unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn bind_then_resolve() {
  let s = store().await;
  let id = Uuid::new_v4();
  s.bind(Service::Kodik, EntityKind::Translator, "610".into(), id)
    .await
    .unwrap();

  let found = s
    .resolve(Service::Kodik, EntityKind::Translator, "610".into())
    .await
    .unwrap();
  assert_eq!(found, Some(id));

  // Same external id under another entity kind is a different key.
  let other = s
    .resolve(Service::Kodik, EntityKind::Title, "610".into())
    .await
    .unwrap();
  assert!(other.is_none());
}

#[tokio::test]
async fn rebind_overwrites_mapping() {
  let s = store().await;
  let first = Uuid::new_v4();
  let second = Uuid::new_v4();
  s.bind(Service::Kodik, EntityKind::Translator, "610".into(), first)
    .await
    .unwrap();
  s.bind(Service::Kodik, EntityKind::Translator, "610".into(), second)
    .await
    .unwrap();

  let found = s
    .resolve(Service::Kodik, EntityKind::Translator, "610".into())
    .await
    .unwrap();
  assert_eq!(found, Some(second));
}

// ─── Translators ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_translator_slugs_name() {
  let s = store().await;
  let t = s.create_translator("AniLibria.TV".into()).await.unwrap();
  assert_eq!(t.name, "AniLibria.TV");
  assert!(!t.slug.is_empty());

  let fetched = s.get_translator(t.translator_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, t.name);
  assert_eq!(fetched.slug, t.slug);
}

// ─── Translations ────────────────────────────────────────────────────────────

#[tokio::test]
async fn translation_is_unique_per_key() {
  let s = store().await;

  let (first, created) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();
  assert!(created);

  let (again, created) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();
  assert!(!created);
  assert_eq!(again.translation_id, first.translation_id);
  assert_eq!(again.key(), key("serial-1", Some(1)));

  let (season_two, created) = s
    .get_or_create_translation(key("serial-1", Some(2)), None)
    .await
    .unwrap();
  assert!(created);
  assert_ne!(season_two.translation_id, first.translation_id);
}

#[tokio::test]
async fn seasonless_translation_is_unique() {
  let s = store().await;
  let (first, _) = s
    .get_or_create_translation(key("movie-1", None), Some("//kodik/m".into()))
    .await
    .unwrap();
  let (again, created) = s
    .get_or_create_translation(key("movie-1", None), None)
    .await
    .unwrap();
  assert!(!created);
  assert_eq!(again.translation_id, first.translation_id);
  assert_eq!(again.url.as_deref(), Some("//kodik/m"));
}

#[tokio::test]
async fn save_translation_links_title_and_translator() {
  let s = store().await;
  let (mut tr, _) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();
  let translator = s.create_translator("Studio Band".into()).await.unwrap();
  let (title, _) = s
    .get_or_create_title(new_title("Mob Psycho 100", Some(32182), Some(1)))
    .await
    .unwrap();

  tr.title_id = Some(title.title_id);
  tr.translator_id = Some(translator.translator_id);
  s.save_translation(tr.clone()).await.unwrap();

  let (reloaded, created) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();
  assert!(!created);
  assert_eq!(reloaded.title_id, Some(title.title_id));
  assert_eq!(reloaded.translator_id, Some(translator.translator_id));
}

// ─── Titles ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn title_identity_by_shikimori_id_and_season() {
  let s = store().await;
  let (a, created) = s
    .get_or_create_title(new_title("Mob Psycho 100", Some(32182), Some(1)))
    .await
    .unwrap();
  assert!(created);

  // A differently spelled name with the same shikimori id is the same title.
  let (b, created) = s
    .get_or_create_title(new_title("Моб Психо 100", Some(32182), Some(1)))
    .await
    .unwrap();
  assert!(!created);
  assert_eq!(a.title_id, b.title_id);
  assert_eq!(b.name, "Mob Psycho 100");

  let (c, created) = s
    .get_or_create_title(new_title("Mob Psycho 100", Some(32182), Some(2)))
    .await
    .unwrap();
  assert!(created);
  assert_ne!(a.title_id, c.title_id);
}

#[tokio::test]
async fn title_identity_falls_back_to_case_folded_name() {
  let s = store().await;
  let (a, _) = s
    .get_or_create_title(new_title("Kaiju Girl", None, None))
    .await
    .unwrap();
  let (b, created) = s
    .get_or_create_title(new_title("  kaiju girl ", None, None))
    .await
    .unwrap();
  assert!(!created);
  assert_eq!(a.title_id, b.title_id);
}

#[tokio::test]
async fn metadata_merges_names_and_dedupes_tags() {
  let s = store().await;
  let (a, _) = s
    .get_or_create_title(NewTitle {
      other_names: vec!["Mob Psycho Hyaku".into()],
      ..new_title("Mob Psycho 100", Some(32182), Some(1))
    })
    .await
    .unwrap();
  let (b, _) = s
    .get_or_create_title(new_title("One Punch Man", Some(30276), Some(1)))
    .await
    .unwrap();

  let updated = s
    .apply_title_metadata(a.title_id, TitleMetadata {
      description: Some("Psychic middle schooler.".into()),
      other_names: vec!["Mob Psycho Hyaku".into(), "Моб Психо 100".into()],
      countries: vec!["Япония".into()],
      genres: vec!["Комедия".into(), "Экшен".into()],
      studios: vec!["Bones".into()],
      duration: Some(24),
      total_episodes: Some(12),
      age_rating: Some(AgeRating::Pg13),
      status: Some(TitleStatus::Released),
      title_type: None,
    })
    .await
    .unwrap();

  assert_eq!(updated.description, "Psychic middle schooler.");
  assert_eq!(updated.other_names, vec!["Mob Psycho Hyaku", "Моб Психо 100"]);
  assert_eq!(updated.countries.len(), 1);
  let genres: Vec<_> = updated.genres.iter().map(|t| t.name.as_str()).collect();
  assert_eq!(genres, vec!["Комедия", "Экшен"]);
  assert_eq!(updated.age_rating, Some(AgeRating::Pg13));
  assert_eq!(updated.duration, Some(24));

  // The same country name, differently cased, reuses the existing tag.
  let other = s
    .apply_title_metadata(b.title_id, TitleMetadata {
      countries: vec!["япония".into()],
      ..TitleMetadata::default()
    })
    .await
    .unwrap();
  assert_eq!(other.countries.len(), 1);
  assert_eq!(other.countries[0].tag_id, updated.countries[0].tag_id);
}

#[tokio::test]
async fn metadata_for_missing_title_is_an_error() {
  let s = store().await;
  let err = s
    .apply_title_metadata(Uuid::new_v4(), TitleMetadata::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TitleNotFound(_)));
}

#[tokio::test]
async fn metadata_on_corrupt_other_names_fails_without_overwriting() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("genkai.db");
  let s = SqliteStore::open(&path).await.unwrap();
  let (title, _) = s
    .get_or_create_title(new_title("Mob Psycho 100", Some(32182), Some(1)))
    .await
    .unwrap();

  let raw = rusqlite::Connection::open(&path).unwrap();
  raw
    .execute("UPDATE titles SET other_names = 'not json'", [])
    .unwrap();

  let err = s
    .apply_title_metadata(title.title_id, TitleMetadata {
      other_names: vec!["Mob Psycho Hyaku".into()],
      ..TitleMetadata::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  let stored: String = raw
    .query_row("SELECT other_names FROM titles", [], |r| r.get(0))
    .unwrap();
  assert_eq!(stored, "not json");
}

// ─── Episodes ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn episode_creation_is_idempotent() {
  let s = store().await;
  let (tr, _) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();

  let (ep, created) = s
    .get_or_create_episode(tr.translation_id, 1, "//kodik/e1".into())
    .await
    .unwrap();
  assert!(created);

  let (again, created) = s
    .get_or_create_episode(tr.translation_id, 1, "//kodik/e1-other".into())
    .await
    .unwrap();
  assert!(!created);
  assert_eq!(again.episode_id, ep.episode_id);
  assert_eq!(again.url, "//kodik/e1");

  let fetched = s.get_episode(ep.episode_id).await.unwrap().unwrap();
  assert_eq!(fetched, ep);
}

// ─── Update ledger ───────────────────────────────────────────────────────────

#[tokio::test]
async fn record_and_list_updates() {
  let s = store().await;
  let (tr, _) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();
  let (e1, _) = s
    .get_or_create_episode(tr.translation_id, 1, "//e1".into())
    .await
    .unwrap();
  let (e2, _) = s
    .get_or_create_episode(tr.translation_id, 2, "//e2".into())
    .await
    .unwrap();

  let series = s
    .record_update(NewUpdateRun {
      kind:           ContentKind::Series,
      without_errors: true,
      added_episodes: vec![e1.episode_id, e2.episode_id],
    })
    .await
    .unwrap();
  let movies = s
    .record_update(NewUpdateRun {
      kind:           ContentKind::Movies,
      without_errors: false,
      added_episodes: Vec::new(),
    })
    .await
    .unwrap();

  let fetched = s.get_update(series.update_id).await.unwrap().unwrap();
  assert_eq!(fetched.update_id, series.update_id);
  assert_eq!(fetched.kind, ContentKind::Series);
  assert_eq!(fetched.created_at, series.created_at);
  assert!(fetched.without_errors);
  assert_eq!(fetched.added_episodes, vec![e1.episode_id, e2.episode_id]);

  let all = s.list_updates(None, 10).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].update_id, movies.update_id);

  let only_series = s.list_updates(Some(ContentKind::Series), 10).await.unwrap();
  assert_eq!(only_series.len(), 1);
  assert_eq!(only_series[0].kind, ContentKind::Series);

  let limited = s.list_updates(None, 1).await.unwrap();
  assert_eq!(limited.len(), 1);
}

// ─── Subscriptions and notifications ─────────────────────────────────────────

/// A title, translator and translation linked together, plus one episode.
async fn linked_episode(s: &SqliteStore) -> (Uuid, Uuid, Uuid) {
  let translator = s.create_translator("AniDub".into()).await.unwrap();
  let (title, _) = s
    .get_or_create_title(new_title("Mob Psycho 100", Some(32182), Some(1)))
    .await
    .unwrap();
  let (mut tr, _) = s
    .get_or_create_translation(key("serial-1", Some(1)), None)
    .await
    .unwrap();
  tr.title_id = Some(title.title_id);
  tr.translator_id = Some(translator.translator_id);
  s.save_translation(tr.clone()).await.unwrap();
  let (ep, _) = s
    .get_or_create_episode(tr.translation_id, 7, "//e7".into())
    .await
    .unwrap();
  (title.title_id, translator.translator_id, ep.episode_id)
}

#[tokio::test]
async fn subscribers_match_title_and_translator() {
  let s = store().await;
  let (title_id, translator_id, episode_id) = linked_episode(&s).await;
  let other_translator = s.create_translator("Other".into()).await.unwrap();

  let fan = Uuid::new_v4();
  let wrong_dub = Uuid::new_v4();
  s.add_subscription(fan, title_id, translator_id).await.unwrap();
  s.add_subscription(fan, title_id, translator_id).await.unwrap();
  s.add_subscription(wrong_dub, title_id, other_translator.translator_id)
    .await
    .unwrap();

  let users = s.subscribers_for_episode(episode_id).await.unwrap();
  assert_eq!(users, vec![fan]);
}

#[tokio::test]
async fn notifications_are_deduplicated_per_episode() {
  let s = store().await;
  let (_, _, episode_id) = linked_episode(&s).await;
  let user = Uuid::new_v4();

  let first = s
    .create_notifications(vec![NewNotification::subscription(user, episode_id)])
    .await
    .unwrap();
  assert_eq!(first.len(), 1);

  let second = s
    .create_notifications(vec![NewNotification::subscription(user, episode_id)])
    .await
    .unwrap();
  assert!(second.is_empty());

  let listed = s.list_notifications(user).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert!(!listed[0].seen);
}

#[tokio::test]
async fn push_context_renders_episode_subject() {
  let s = store().await;
  let (_, _, episode_id) = linked_episode(&s).await;
  let user = Uuid::new_v4();

  let created = s
    .create_notifications(vec![NewNotification::subscription(user, episode_id)])
    .await
    .unwrap();
  let ctx = s
    .push_context(created[0].notification_id)
    .await
    .unwrap()
    .unwrap();

  assert_eq!(ctx.unseen_count, 1);
  assert_eq!(ctx.push_text().unwrap(), "Mob Psycho 100 - Добавлен 7-й эпизод");
  assert_eq!(ctx.push_url().unwrap(), "/title/mob-psycho-100/");
}

#[tokio::test]
async fn push_context_missing_notification_is_none() {
  let s = store().await;
  assert!(s.push_context(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Push endpoints ──────────────────────────────────────────────────────────

#[tokio::test]
async fn push_endpoints_add_list_delete() {
  let s = store().await;
  let user = Uuid::new_v4();
  let endpoint = s
    .add_push_endpoint(NewPushEndpoint {
      user_id:  user,
      endpoint: "https://push.example/abc".into(),
      keys:     PushKeys { p256dh: "pk".into(), auth: "au".into() },
      device:   Some("firefox".into()),
    })
    .await
    .unwrap();

  let listed = s.list_push_endpoints(user).await.unwrap();
  assert_eq!(listed, vec![endpoint.clone()]);

  assert!(s.delete_push_endpoint(endpoint.endpoint_id).await.unwrap());
  assert!(!s.delete_push_endpoint(endpoint.endpoint_id).await.unwrap());
  assert!(s.list_push_endpoints(user).await.unwrap().is_empty());
}

// ─── Admission counters ──────────────────────────────────────────────────────

#[tokio::test]
async fn admission_counter_counts_until_cleared() {
  let s = store().await;
  assert_eq!(s.admission_increment("update:series".into()).await.unwrap(), 1);
  assert_eq!(s.admission_increment("update:series".into()).await.unwrap(), 2);
  assert_eq!(s.admission_increment("update:movies".into()).await.unwrap(), 1);

  s.admission_clear("update:series".into()).await.unwrap();
  assert_eq!(s.admission_increment("update:series".into()).await.unwrap(), 1);

  s.admission_clear_all().await.unwrap();
  assert_eq!(s.admission_increment("update:movies".into()).await.unwrap(), 1);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_a_file_store_keeps_data() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("genkai.db");

  let id = Uuid::new_v4();
  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.bind(Service::Kodik, EntityKind::Title, "32182".into(), id)
      .await
      .unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let found = s
    .resolve(Service::Kodik, EntityKind::Title, "32182".into())
    .await
    .unwrap();
  assert_eq!(found, Some(id));
}
