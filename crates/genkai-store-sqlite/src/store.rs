//! [`SqliteStore`]: the SQLite implementation of [`CatalogStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use genkai_core::{
  catalog::{ContentKind, Episode, Translation, TranslationKey, Translator},
  notification::{
    EpisodeSubject, NewNotification, NewPushEndpoint, Notification, PushContext,
    PushEndpoint, Subscription,
  },
  resolver::{EntityKind, ResolverMapping, Service},
  slug::slugify,
  store::CatalogStore,
  title::{NewTitle, Title, TitleMetadata, name_key},
  update::{NewUpdateRun, UpdateRun},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    EPISODE_COLUMNS, NOTIFICATION_COLUMNS, PUSH_ENDPOINT_COLUMNS, RawEpisode,
    RawNotification, RawPushEndpoint, RawTag, RawTitle, RawTranslation,
    RawTranslator, RawUpdateRun, TAG_COLUMNS, TITLE_COLUMNS,
    TRANSLATION_COLUMNS, TRANSLATOR_COLUMNS, decode_uuid, encode_content_kind,
    encode_dt, encode_entity_kind, encode_named, encode_names, encode_service,
    encode_uuid,
  },
  schema::SCHEMA,
};

/// Outcome of a get-or-create lookup performed inside one transaction.
enum Lookup<T> {
  Found(T),
  Created(T),
  Ambiguous,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Genkai catalog store backed by a single SQLite file.
///
/// Cloning is cheap; clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load a title row together with its tags.
  async fn load_title(&self, id: Uuid) -> Result<Option<Title>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawTitle, Vec<RawTag>)> = self
      .conn
      .call(move |conn| {
        let title = conn
          .query_row(
            &format!("SELECT {TITLE_COLUMNS} FROM titles WHERE title_id = ?1"),
            rusqlite::params![id_str],
            RawTitle::from_row,
          )
          .optional()?;

        let Some(title) = title else { return Ok(None) };

        let mut stmt = conn.prepare(&format!(
          "SELECT {TAG_COLUMNS}
           FROM title_tags tt
           JOIN tags t ON t.tag_id = tt.tag_id
           WHERE tt.title_id = ?1
           ORDER BY tt.position"
        ))?;
        let tags = stmt
          .query_map(rusqlite::params![id_str], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some((title, tags)))
      })
      .await?;

    raw.map(|(title, tags)| title.into_title(tags)).transpose()
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  type Error = Error;

  // ── Resolver ──────────────────────────────────────────────────────────────

  async fn resolve(
    &self,
    service: Service,
    entity_kind: EntityKind,
    external_id: String,
  ) -> Result<Option<Uuid>> {
    let service_str = encode_service(service);
    let kind_str    = encode_entity_kind(entity_kind);
    let ext         = external_id.clone();

    let rows: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT internal_id FROM resolver_mappings
           WHERE service = ?1 AND entity_kind = ?2 AND external_id = ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![service_str, kind_str, ext], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    match rows.as_slice() {
      [] => Ok(None),
      [id] => Ok(Some(decode_uuid(id)?)),
      _ => Err(
        genkai_core::Error::DuplicateMappingConflict {
          service,
          entity_kind,
          external_id,
        }
        .into(),
      ),
    }
  }

  async fn bind(
    &self,
    service: Service,
    entity_kind: EntityKind,
    external_id: String,
    internal_id: Uuid,
  ) -> Result<ResolverMapping> {
    let service_str = encode_service(service);
    let kind_str    = encode_entity_kind(entity_kind);
    let ext         = external_id.clone();
    let id_str      = encode_uuid(internal_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO resolver_mappings (service, entity_kind, external_id, internal_id)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (service, entity_kind, external_id)
           DO UPDATE SET internal_id = excluded.internal_id",
          rusqlite::params![service_str, kind_str, ext, id_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(ResolverMapping { service, entity_kind, external_id, internal_id })
  }

  // ── Translators ───────────────────────────────────────────────────────────

  async fn create_translator(&self, name: String) -> Result<Translator> {
    let translator = Translator {
      translator_id: Uuid::new_v4(),
      slug:          slugify(&name),
      name,
      created_at:    now(),
    };

    let id_str   = encode_uuid(translator.translator_id);
    let name     = translator.name.clone();
    let slug     = translator.slug.clone();
    let at_str   = encode_dt(translator.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO translators (translator_id, name, slug, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, slug, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(translator)
  }

  async fn get_translator(&self, id: Uuid) -> Result<Option<Translator>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTranslator> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {TRANSLATOR_COLUMNS} FROM translators WHERE translator_id = ?1"
              ),
              rusqlite::params![id_str],
              RawTranslator::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTranslator::into_translator).transpose()
  }

  // ── Translations ──────────────────────────────────────────────────────────

  async fn get_or_create_translation(
    &self,
    key: TranslationKey,
    url: Option<String>,
  ) -> Result<(Translation, bool)> {
    let new_id_str  = encode_uuid(Uuid::new_v4());
    let ext         = key.external_id.clone();
    let service_str = encode_service(key.service);
    let season      = key.season;
    let at_str      = encode_dt(now());

    let lookup: Lookup<RawTranslation> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let select = format!(
          "SELECT {TRANSLATION_COLUMNS} FROM translations
           WHERE external_id = ?1 AND service = ?2 AND season IS ?3"
        );
        let mut found = {
          let mut stmt = tx.prepare(&select)?;
          stmt
            .query_map(
              rusqlite::params![ext, service_str, season],
              RawTranslation::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        if found.len() > 1 {
          return Ok(Lookup::Ambiguous);
        }
        if let Some(raw) = found.pop() {
          return Ok(Lookup::Found(raw));
        }

        tx.execute(
          "INSERT INTO translations (
             translation_id, external_id, service, season, url, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![new_id_str, ext, service_str, season, url, at_str],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translations WHERE translation_id = ?1"
          ),
          rusqlite::params![new_id_str],
          RawTranslation::from_row,
        )?;
        tx.commit()?;
        Ok(Lookup::Created(raw))
      })
      .await?;

    match lookup {
      Lookup::Found(raw) => Ok((raw.into_translation()?, false)),
      Lookup::Created(raw) => Ok((raw.into_translation()?, true)),
      Lookup::Ambiguous => Err(
        genkai_core::Error::AmbiguousTranslation {
          external_id: key.external_id,
          service:     key.service,
          season:      key.season,
        }
        .into(),
      ),
    }
  }

  async fn save_translation(&self, translation: Translation) -> Result<Translation> {
    let id_str         = encode_uuid(translation.translation_id);
    let title_str      = translation.title_id.map(encode_uuid);
    let translator_str = translation.translator_id.map(encode_uuid);
    let url            = translation.url.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE translations
           SET title_id = ?2, translator_id = ?3, url = ?4
           WHERE translation_id = ?1",
          rusqlite::params![id_str, title_str, translator_str, url],
        )?;
        Ok(())
      })
      .await?;

    Ok(translation)
  }

  // ── Titles ────────────────────────────────────────────────────────────────

  async fn get_or_create_title(&self, input: NewTitle) -> Result<(Title, bool)> {
    let new_id       = Uuid::new_v4();
    let new_id_str   = encode_uuid(new_id);
    let key          = input.name_key();
    let slug         = slugify(&input.name);
    let names_str    = encode_names(&input.other_names)?;
    let at_str       = encode_dt(now());
    let shikimori_id = input.shikimori_id.map(|id| id as i64);
    let season       = input.season;
    let name         = input.name.clone();
    let year         = input.year;

    let lookup: Lookup<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let (sql, identity): (&str, rusqlite::types::Value) = match shikimori_id {
          Some(sid) => (
            "SELECT title_id FROM titles WHERE shikimori_id = ?1 AND season IS ?2",
            sid.into(),
          ),
          None => (
            "SELECT title_id FROM titles WHERE name_key = ?1 AND season IS ?2",
            key.clone().into(),
          ),
        };
        let found: Vec<String> = {
          let mut stmt = tx.prepare(sql)?;
          let rows = stmt
            .query_map(rusqlite::params![identity, season], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        match found.as_slice() {
          [] => {}
          [id] => return Ok(Lookup::Found(id.clone())),
          _ => return Ok(Lookup::Ambiguous),
        }

        tx.execute(
          "INSERT INTO titles (
             title_id, slug, name, name_key, other_names, season, year,
             shikimori_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            new_id_str,
            slug,
            name,
            key,
            names_str,
            season,
            year,
            shikimori_id,
            at_str,
          ],
        )?;
        tx.commit()?;
        Ok(Lookup::Created(new_id_str))
      })
      .await?;

    let (id_str, is_new) = match lookup {
      Lookup::Found(id) => (id, false),
      Lookup::Created(id) => (id, true),
      Lookup::Ambiguous => {
        return Err(
          genkai_core::Error::AmbiguousTitle {
            name:   input.name,
            season: input.season,
          }
          .into(),
        );
      }
    };

    let id = decode_uuid(&id_str)?;
    let title = self.load_title(id).await?.ok_or(Error::TitleNotFound(id))?;
    Ok((title, is_new))
  }

  async fn get_title(&self, id: Uuid) -> Result<Option<Title>> {
    self.load_title(id).await
  }

  async fn apply_title_metadata(
    &self,
    title_id: Uuid,
    metadata: TitleMetadata,
  ) -> Result<Title> {
    let id_str         = encode_uuid(title_id);
    let age_rating     = metadata.age_rating.as_ref().map(encode_named).transpose()?;
    let status         = metadata.status.as_ref().map(encode_named).transpose()?;
    let title_type     = metadata.title_type.as_ref().map(encode_named).transpose()?;
    let tag_kinds      = metadata
      .tags()
      .iter()
      .map(|(kind, names)| Ok((encode_named(kind)?, names.to_vec())))
      .collect::<Result<Vec<_>>>()?;

    let updated: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let current: Option<String> = tx
          .query_row(
            "SELECT other_names FROM titles WHERE title_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(current) = current else { return Ok(false) };

        let mut other_names: Vec<String> = serde_json::from_str(&current)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
        for name in metadata.other_names {
          if !name.is_empty() && !other_names.contains(&name) {
            other_names.push(name);
          }
        }
        let names_str = serde_json::to_string(&other_names)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

        tx.execute(
          "UPDATE titles SET
             description    = COALESCE(?2, description),
             other_names    = ?3,
             duration       = COALESCE(?4, duration),
             total_episodes = COALESCE(?5, total_episodes),
             age_rating     = COALESCE(?6, age_rating),
             status         = COALESCE(?7, status),
             title_type     = COALESCE(?8, title_type)
           WHERE title_id = ?1",
          rusqlite::params![
            id_str,
            metadata.description,
            names_str,
            metadata.duration,
            metadata.total_episodes,
            age_rating,
            status,
            title_type,
          ],
        )?;

        for (kind, names) in tag_kinds {
          for name in names {
            let name = name.trim().to_owned();
            if name.is_empty() {
              continue;
            }
            let key = name_key(&name);
            tx.execute(
              "INSERT INTO tags (tag_id, kind, name, name_key, slug)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT (kind, name_key) DO NOTHING",
              rusqlite::params![
                encode_uuid(Uuid::new_v4()),
                kind,
                name,
                key,
                slugify(&name),
              ],
            )?;
            let tag_id: String = tx.query_row(
              "SELECT tag_id FROM tags WHERE kind = ?1 AND name_key = ?2",
              rusqlite::params![kind, key],
              |r| r.get(0),
            )?;
            tx.execute(
              "INSERT OR IGNORE INTO title_tags (title_id, tag_id, position)
               VALUES (?1, ?2, (SELECT COUNT(*) FROM title_tags WHERE title_id = ?1))",
              rusqlite::params![id_str, tag_id],
            )?;
          }
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !updated {
      return Err(Error::TitleNotFound(title_id));
    }
    self
      .load_title(title_id)
      .await?
      .ok_or(Error::TitleNotFound(title_id))
  }

  // ── Episodes ──────────────────────────────────────────────────────────────

  async fn get_or_create_episode(
    &self,
    translation_id: Uuid,
    number: u32,
    url: String,
  ) -> Result<(Episode, bool)> {
    let new_id_str      = encode_uuid(Uuid::new_v4());
    let translation_str = encode_uuid(translation_id);
    let at_str          = encode_dt(now());

    let (raw, created): (RawEpisode, bool) = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO episodes (episode_id, translation_id, number, url, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (translation_id, number) DO NOTHING",
          rusqlite::params![new_id_str, translation_str, number, url, at_str],
        )?;
        let raw = conn.query_row(
          &format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes
             WHERE translation_id = ?1 AND number = ?2"
          ),
          rusqlite::params![translation_str, number],
          RawEpisode::from_row,
        )?;
        Ok((raw, inserted == 1))
      })
      .await?;

    Ok((raw.into_episode()?, created))
  }

  async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEpisode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE episode_id = ?1"),
              rusqlite::params![id_str],
              RawEpisode::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEpisode::into_episode).transpose()
  }

  // ── Update ledger ─────────────────────────────────────────────────────────

  async fn record_update(&self, input: NewUpdateRun) -> Result<UpdateRun> {
    let run = UpdateRun {
      update_id:      Uuid::new_v4(),
      kind:           input.kind,
      created_at:     now(),
      without_errors: input.without_errors,
      added_episodes: input.added_episodes,
    };

    let id_str       = encode_uuid(run.update_id);
    let kind_str     = encode_content_kind(run.kind);
    let at_str       = encode_dt(run.created_at);
    let ok           = run.without_errors;
    let episode_strs = run
      .added_episodes
      .iter()
      .map(|id| encode_uuid(*id))
      .collect::<Vec<_>>();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO update_runs (update_id, kind, created_at, without_errors)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, kind_str, at_str, ok],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO update_run_episodes (update_id, episode_id)
             VALUES (?1, ?2)",
          )?;
          for episode in &episode_strs {
            stmt.execute(rusqlite::params![id_str, episode])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(run)
  }

  async fn get_update(&self, id: Uuid) -> Result<Option<UpdateRun>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUpdateRun> = self
      .conn
      .call(move |conn| {
        let row: Option<(String, String, String, bool)> = conn
          .query_row(
            "SELECT update_id, kind, created_at, without_errors
             FROM update_runs WHERE update_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
          )
          .optional()?;
        let Some((update_id, kind, created_at, without_errors)) = row else {
          return Ok(None);
        };
        let added_episodes = run_episodes(conn, &update_id)?;
        Ok(Some(RawUpdateRun {
          update_id,
          kind,
          created_at,
          without_errors,
          added_episodes,
        }))
      })
      .await?;

    raw.map(RawUpdateRun::into_update).transpose()
  }

  async fn list_updates(
    &self,
    kind: Option<ContentKind>,
    limit: usize,
  ) -> Result<Vec<UpdateRun>> {
    let kind_str  = kind.map(encode_content_kind);
    let limit_val = limit as i64;

    let raws: Vec<RawUpdateRun> = self
      .conn
      .call(move |conn| {
        let heads: Vec<(String, String, String, bool)> = {
          let mut stmt = conn.prepare(
            "SELECT update_id, kind, created_at, without_errors
             FROM update_runs
             WHERE ?1 IS NULL OR kind = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
          )?;
          stmt
            .query_map(rusqlite::params![kind_str, limit_val], |r| {
              Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut runs = Vec::with_capacity(heads.len());
        for (update_id, kind, created_at, without_errors) in heads {
          let added_episodes = run_episodes(conn, &update_id)?;
          runs.push(RawUpdateRun {
            update_id,
            kind,
            created_at,
            without_errors,
            added_episodes,
          });
        }
        Ok(runs)
      })
      .await?;

    raws.into_iter().map(RawUpdateRun::into_update).collect()
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  async fn add_subscription(
    &self,
    user_id: Uuid,
    title_id: Uuid,
    translator_id: Uuid,
  ) -> Result<Subscription> {
    let subscription = Subscription {
      user_id,
      title_id,
      translator_id,
      created_at: now(),
    };

    let user_str       = encode_uuid(user_id);
    let title_str      = encode_uuid(title_id);
    let translator_str = encode_uuid(translator_id);
    let at_str         = encode_dt(subscription.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO subscriptions (user_id, title_id, translator_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![user_str, title_str, translator_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subscription)
  }

  async fn subscribers_for_episode(&self, episode_id: Uuid) -> Result<Vec<Uuid>> {
    let id_str = encode_uuid(episode_id);

    let users: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT s.user_id
           FROM episodes e
           JOIN translations tr ON tr.translation_id = e.translation_id
           JOIN subscriptions s
             ON s.title_id = tr.title_id AND s.translator_id = tr.translator_id
           WHERE e.episode_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    users.iter().map(|s| decode_uuid(s)).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn create_notifications(
    &self,
    input: Vec<NewNotification>,
  ) -> Result<Vec<Notification>> {
    let created_at = now();
    let candidates: Vec<Notification> = input
      .into_iter()
      .map(|n| Notification {
        notification_id:   Uuid::new_v4(),
        user_id:           n.user_id,
        notification_type: n.notification_type,
        episode_id:        n.episode_id,
        seen:              false,
        created_at,
      })
      .collect();

    let rows: Vec<(String, String, i64, Option<String>, String)> = candidates
      .iter()
      .map(|n| {
        (
          encode_uuid(n.notification_id),
          encode_uuid(n.user_id),
          n.notification_type.code(),
          n.episode_id.map(encode_uuid),
          encode_dt(n.created_at),
        )
      })
      .collect();

    let inserted: Vec<bool> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(rows.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO notifications (
               notification_id, user_id, notification_type, episode_id, seen, created_at
             ) VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT (user_id, notification_type, episode_id) DO NOTHING",
          )?;
          for (id, user, kind, episode, at) in &rows {
            let n = stmt.execute(rusqlite::params![id, user, kind, episode, at])?;
            inserted.push(n == 1);
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(
      candidates
        .into_iter()
        .zip(inserted)
        .filter_map(|(n, ok)| ok.then_some(n))
        .collect(),
    )
  }

  async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawNotification> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1"
              ),
              rusqlite::params![id_str],
              RawNotification::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNotification::into_notification).transpose()
  }

  async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn push_context(&self, notification_id: Uuid) -> Result<Option<PushContext>> {
    let id_str = encode_uuid(notification_id);

    type Joined = (
      RawNotification,
      Option<String>,
      Option<String>,
      Option<u32>,
      u64,
    );

    let joined: Option<Joined> = self
      .conn
      .call(move |conn| {
        let row = conn
          .query_row(
            "SELECT n.notification_id, n.user_id, n.notification_type,
                    n.episode_id, n.seen, n.created_at,
                    t.name, t.slug, e.number
             FROM notifications n
             LEFT JOIN episodes e      ON e.episode_id      = n.episode_id
             LEFT JOIN translations tr ON tr.translation_id = e.translation_id
             LEFT JOIN titles t        ON t.title_id        = tr.title_id
             WHERE n.notification_id = ?1",
            rusqlite::params![id_str],
            |r| {
              Ok((
                RawNotification::from_row(r)?,
                r.get(6)?,
                r.get(7)?,
                r.get(8)?,
              ))
            },
          )
          .optional()?;

        let Some((raw, name, slug, number)) = row else { return Ok(None) };

        let unseen: i64 = conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND seen = 0",
          rusqlite::params![raw.user_id],
          |r| r.get(0),
        )?;

        Ok(Some((raw, name, slug, number, unseen as u64)))
      })
      .await?;

    let Some((raw, name, slug, number, unseen_count)) = joined else {
      return Ok(None);
    };

    let subject = match (name, slug, number) {
      (Some(title_name), Some(title_slug), Some(episode_number)) => {
        Some(EpisodeSubject { title_name, title_slug, episode_number })
      }
      _ => None,
    };

    Ok(Some(PushContext {
      notification: raw.into_notification()?,
      subject,
      unseen_count,
    }))
  }

  // ── Push endpoints ────────────────────────────────────────────────────────

  async fn add_push_endpoint(&self, input: NewPushEndpoint) -> Result<PushEndpoint> {
    let endpoint = PushEndpoint {
      endpoint_id: Uuid::new_v4(),
      user_id:     input.user_id,
      endpoint:    input.endpoint,
      keys:        input.keys,
      device:      input.device,
      created_at:  now(),
    };

    let id_str   = encode_uuid(endpoint.endpoint_id);
    let user_str = encode_uuid(endpoint.user_id);
    let url      = endpoint.endpoint.clone();
    let p256dh   = endpoint.keys.p256dh.clone();
    let auth     = endpoint.keys.auth.clone();
    let device   = endpoint.device.clone();
    let at_str   = encode_dt(endpoint.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO push_endpoints ({PUSH_ENDPOINT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
          ),
          rusqlite::params![id_str, user_str, url, p256dh, auth, device, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(endpoint)
  }

  async fn list_push_endpoints(&self, user_id: Uuid) -> Result<Vec<PushEndpoint>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawPushEndpoint> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PUSH_ENDPOINT_COLUMNS} FROM push_endpoints
           WHERE user_id = ?1
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawPushEndpoint::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPushEndpoint::into_endpoint).collect()
  }

  async fn delete_push_endpoint(&self, endpoint_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(endpoint_id);

    let deleted: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM push_endpoints WHERE endpoint_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  // ── Admission counters ────────────────────────────────────────────────────

  async fn admission_increment(&self, key: String) -> Result<i64> {
    let value: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO admission_counters (key, value) VALUES (?1, 1)
           ON CONFLICT (key) DO UPDATE SET value = value + 1
           RETURNING value",
          rusqlite::params![key],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(value)
  }

  async fn admission_clear(&self, key: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM admission_counters WHERE key = ?1",
          rusqlite::params![key],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn admission_clear_all(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute("DELETE FROM admission_counters", [])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Episode ids recorded for a run, in insertion order.
fn run_episodes(
  conn: &rusqlite::Connection,
  update_id: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT episode_id FROM update_run_episodes WHERE update_id = ?1 ORDER BY rowid",
  )?;
  let ids = stmt
    .query_map(rusqlite::params![update_id], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(ids)
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }
