//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order is chronological. UUIDs are stored as hyphenated
//! lowercase strings. String enums reuse their serde names.

use chrono::{DateTime, SecondsFormat, Utc};
use genkai_core::{
  catalog::{ContentKind, Episode, Translation, Translator},
  notification::{Notification, NotificationType, PushEndpoint, PushKeys},
  resolver::{EntityKind, Service},
  title::{Tag, Title},
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Keys ─────────────────────────────────────────────────────────────────────

pub fn encode_service(s: Service) -> &'static str {
  match s {
    Service::Kodik => "kodik",
  }
}

pub fn decode_service(s: &str) -> Result<Service> {
  match s {
    "kodik" => Ok(Service::Kodik),
    other => Err(unknown("service", other)),
  }
}

pub fn encode_entity_kind(k: EntityKind) -> &'static str {
  match k {
    EntityKind::Translator => "translator",
    EntityKind::Translation => "translation",
    EntityKind::Title => "title",
  }
}

pub fn encode_content_kind(k: ContentKind) -> &'static str { k.as_str() }

pub fn decode_content_kind(s: &str) -> Result<ContentKind> {
  s.parse().map_err(|_| unknown("kind", s))
}

// ─── Serde-named enums ────────────────────────────────────────────────────────

/// Encode a unit enum variant as its serde name.
pub fn encode_named<T: Serialize>(value: &T) -> Result<String> {
  match serde_json::to_value(value)? {
    serde_json::Value::String(s) => Ok(s),
    other => Err(Error::UnknownCode {
      column: "enum",
      value:  other.to_string(),
    }),
  }
}

fn decode_named<T: DeserializeOwned>(
  column: &'static str,
  s: Option<String>,
) -> Result<Option<T>> {
  s.map(|s| {
    serde_json::from_value(serde_json::Value::String(s.clone()))
      .map_err(|_| unknown(column, &s))
  })
  .transpose()
}

fn unknown(column: &'static str, value: &str) -> Error {
  Error::UnknownCode { column, value: value.to_owned() }
}

// ─── String lists ─────────────────────────────────────────────────────────────

pub fn encode_names(names: &[String]) -> Result<String> {
  Ok(serde_json::to_string(names)?)
}

pub fn decode_names(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const TRANSLATOR_COLUMNS: &str = "translator_id, name, slug, created_at";

/// Raw strings read directly from a `translators` row.
pub struct RawTranslator {
  pub translator_id: String,
  pub name:          String,
  pub slug:          String,
  pub created_at:    String,
}

impl RawTranslator {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      translator_id: row.get(0)?,
      name:          row.get(1)?,
      slug:          row.get(2)?,
      created_at:    row.get(3)?,
    })
  }

  pub fn into_translator(self) -> Result<Translator> {
    Ok(Translator {
      translator_id: decode_uuid(&self.translator_id)?,
      name:          self.name,
      slug:          self.slug,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const TRANSLATION_COLUMNS: &str = "translation_id, title_id, translator_id, \
   external_id, service, season, url, is_other, created_at";

/// Raw values read directly from a `translations` row.
pub struct RawTranslation {
  pub translation_id: String,
  pub title_id:       Option<String>,
  pub translator_id:  Option<String>,
  pub external_id:    String,
  pub service:        String,
  pub season:         Option<i32>,
  pub url:            Option<String>,
  pub is_other:       bool,
  pub created_at:     String,
}

impl RawTranslation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      translation_id: row.get(0)?,
      title_id:       row.get(1)?,
      translator_id:  row.get(2)?,
      external_id:    row.get(3)?,
      service:        row.get(4)?,
      season:         row.get(5)?,
      url:            row.get(6)?,
      is_other:       row.get(7)?,
      created_at:     row.get(8)?,
    })
  }

  pub fn into_translation(self) -> Result<Translation> {
    Ok(Translation {
      translation_id: decode_uuid(&self.translation_id)?,
      title_id:       decode_opt_uuid(self.title_id)?,
      translator_id:  decode_opt_uuid(self.translator_id)?,
      external_id:    self.external_id,
      service:        decode_service(&self.service)?,
      season:         self.season,
      url:            self.url,
      is_other:       self.is_other,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub const TITLE_COLUMNS: &str = "title_id, slug, name, other_names, season, \
   year, shikimori_id, title_type, status, age_rating, source, description, \
   duration, total_episodes, created_at";

/// Raw values read directly from a `titles` row. Tags are loaded separately.
pub struct RawTitle {
  pub title_id:       String,
  pub slug:           String,
  pub name:           String,
  pub other_names:    String,
  pub season:         Option<i32>,
  pub year:           Option<u16>,
  pub shikimori_id:   Option<i64>,
  pub title_type:     Option<String>,
  pub status:         Option<String>,
  pub age_rating:     Option<String>,
  pub source:         Option<String>,
  pub description:    String,
  pub duration:       Option<u32>,
  pub total_episodes: Option<u32>,
  pub created_at:     String,
}

impl RawTitle {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      title_id:       row.get(0)?,
      slug:           row.get(1)?,
      name:           row.get(2)?,
      other_names:    row.get(3)?,
      season:         row.get(4)?,
      year:           row.get(5)?,
      shikimori_id:   row.get(6)?,
      title_type:     row.get(7)?,
      status:         row.get(8)?,
      age_rating:     row.get(9)?,
      source:         row.get(10)?,
      description:    row.get(11)?,
      duration:       row.get(12)?,
      total_episodes: row.get(13)?,
      created_at:     row.get(14)?,
    })
  }

  pub fn into_title(self, tags: Vec<RawTag>) -> Result<Title> {
    let mut title = Title {
      title_id:       decode_uuid(&self.title_id)?,
      slug:           self.slug,
      name:           self.name,
      other_names:    decode_names(&self.other_names)?,
      season:         self.season,
      year:           self.year,
      shikimori_id:   self.shikimori_id.map(|id| id as u64),
      title_type:     decode_named("title_type", self.title_type)?,
      status:         decode_named("status", self.status)?,
      age_rating:     decode_named("age_rating", self.age_rating)?,
      source:         decode_named("source", self.source)?,
      countries:      Vec::new(),
      genres:         Vec::new(),
      studios:        Vec::new(),
      description:    self.description,
      duration:       self.duration,
      total_episodes: self.total_episodes,
      created_at:     decode_dt(&self.created_at)?,
    };

    for raw in tags {
      let tag = raw.into_tag()?;
      match tag.kind {
        genkai_core::title::TagKind::Country => title.countries.push(tag),
        genkai_core::title::TagKind::Genre => title.genres.push(tag),
        genkai_core::title::TagKind::Studio => title.studios.push(tag),
      }
    }

    Ok(title)
  }
}

pub const TAG_COLUMNS: &str = "t.tag_id, t.kind, t.name, t.slug";

pub struct RawTag {
  pub tag_id: String,
  pub kind:   String,
  pub name:   String,
  pub slug:   String,
}

impl RawTag {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tag_id: row.get(0)?,
      kind:   row.get(1)?,
      name:   row.get(2)?,
      slug:   row.get(3)?,
    })
  }

  fn into_tag(self) -> Result<Tag> {
    let kind = decode_named("tag kind", Some(self.kind))?
      .ok_or_else(|| unknown("tag kind", ""))?;
    Ok(Tag {
      tag_id: decode_uuid(&self.tag_id)?,
      kind,
      name: self.name,
      slug: self.slug,
    })
  }
}

pub const EPISODE_COLUMNS: &str =
  "episode_id, translation_id, number, name, url, created_at";

pub struct RawEpisode {
  pub episode_id:     String,
  pub translation_id: String,
  pub number:         u32,
  pub name:           String,
  pub url:            String,
  pub created_at:     String,
}

impl RawEpisode {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      episode_id:     row.get(0)?,
      translation_id: row.get(1)?,
      number:         row.get(2)?,
      name:           row.get(3)?,
      url:            row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_episode(self) -> Result<Episode> {
    Ok(Episode {
      episode_id:     decode_uuid(&self.episode_id)?,
      translation_id: decode_uuid(&self.translation_id)?,
      number:         self.number,
      name:           self.name,
      url:            self.url,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, user_id, notification_type, episode_id, seen, created_at";

pub struct RawNotification {
  pub notification_id:   String,
  pub user_id:           String,
  pub notification_type: i64,
  pub episode_id:        Option<String>,
  pub seen:              bool,
  pub created_at:        String,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id:   row.get(0)?,
      user_id:           row.get(1)?,
      notification_type: row.get(2)?,
      episode_id:        row.get(3)?,
      seen:              row.get(4)?,
      created_at:        row.get(5)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id:   decode_uuid(&self.notification_id)?,
      user_id:           decode_uuid(&self.user_id)?,
      notification_type: NotificationType::from_code(self.notification_type)?,
      episode_id:        decode_opt_uuid(self.episode_id)?,
      seen:              self.seen,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub const PUSH_ENDPOINT_COLUMNS: &str =
  "endpoint_id, user_id, endpoint, p256dh, auth, device, created_at";

pub struct RawPushEndpoint {
  pub endpoint_id: String,
  pub user_id:     String,
  pub endpoint:    String,
  pub p256dh:      String,
  pub auth:        String,
  pub device:      Option<String>,
  pub created_at:  String,
}

impl RawPushEndpoint {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      endpoint_id: row.get(0)?,
      user_id:     row.get(1)?,
      endpoint:    row.get(2)?,
      p256dh:      row.get(3)?,
      auth:        row.get(4)?,
      device:      row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_endpoint(self) -> Result<PushEndpoint> {
    Ok(PushEndpoint {
      endpoint_id: decode_uuid(&self.endpoint_id)?,
      user_id:     decode_uuid(&self.user_id)?,
      endpoint:    self.endpoint,
      keys:        PushKeys { p256dh: self.p256dh, auth: self.auth },
      device:      self.device,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// A `update_runs` row plus its episode ids, in insertion order.
pub struct RawUpdateRun {
  pub update_id:      String,
  pub kind:           String,
  pub created_at:     String,
  pub without_errors: bool,
  pub added_episodes: Vec<String>,
}

impl RawUpdateRun {
  pub fn into_update(self) -> Result<genkai_core::update::UpdateRun> {
    Ok(genkai_core::update::UpdateRun {
      update_id:      decode_uuid(&self.update_id)?,
      kind:           decode_content_kind(&self.kind)?,
      created_at:     decode_dt(&self.created_at)?,
      without_errors: self.without_errors,
      added_episodes: self
        .added_episodes
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<_>>()?,
    })
  }
}
