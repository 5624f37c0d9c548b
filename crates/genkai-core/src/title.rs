//! Titles and their descriptive tags.
//!
//! A title is created once per `(shikimori_id, season)`, or per
//! `(lowercased name, season)` when the feed carries no shikimori id.
//! Descriptive metadata is written only at creation time; later syncs never
//! overwrite it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
  Series,
  Movie,
  Ova,
  Ona,
  Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleStatus {
  Released,
  Ongoing,
  Announce,
}

/// MPAA-style age rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeRating {
  #[serde(rename = "G")]
  G,
  #[serde(rename = "PG")]
  Pg,
  #[serde(rename = "PG-13")]
  Pg13,
  #[serde(rename = "R")]
  R,
  #[serde(rename = "NC-17")]
  Nc17,
}

/// Original medium. Editorial only; the feed never supplies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleSource {
  Manga,
  Manhwa,
  Game,
  Novel,
  Original,
  Book,
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
  Country,
  Genre,
  Studio,
}

/// A country, genre or studio. Unique on `(kind, lowercased name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub tag_id: Uuid,
  pub kind:   TagKind,
  pub name:   String,
  pub slug:   String,
}

// ─── Title ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Title {
  pub title_id:       Uuid,
  pub slug:           String,
  pub name:           String,
  pub other_names:    Vec<String>,
  pub season:         Option<i32>,
  pub year:           Option<u16>,
  pub shikimori_id:   Option<u64>,
  #[serde(rename = "type")]
  pub title_type:     Option<TitleType>,
  pub status:         Option<TitleStatus>,
  pub age_rating:     Option<AgeRating>,
  pub source:         Option<TitleSource>,
  pub countries:      Vec<Tag>,
  pub genres:         Vec<Tag>,
  pub studios:        Vec<Tag>,
  pub description:    String,
  /// Episode duration in minutes.
  pub duration:       Option<u32>,
  pub total_episodes: Option<u32>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::CatalogStore::get_or_create_title`].
///
/// Only the identity fields are used for lookup; the rest are creation
/// defaults and are ignored when a matching title already exists.
#[derive(Debug, Clone)]
pub struct NewTitle {
  pub shikimori_id: Option<u64>,
  pub season:       Option<i32>,
  pub name:         String,
  pub other_names:  Vec<String>,
  pub year:         Option<u16>,
}

impl NewTitle {
  /// Case-folded name used for the fallback identity.
  pub fn name_key(&self) -> String { name_key(&self.name) }
}

/// Case-insensitive comparison key for names (titles and tags).
pub fn name_key(name: &str) -> String { name.trim().to_lowercase() }

/// Descriptive fields merged into a title right after it is created.
///
/// Every field is optional: an absent field is skipped, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleMetadata {
  pub description:    Option<String>,
  /// Appended to the title's existing other names, skipping duplicates.
  pub other_names:    Vec<String>,
  pub countries:      Vec<String>,
  pub genres:         Vec<String>,
  pub studios:        Vec<String>,
  pub duration:       Option<u32>,
  pub total_episodes: Option<u32>,
  pub age_rating:     Option<AgeRating>,
  pub status:         Option<TitleStatus>,
  pub title_type:     Option<TitleType>,
}

impl TitleMetadata {
  /// Tag names grouped by kind, in application order.
  pub fn tags(&self) -> [(TagKind, &[String]); 3] {
    [
      (TagKind::Country, &self.countries),
      (TagKind::Genre, &self.genres),
      (TagKind::Studio, &self.studios),
    ]
  }
}
