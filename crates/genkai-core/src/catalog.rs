//! Catalog entities owned by the reconciler: translators, translations and
//! episodes.
//!
//! A translation is one translator's rendition of one season of a title on
//! one external service. It may exist before either its title or its
//! translator has been resolved; both are filled in during reconciliation.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resolver::Service;

// ─── Content kind ────────────────────────────────────────────────────────────

/// The two listings the external feed is polled for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
  Series,
  Movies,
}

impl ContentKind {
  /// Every kind, in the order a scheduled sync processes them.
  pub const ALL: [ContentKind; 2] = [ContentKind::Series, ContentKind::Movies];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Series => "series",
      Self::Movies => "movies",
    }
  }
}

impl fmt::Display for ContentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ContentKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "series" => Ok(Self::Series),
      "movies" => Ok(Self::Movies),
      other => Err(format!("unknown content kind: {other:?}")),
    }
  }
}

// ─── Translator ──────────────────────────────────────────────────────────────

/// A dubbing or subtitling team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translator {
  pub translator_id: Uuid,
  pub name:          String,
  pub slug:          String,
  pub created_at:    DateTime<Utc>,
}

// ─── Translation ─────────────────────────────────────────────────────────────

/// Identity of a translation: unique on `(external_id, service, season)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationKey {
  pub external_id: String,
  pub service:     Service,
  /// `None` for movies.
  pub season:      Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
  pub translation_id: Uuid,
  pub title_id:       Option<Uuid>,
  pub translator_id:  Option<Uuid>,
  pub external_id:    String,
  pub service:        Service,
  pub season:         Option<i32>,
  pub url:            Option<String>,
  /// Editorial flag for translations listed under "other"; never set by sync.
  pub is_other:       bool,
  pub created_at:     DateTime<Utc>,
}

impl Translation {
  pub fn key(&self) -> TranslationKey {
    TranslationKey {
      external_id: self.external_id.clone(),
      service:     self.service,
      season:      self.season,
    }
  }
}

// ─── Episode ─────────────────────────────────────────────────────────────────

/// A single playable episode. Unique on `(translation_id, number)`; once
/// created, sync never touches it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
  pub episode_id:     Uuid,
  pub translation_id: Uuid,
  pub number:         u32,
  pub name:           String,
  pub url:            String,
  pub created_at:     DateTime<Utc>,
}
