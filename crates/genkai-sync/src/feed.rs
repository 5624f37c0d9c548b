//! Shape of the Kodik listing feed.
//!
//! Items arrive as raw JSON. [`FeedItem::parse`] checks the kind's required
//! fields against the raw object first, then decodes the typed view.
//! `material_data` stays untyped so that a malformed sub-field only loses
//! that sub-field.

use std::{collections::BTreeMap, fmt};

use genkai_core::{Error as CoreError, catalog::ContentKind};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::profile::KindProfile;

/// One page of the listing as returned by the API.
#[derive(Debug, Deserialize)]
pub struct RawPage {
  #[serde(default)]
  pub results:   Vec<Value>,
  pub next_page: Option<String>,
}

/// Ids arrive as numbers for some objects and strings for others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
  Int(i64),
  Str(String),
}

impl fmt::Display for ExternalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int(n) => write!(f, "{n}"),
      Self::Str(s) => f.write_str(s.trim()),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedTranslation {
  pub id:    ExternalId,
  pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSeason {
  pub link:     Option<String>,
  #[serde(default)]
  pub episodes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
  pub id:            ExternalId,
  #[serde(rename = "type")]
  pub item_type:     String,
  pub link:          Option<String>,
  pub title:         String,
  pub title_orig:    Option<String>,
  pub other_title:   Option<String>,
  pub year:          Option<u16>,
  pub shikimori_id:  Option<ExternalId>,
  pub translation:   FeedTranslation,
  #[serde(default)]
  pub seasons:       BTreeMap<String, FeedSeason>,
  #[serde(default)]
  pub material_data: Option<Map<String, Value>>,
}

/// One translation's worth of an item: a season of a series, or a movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release<'a> {
  pub season:   Option<i32>,
  pub url:      Option<&'a str>,
  /// `(number, url)` pairs as they appear in the feed, numbers unparsed.
  pub episodes: Vec<(&'a str, &'a str)>,
}

impl FeedItem {
  /// Validate and decode a raw item for `kind`.
  pub fn parse(raw: &Value, kind: ContentKind) -> Result<Self, CoreError> {
    let invalid = |reason: String| CoreError::InvalidItem { kind, reason };

    let object = raw
      .as_object()
      .ok_or_else(|| invalid("item is not an object".into()))?;

    if let Some(field) = KindProfile::for_kind(kind).missing_field(object) {
      return Err(invalid(format!("field [{field}] is missing")));
    }

    Self::deserialize(raw).map_err(|e| invalid(format!("malformed item: {e}")))
  }

  /// Shikimori id, when the feed carries a usable one.
  pub fn shikimori_id(&self) -> Option<u64> {
    match self.shikimori_id.as_ref()? {
      ExternalId::Int(n) => u64::try_from(*n).ok(),
      ExternalId::Str(s) => s.trim().parse().ok(),
    }
  }

  /// Alternate names from `title_orig` and `other_title`, split on `/`,
  /// trimmed and de-duplicated in order of appearance.
  pub fn other_names(&self) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let sources = [self.title_orig.as_deref(), self.other_title.as_deref()];
    for part in sources.into_iter().flatten().flat_map(|s| s.split('/')) {
      let name = part.trim();
      if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_owned());
      }
    }
    names
  }

  /// The releases this item describes for `kind`.
  pub fn releases(&self, kind: ContentKind) -> Result<Vec<Release<'_>>, CoreError> {
    match kind {
      ContentKind::Movies => {
        let link = self.link.as_deref().ok_or_else(|| CoreError::InvalidItem {
          kind,
          reason: "field [link] is missing".into(),
        })?;
        Ok(vec![Release {
          season:   None,
          url:      Some(link),
          episodes: vec![("1", link)],
        }])
      }
      ContentKind::Series => self
        .seasons
        .iter()
        .map(|(key, season)| {
          let number = key.trim().parse::<i32>().map_err(|_| CoreError::InvalidItem {
            kind,
            reason: format!("season key {key:?} is not a number"),
          })?;
          Ok(Release {
            season:   Some(number),
            url:      season.link.as_deref(),
            episodes: season
              .episodes
              .iter()
              .map(|(n, url)| (n.as_str(), url.as_str()))
              .collect(),
          })
        })
        .collect(),
    }
  }
}
