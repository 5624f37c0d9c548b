//! Per-kind configuration records for the Kodik listing feed.

use genkai_core::{
  catalog::ContentKind,
  title::{AgeRating, TitleStatus, TitleType},
};

/// Everything that differs between the series and movies listings.
#[derive(Debug)]
pub struct KindProfile {
  pub kind:            ContentKind,
  /// Values sent as the `types` request parameter.
  pub feed_types:      &'static [&'static str],
  /// Top-level item fields whose absence makes an item invalid.
  pub required_fields: &'static [&'static str],
  pub title_types:     &'static [(&'static str, TitleType)],
  pub statuses:        &'static [(&'static str, TitleStatus)],
  pub age_ratings:     &'static [(&'static str, AgeRating)],
}

const KODIK_TITLE_TYPES: &[(&str, TitleType)] = &[
  ("tv", TitleType::Series),
  ("tv_13", TitleType::Series),
  ("tv_24", TitleType::Series),
  ("tv484", TitleType::Series),
  ("movie", TitleType::Movie),
  ("ova", TitleType::Ova),
  ("ona", TitleType::Ona),
  ("special", TitleType::Special),
];

const KODIK_STATUSES: &[(&str, TitleStatus)] = &[
  ("anons", TitleStatus::Announce),
  ("ongoing", TitleStatus::Ongoing),
  ("released", TitleStatus::Released),
];

const KODIK_AGE_RATINGS: &[(&str, AgeRating)] = &[
  ("G", AgeRating::G),
  ("PG", AgeRating::Pg),
  ("PG-13", AgeRating::Pg13),
  ("R", AgeRating::R),
  ("R+", AgeRating::Nc17),
  ("Rx", AgeRating::Nc17),
];

pub static SERIES: KindProfile = KindProfile {
  kind:            ContentKind::Series,
  feed_types:      &["anime-serial"],
  required_fields: &["id", "type", "title", "seasons", "translation"],
  title_types:     KODIK_TITLE_TYPES,
  statuses:        KODIK_STATUSES,
  age_ratings:     KODIK_AGE_RATINGS,
};

pub static MOVIES: KindProfile = KindProfile {
  kind:            ContentKind::Movies,
  feed_types:      &["anime"],
  required_fields: &["id", "link", "type", "title", "translation"],
  title_types:     KODIK_TITLE_TYPES,
  statuses:        KODIK_STATUSES,
  age_ratings:     KODIK_AGE_RATINGS,
};

impl KindProfile {
  pub fn for_kind(kind: ContentKind) -> &'static KindProfile {
    match kind {
      ContentKind::Series => &SERIES,
      ContentKind::Movies => &MOVIES,
    }
  }

  /// First required field missing from `item`, if any.
  pub fn missing_field(
    &self,
    item: &serde_json::Map<String, serde_json::Value>,
  ) -> Option<&'static str> {
    self
      .required_fields
      .iter()
      .copied()
      .find(|field| !item.contains_key(*field))
  }

  pub fn title_type(&self, code: &str) -> Option<TitleType> { lookup(self.title_types, code) }

  pub fn status(&self, code: &str) -> Option<TitleStatus> { lookup(self.statuses, code) }

  pub fn age_rating(&self, code: &str) -> Option<AgeRating> { lookup(self.age_ratings, code) }
}

fn lookup<T: Copy>(table: &[(&str, T)], code: &str) -> Option<T> {
  table.iter().find(|(c, _)| *c == code).map(|(_, v)| *v)
}
