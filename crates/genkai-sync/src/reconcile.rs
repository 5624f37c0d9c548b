//! The item reconciler: maps one feed release onto catalog rows.

use genkai_core::{
  catalog::{ContentKind, Episode, Translation, TranslationKey},
  resolver::{EntityKind, Service},
  store::CatalogStore,
  title::{NewTitle, TitleMetadata},
};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  feed::{FeedItem, Release},
  profile::KindProfile,
};

/// Result of reconciling one release.
#[derive(Debug, Default)]
pub struct Reconciled {
  /// Episodes created by this call; pre-existing ones are not listed.
  pub episodes:     Vec<Episode>,
  pub is_new_title: bool,
}

pub struct Reconciler<'a, S> {
  store:   &'a S,
  profile: &'static KindProfile,
}

impl<'a, S> Reconciler<'a, S>
where
  S: CatalogStore,
{
  pub fn new(store: &'a S, kind: ContentKind) -> Self {
    Self { store, profile: KindProfile::for_kind(kind) }
  }

  /// Reconcile one release of `item`: translation, translator, title, then
  /// episodes.
  pub async fn reconcile(
    &self,
    item: &FeedItem,
    release: &Release<'_>,
  ) -> Result<Reconciled> {
    let key = TranslationKey {
      external_id: item.id.to_string(),
      service:     Service::Kodik,
      season:      release.season,
    };
    let (mut translation, _) = self
      .store
      .get_or_create_translation(key, release.url.map(str::to_owned))
      .await
      .map_err(Error::store)?;

    let translator_id = self.translator_for(item, &translation).await?;
    translation.translator_id = Some(translator_id);

    let is_new_title = match translation.title_id {
      Some(_) => false,
      None => {
        let (title_id, is_new) = self.title_for(item, release.season).await?;
        translation.title_id = Some(title_id);
        is_new
      }
    };

    let translation = self
      .store
      .save_translation(translation)
      .await
      .map_err(Error::store)?;

    let episodes = self.episodes(&translation, &release.episodes).await?;

    Ok(Reconciled { episodes, is_new_title })
  }

  /// Reuse the translation's translator, or resolve it through the external
  /// translation id, creating and binding a new one when unresolved.
  async fn translator_for(
    &self,
    item: &FeedItem,
    translation: &Translation,
  ) -> Result<Uuid> {
    if let Some(id) = translation.translator_id {
      return Ok(id);
    }

    let external_id = item.translation.id.to_string();
    let mapped = self
      .store
      .resolve(Service::Kodik, EntityKind::Translator, external_id.clone())
      .await
      .map_err(Error::store)?;

    if let Some(id) = mapped {
      let existing = self.store.get_translator(id).await.map_err(Error::store)?;
      if let Some(translator) = existing {
        return Ok(translator.translator_id);
      }
    }

    let translator = self
      .store
      .create_translator(item.translation.title.trim().to_owned())
      .await
      .map_err(Error::store)?;
    self
      .store
      .bind(
        Service::Kodik,
        EntityKind::Translator,
        external_id,
        translator.translator_id,
      )
      .await
      .map_err(Error::store)?;

    debug!(translator = %translator.name, "created translator");
    Ok(translator.translator_id)
  }

  /// Get or create the title, applying material data only on creation.
  async fn title_for(&self, item: &FeedItem, season: Option<i32>) -> Result<(Uuid, bool)> {
    let input = NewTitle {
      shikimori_id: item.shikimori_id(),
      season,
      name: item.title.trim().to_owned(),
      other_names: item.other_names(),
      year: item.year,
    };

    let (title, is_new) = self
      .store
      .get_or_create_title(input)
      .await
      .map_err(Error::store)?;

    if is_new {
      let metadata = item
        .material_data
        .as_ref()
        .map(|data| title_metadata(data, self.profile))
        .unwrap_or_default();
      self
        .store
        .apply_title_metadata(title.title_id, metadata)
        .await
        .map_err(Error::store)?;
      info!(title = %title.name, ?season, "created title");
    }

    Ok((title.title_id, is_new))
  }

  async fn episodes(
    &self,
    translation: &Translation,
    pairs: &[(&str, &str)],
  ) -> Result<Vec<Episode>> {
    let mut numbered: Vec<(u32, &str)> = Vec::with_capacity(pairs.len());
    for &(raw, url) in pairs {
      match raw.trim().parse::<u32>() {
        Ok(number) => numbered.push((number, url)),
        Err(_) => info!(number = %raw, external_id = %translation.external_id, "skipping weird episode number"),
      }
    }
    numbered.sort_by_key(|(n, _)| *n);

    let mut created = Vec::new();
    for (number, url) in numbered {
      let (episode, is_new) = self
        .store
        .get_or_create_episode(translation.translation_id, number, url.to_owned())
        .await
        .map_err(Error::store)?;
      if is_new {
        created.push(episode);
      }
    }
    Ok(created)
  }
}

/// Descriptive title fields from an item's `material_data`. Absent or
/// malformed sub-fields are skipped.
pub fn title_metadata(data: &Map<String, Value>, profile: &KindProfile) -> TitleMetadata {
  let text = |key: &str| {
    data
      .get(key)
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned)
  };
  let list = |key: &str| -> Vec<String> {
    data
      .get(key)
      .and_then(Value::as_array)
      .map(|items| {
        items
          .iter()
          .filter_map(Value::as_str)
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .map(str::to_owned)
          .collect()
      })
      .unwrap_or_default()
  };
  let count = |key: &str| {
    data
      .get(key)
      .and_then(Value::as_u64)
      .and_then(|n| u32::try_from(n).ok())
  };
  let code = |key: &str| data.get(key).and_then(Value::as_str);

  TitleMetadata {
    description:    text("description"),
    other_names:    ["title", "title_en"].into_iter().filter_map(text).collect(),
    countries:      list("countries"),
    genres:         list("anime_genres"),
    studios:        list("anime_studios"),
    duration:       count("duration"),
    total_episodes: count("episodes_total"),
    age_rating:     code("rating_mpaa").and_then(|c| profile.age_rating(c)),
    status:         code("anime_status").and_then(|c| profile.status(c)),
    title_type:     code("anime_kind").and_then(|c| profile.title_type(c)),
  }
}
