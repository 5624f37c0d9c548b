//! Error types for `genkai-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{catalog::ContentKind, resolver::{EntityKind, Service}};

#[derive(Debug, Error)]
pub enum Error {
  /// A raw feed item is missing a field required for its content kind, or a
  /// field has an unusable shape.
  #[error("invalid {kind} item: {reason}")]
  InvalidItem { kind: ContentKind, reason: String },

  #[error(
    "found multiple translations for external id {external_id:?} \
     (service {service:?}, season {season:?})"
  )]
  AmbiguousTranslation {
    external_id: String,
    service:     Service,
    season:      Option<i32>,
  },

  #[error("found multiple titles named {name:?} (season {season:?})")]
  AmbiguousTitle { name: String, season: Option<i32> },

  #[error(
    "found multiple resolver mappings for {entity_kind:?} {external_id:?} \
     (service {service:?})"
  )]
  DuplicateMappingConflict {
    service:     Service,
    entity_kind: EntityKind,
    external_id: String,
  },

  #[error("unknown notification type code: {0}")]
  UnknownNotificationType(i64),

  /// A notification references an object that is required by its type but is
  /// absent (e.g. a subscription notification without an episode).
  #[error("notification {0} is missing its related object")]
  NotificationRelatedMissing(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Walk an error's `source()` chain and return the first [`Error`] found.
  ///
  /// Backends wrap core errors (e.g. [`Error::AmbiguousTranslation`]) in their
  /// own error type; callers holding only `dyn Error` use this to classify
  /// them.
  pub fn find_in<'a>(
    err: &'a (dyn std::error::Error + 'static),
  ) -> Option<&'a Error> {
    let mut current = Some(err);
    while let Some(e) = current {
      if let Some(core) = e.downcast_ref::<Error>() {
        return Some(core);
      }
      current = e.source();
    }
    None
  }

  /// Errors that invalidate a single feed item but leave the run healthy
  /// enough to continue with the next item.
  pub fn is_item_level(&self) -> bool {
    matches!(
      self,
      Self::InvalidItem { .. }
        | Self::AmbiguousTranslation { .. }
        | Self::AmbiguousTitle { .. }
        | Self::DuplicateMappingConflict { .. }
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  #[error("backend: {0}")]
  struct Wrapper(#[from] Error);

  #[test]
  fn find_in_walks_source_chain() {
    let wrapped = Wrapper(Error::AmbiguousTranslation {
      external_id: "serial-1".into(),
      service:     Service::Kodik,
      season:      Some(1),
    });
    let found = Error::find_in(&wrapped).expect("core error in chain");
    assert!(found.is_item_level());
  }

  #[test]
  fn unrelated_errors_are_not_classified() {
    let io = std::io::Error::other("disk on fire");
    assert!(Error::find_in(&io).is_none());
  }
}
