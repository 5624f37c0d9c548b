//! External-id resolution.
//!
//! The feed assigns its own identifiers to translators, translations and
//! title-like objects. A [`ResolverMapping`] pins one of those identifiers,
//! scoped by service and entity kind, to an internal primary key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An external catalog service the engine ingests from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Service {
  Kodik,
}

/// The internal entity an external id resolves to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Translator,
  Translation,
  Title,
}

/// Unique on `(service, entity_kind, external_id)`. Never deleted; re-binding
/// overwrites `internal_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverMapping {
  pub service:     Service,
  pub entity_kind: EntityKind,
  pub external_id: String,
  pub internal_id: Uuid,
}
