//! Error type for `genkai-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] genkai_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column holds a value no variant maps to.
  #[error("unknown {column} value: {value:?}")]
  UnknownCode { column: &'static str, value: String },

  #[error("title not found: {0}")]
  TitleNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
