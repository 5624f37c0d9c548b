//! Error type for `genkai-sync`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A feed page could not be fetched or decoded. Stops the page loop.
  #[error("fetching {url} failed: {source}")]
  Fetch {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("fetching {url} returned status {status}")]
  FetchStatus { url: String, status: u16 },

  #[error(transparent)]
  Core(#[from] genkai_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("task queue error: {0}")]
  Queue(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("vapid signing failed: {0}")]
  Vapid(#[from] jsonwebtoken::errors::Error),

  #[error("push encryption failed: {0}")]
  Encryption(String),

  #[error("push to {endpoint} failed: {source}")]
  PushTransport {
    endpoint: String,
    #[source]
    source:   reqwest::Error,
  },

  #[error("push to {endpoint} returned status {status}")]
  PushStatus { endpoint: String, status: u16 },

  #[error("configuration error: {0}")]
  Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn queue<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Queue(Box::new(err))
  }

  /// The core error behind this one, if any, including core errors raised
  /// inside a store backend.
  pub fn core(&self) -> Option<&genkai_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      Self::Store(e) => genkai_core::Error::find_in(e.as_ref()),
      _ => None,
    }
  }

  /// Whether the error only invalidates the feed item being reconciled.
  pub fn is_item_level(&self) -> bool {
    self.core().is_some_and(genkai_core::Error::is_item_level)
  }
}
