//! The catalog fetcher: paginated access to the Kodik listing API.

use std::time::Duration;

use genkai_core::catalog::ContentKind;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
  Error, Result,
  feed::RawPage,
  profile::KindProfile,
};

/// Page size for regular runs.
pub const PAGE_LIMIT: u32 = 100;
/// Page size in preview mode.
pub const PREVIEW_PAGE_LIMIT: u32 = 10;

fn default_request_timeout() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Listing endpoint, e.g. `https://kodikapi.com/list`.
  pub api_url:              String,
  #[serde(default)]
  pub token:                String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

/// One decoded page.
#[derive(Debug, Clone)]
pub struct Page {
  pub items:      Vec<Value>,
  /// Opaque continuation: the next page's URL.
  pub next_token: Option<String>,
}

/// Stateless HTTP access to the listing. Cheap to clone.
#[derive(Clone)]
pub struct CatalogFetcher {
  client: Client,
  config: FeedConfig,
}

impl CatalogFetcher {
  pub fn new(config: FeedConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()
      .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  /// Fetch the first page of `kind` (no token) or the page behind `token`.
  pub async fn fetch(
    &self,
    kind: ContentKind,
    token: Option<&str>,
    preview: bool,
  ) -> Result<Page> {
    let request = match token {
      Some(next) => self.client.post(next),
      None => {
        let profile = KindProfile::for_kind(kind);
        let limit = if preview { PREVIEW_PAGE_LIMIT } else { PAGE_LIMIT };
        let mut form: Vec<(&str, String)> = vec![("token", self.config.token.clone())];
        form.extend(profile.feed_types.iter().map(|t| ("types", (*t).to_owned())));
        form.extend([
          ("sort", "updated_at".to_owned()),
          ("with_seasons", "1".to_owned()),
          ("with_episodes", "1".to_owned()),
          ("with_material_data", "1".to_owned()),
          ("limit", limit.to_string()),
        ]);
        self.client.post(&self.config.api_url).form(&form)
      }
    };
    let url = token.unwrap_or(&self.config.api_url).to_owned();

    let resp = request.send().await.map_err(|source| Error::Fetch {
      url: url.clone(),
      source,
    })?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::FetchStatus { url, status: status.as_u16() });
    }

    let page: RawPage = resp.json().await.map_err(|source| Error::Fetch {
      url: url.clone(),
      source,
    })?;

    info!(%kind, %url, items = page.results.len(), "fetched feed page");

    Ok(Page {
      items:      page.results,
      next_token: page.next_page.filter(|next| !next.trim().is_empty()),
    })
  }

  /// Lazily walk every page of `kind`. Preview mode stops after the first.
  pub fn pages(&self, kind: ContentKind, preview: bool) -> PageCursor<'_> {
    PageCursor {
      fetcher: self,
      kind,
      preview,
      state: CursorState::Start,
    }
  }
}

enum CursorState {
  Start,
  Next(String),
  Done,
}

/// A lazy page sequence. An error ends the sequence.
pub struct PageCursor<'a> {
  fetcher: &'a CatalogFetcher,
  kind:    ContentKind,
  preview: bool,
  state:   CursorState,
}

impl PageCursor<'_> {
  pub async fn next_page(&mut self) -> Result<Option<Page>> {
    let token = match std::mem::replace(&mut self.state, CursorState::Done) {
      CursorState::Done => return Ok(None),
      CursorState::Start => None,
      CursorState::Next(token) => Some(token),
    };

    let page = self
      .fetcher
      .fetch(self.kind, token.as_deref(), self.preview)
      .await?;

    match &page.next_token {
      Some(next) if !self.preview => self.state = CursorState::Next(next.clone()),
      Some(_) => debug!(kind = %self.kind, "preview mode, not following next page"),
      None => {}
    }
    Ok(Some(page))
  }
}
