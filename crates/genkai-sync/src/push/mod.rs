//! Web push delivery of notifications.

pub mod encrypt;
pub mod vapid;

use std::time::Duration;

use futures::future::join_all;
use genkai_core::{
  notification::{Notification, PushContext, PushEndpoint},
  store::CatalogStore,
  task::TaskQueue,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::vapid::VapidSigner;
use crate::{Engine, Error, Result};

fn default_push_title() -> String { "Genkai - смотреть аниме онлайн".into() }
fn default_ttl() -> u32 { 86_400 }
fn default_push_timeout() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
  /// PKCS#8 PEM P-256 key. Empty disables delivery.
  #[serde(default)]
  pub private_key_pem:      String,
  /// VAPID `sub` claim, usually the frontend URL or a `mailto:` address.
  #[serde(default)]
  pub subject:              String,
  #[serde(default = "default_push_title")]
  pub title:                String,
  #[serde(default = "default_ttl")]
  pub ttl_secs:             u32,
  #[serde(default = "default_push_timeout")]
  pub request_timeout_secs: u64,
}

impl Default for PushConfig {
  fn default() -> Self {
    Self {
      private_key_pem:      String::new(),
      subject:              String::new(),
      title:                default_push_title(),
      ttl_secs:             default_ttl(),
      request_timeout_secs: default_push_timeout(),
    }
  }
}

/// The JSON document encrypted into each push message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
  pub title:        String,
  pub text:         String,
  pub url:          String,
  pub notification: Notification,
  pub unseen_count: u64,
}

impl PushMessage {
  pub fn render(ctx: &PushContext, title: &str) -> Result<Self> {
    Ok(Self {
      title:        title.to_owned(),
      text:         ctx.push_text()?,
      url:          ctx.push_url()?,
      notification: ctx.notification.clone(),
      unseen_count: ctx.unseen_count,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
  Delivered,
  /// The push service answered 410: the subscription no longer exists.
  Gone,
}

/// Per-delivery tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
  pub delivered: usize,
  pub pruned:    usize,
  pub failed:    usize,
}

/// Encrypts and posts push messages. Cheap to clone.
#[derive(Clone)]
pub struct PushSender {
  client: Client,
  signer: VapidSigner,
  title:  String,
  ttl:    u32,
}

impl PushSender {
  /// `Ok(None)` when no private key is configured.
  pub fn from_config(config: &PushConfig) -> Result<Option<Self>> {
    if config.private_key_pem.trim().is_empty() {
      return Ok(None);
    }
    let client = Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()
      .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
    let signer = VapidSigner::from_pem(&config.private_key_pem, config.subject.clone())?;
    Ok(Some(Self {
      client,
      signer,
      title: config.title.clone(),
      ttl: config.ttl_secs,
    }))
  }

  pub fn title(&self) -> &str { &self.title }

  /// Encrypt `payload` for `endpoint` and post it.
  pub async fn send(&self, endpoint: &PushEndpoint, payload: &[u8]) -> Result<PushOutcome> {
    let url = url::Url::parse(&endpoint.endpoint)
      .map_err(|e| Error::Encryption(format!("invalid endpoint url: {e}")))?;
    let token = self.signer.sign(&url.origin().ascii_serialization())?;

    let ua_public = encrypt::decode_key(&endpoint.keys.p256dh)?;
    let auth = encrypt::decode_key(&endpoint.keys.auth)?;
    let body = encrypt::encrypt(&ua_public, &auth, payload)?;

    let resp = self
      .client
      .post(url)
      .header("Authorization", format!("WebPush {token}"))
      .header("Crypto-Key", format!("p256ecdsa={}", self.signer.public_key()))
      .header("Content-Encoding", "aes128gcm")
      .header("Content-Type", "application/octet-stream")
      .header("TTL", self.ttl.to_string())
      .body(body)
      .send()
      .await
      .map_err(|source| Error::PushTransport {
        endpoint: endpoint.endpoint.clone(),
        source,
      })?;

    match resp.status() {
      StatusCode::GONE => Ok(PushOutcome::Gone),
      s if s.is_success() => Ok(PushOutcome::Delivered),
      s => Err(Error::PushStatus {
        endpoint: endpoint.endpoint.clone(),
        status:   s.as_u16(),
      }),
    }
  }
}

impl<S, Q> Engine<S, Q>
where
  S: CatalogStore,
  Q: TaskQueue,
{
  /// Push one notification to every endpoint of its user, concurrently.
  ///
  /// A missing notification is a no-op. Endpoints answering 410 are
  /// deleted; any other endpoint failure is logged and does not affect the
  /// others.
  pub async fn deliver(&self, notification_id: Uuid) -> Result<DeliveryReport> {
    let mut report = DeliveryReport::default();

    let ctx = self
      .store
      .push_context(notification_id)
      .await
      .map_err(Error::store)?;
    let Some(ctx) = ctx else {
      debug!(%notification_id, "notification no longer exists");
      return Ok(report);
    };

    let Some(pusher) = &self.pusher else {
      debug!(%notification_id, "push disabled, skipping delivery");
      return Ok(report);
    };

    let endpoints = self
      .store
      .list_push_endpoints(ctx.notification.user_id)
      .await
      .map_err(Error::store)?;
    if endpoints.is_empty() {
      return Ok(report);
    }

    let message = PushMessage::render(&ctx, pusher.title())?;
    let payload = serde_json::to_vec(&message).map_err(genkai_core::Error::from)?;

    let results = join_all(endpoints.iter().map(|ep| pusher.send(ep, &payload))).await;

    for (endpoint, result) in endpoints.iter().zip(results) {
      match result {
        Ok(PushOutcome::Delivered) => {
          debug!(%notification_id, endpoint_id = %endpoint.endpoint_id, "push delivered");
          report.delivered += 1;
        }
        Ok(PushOutcome::Gone) => {
          match self.store.delete_push_endpoint(endpoint.endpoint_id).await {
            Ok(_) => info!(
              user_id = %endpoint.user_id,
              endpoint_id = %endpoint.endpoint_id,
              "deleted unsubscribed push endpoint",
            ),
            Err(e) => warn!(
              endpoint_id = %endpoint.endpoint_id,
              error = %e,
              "failed to delete unsubscribed push endpoint",
            ),
          }
          report.pruned += 1;
        }
        Err(e) => {
          warn!(
            %notification_id,
            user_id = %endpoint.user_id,
            endpoint_id = %endpoint.endpoint_id,
            error = %e,
            "push delivery failed",
          );
          report.failed += 1;
        }
      }
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode as AxumStatus},
    routing::post,
  };
  use genkai_core::{
    catalog::TranslationKey,
    notification::{NewNotification, NewPushEndpoint, PushKeys},
    resolver::Service,
    title::NewTitle,
  };
  use genkai_store_sqlite::SqliteStore;
  use p256::{
    SecretKey,
    pkcs8::{EncodePrivateKey as _, LineEnding},
  };
  use rand_core::OsRng;

  use super::{encrypt::tests::UserAgent, *};
  use crate::{
    fetch::{CatalogFetcher, FeedConfig},
    testutil::{RecordingQueue, serve},
  };

  type Received = Arc<Mutex<Vec<(String, HeaderMap, Bytes)>>>;

  /// Push service stub: `/ok/*` accepts, `/gone/*` answers 410,
  /// `/broken/*` answers 500.
  async fn push_service() -> (String, Received) {
    let received: Received = Arc::default();

    async fn accept(
      State(received): State<Received>,
      Path((mode, id)): Path<(String, String)>,
      headers: HeaderMap,
      body: Bytes,
    ) -> AxumStatus {
      received.lock().unwrap().push((id, headers, body));
      match mode.as_str() {
        "ok" => AxumStatus::CREATED,
        "gone" => AxumStatus::GONE,
        _ => AxumStatus::INTERNAL_SERVER_ERROR,
      }
    }

    let router = Router::new()
      .route("/{mode}/{id}", post(accept))
      .with_state(received.clone());
    (serve(router).await, received)
  }

  fn push_config() -> PushConfig {
    let key = SecretKey::random(&mut OsRng);
    PushConfig {
      private_key_pem: key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
      subject: "https://genkai.example".into(),
      ..PushConfig::default()
    }
  }

  /// Store with one subscription notification for a new episode.
  async fn notified_user(store: &SqliteStore) -> (Uuid, Uuid) {
    let translator = store.create_translator("AniDub".into()).await.unwrap();
    let (title, _) = store
      .get_or_create_title(NewTitle {
        shikimori_id: Some(32182),
        season:       Some(1),
        name:         "Mob Psycho 100".into(),
        other_names:  Vec::new(),
        year:         None,
      })
      .await
      .unwrap();
    let (mut tr, _) = store
      .get_or_create_translation(
        TranslationKey {
          external_id: "serial-1".into(),
          service:     Service::Kodik,
          season:      Some(1),
        },
        None,
      )
      .await
      .unwrap();
    tr.title_id = Some(title.title_id);
    tr.translator_id = Some(translator.translator_id);
    let tr = store.save_translation(tr).await.unwrap();
    let (episode, _) = store
      .get_or_create_episode(tr.translation_id, 5, "//e5".into())
      .await
      .unwrap();

    let user = Uuid::new_v4();
    let created = store
      .create_notifications(vec![NewNotification::subscription(user, episode.episode_id)])
      .await
      .unwrap();
    (user, created[0].notification_id)
  }

  async fn add_endpoint(store: &SqliteStore, user: Uuid, url: String, ua: &UserAgent) -> Uuid {
    store
      .add_push_endpoint(NewPushEndpoint {
        user_id:  user,
        endpoint: url,
        keys:     PushKeys { p256dh: ua.p256dh(), auth: ua.auth_b64() },
        device:   None,
      })
      .await
      .unwrap()
      .endpoint_id
  }

  fn engine(store: SqliteStore, push: &PushConfig) -> Engine<SqliteStore, RecordingQueue> {
    let fetcher = CatalogFetcher::new(FeedConfig {
      api_url:              "http://127.0.0.1:9/list".into(),
      token:                String::new(),
      request_timeout_secs: 1,
    })
    .unwrap();
    let pusher = PushSender::from_config(push).unwrap();
    Engine::new(Arc::new(store), RecordingQueue::default(), fetcher, pusher)
  }

  #[tokio::test]
  async fn delivers_encrypted_message_with_vapid_headers() {
    let (base, received) = push_service().await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (user, notification_id) = notified_user(&store).await;
    let ua = UserAgent::new();
    add_endpoint(&store, user, format!("{base}/ok/a"), &ua).await;

    let engine = engine(store, &push_config());
    let report = engine.deliver(notification_id).await.unwrap();
    assert_eq!(report, DeliveryReport { delivered: 1, pruned: 0, failed: 0 });

    let received = received.lock().unwrap();
    let (_, headers, body) = &received[0];
    assert!(headers["authorization"].to_str().unwrap().starts_with("WebPush "));
    assert!(headers["crypto-key"].to_str().unwrap().starts_with("p256ecdsa="));
    assert_eq!(headers["content-encoding"], "aes128gcm");
    assert!(headers.contains_key("ttl"));

    let message: PushMessage = serde_json::from_slice(&ua.decrypt(body)).unwrap();
    assert_eq!(message.text, "Mob Psycho 100 - Добавлен 5-й эпизод");
    assert_eq!(message.url, "/title/mob-psycho-100/");
    assert_eq!(message.notification.notification_id, notification_id);
    assert_eq!(message.unseen_count, 1);
  }

  #[tokio::test]
  async fn gone_endpoint_is_pruned_and_others_still_receive() {
    let (base, received) = push_service().await;
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (user, notification_id) = notified_user(&store).await;
    let ua = UserAgent::new();
    let gone = add_endpoint(&store, user, format!("{base}/gone/a"), &ua).await;
    let ok = add_endpoint(&store, user, format!("{base}/ok/b"), &ua).await;
    add_endpoint(&store, user, format!("{base}/broken/c"), &ua).await;

    let engine = engine(store.clone(), &push_config());
    let report = engine.deliver(notification_id).await.unwrap();
    assert_eq!(report, DeliveryReport { delivered: 1, pruned: 1, failed: 1 });
    assert_eq!(received.lock().unwrap().len(), 3);

    let left: Vec<Uuid> = store
      .list_push_endpoints(user)
      .await
      .unwrap()
      .into_iter()
      .map(|e| e.endpoint_id)
      .collect();
    assert!(!left.contains(&gone));
    assert!(left.contains(&ok));
    assert_eq!(left.len(), 2);
  }

  #[tokio::test]
  async fn missing_notification_is_a_no_op() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(store, &push_config());
    let report = engine.deliver(Uuid::new_v4()).await.unwrap();
    assert_eq!(report, DeliveryReport::default());
  }

  #[tokio::test]
  async fn disabled_push_skips_delivery() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (_, notification_id) = notified_user(&store).await;
    let engine = engine(store, &PushConfig::default());
    assert_eq!(engine.deliver(notification_id).await.unwrap(), DeliveryReport::default());
  }
}
