//! Subscriptions, notifications and push endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Subscription ────────────────────────────────────────────────────────────

/// A user's interest in one translator's releases of one title.
/// Unique per `(user_id, title_id, translator_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub user_id:       Uuid,
  pub title_id:      Uuid,
  pub translator_id: Uuid,
  pub created_at:    DateTime<Utc>,
}

// ─── Notification ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
  /// A new episode of a subscribed `(title, translator)` pair.
  Subscription,
}

impl NotificationType {
  /// The integer code stored in the `notification_type` column.
  pub fn code(&self) -> i64 {
    match self {
      Self::Subscription => 1,
    }
  }

  /// Decode a stored type code.
  ///
  /// A code with no variant (and therefore no push templates) yields
  /// [`Error::UnknownNotificationType`].
  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      1 => Ok(Self::Subscription),
      other => Err(Error::UnknownNotificationType(other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id:   Uuid,
  pub user_id:           Uuid,
  #[serde(rename = "type")]
  pub notification_type: NotificationType,
  pub episode_id:        Option<Uuid>,
  pub seen:              bool,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::CatalogStore::create_notifications`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub user_id:           Uuid,
  pub notification_type: NotificationType,
  pub episode_id:        Option<Uuid>,
}

impl NewNotification {
  pub fn subscription(user_id: Uuid, episode_id: Uuid) -> Self {
    Self {
      user_id,
      notification_type: NotificationType::Subscription,
      episode_id: Some(episode_id),
    }
  }
}

// ─── Push rendering ──────────────────────────────────────────────────────────

/// The episode a subscription notification talks about, joined with its
/// title for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSubject {
  pub title_name:     String,
  pub title_slug:     String,
  pub episode_number: u32,
}

/// Everything needed to render one notification as a push message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushContext {
  pub notification: Notification,
  pub subject:      Option<EpisodeSubject>,
  pub unseen_count: u64,
}

impl PushContext {
  fn episode_subject(&self) -> Result<&EpisodeSubject> {
    self
      .subject
      .as_ref()
      .ok_or(Error::NotificationRelatedMissing(self.notification.notification_id))
  }

  /// Human-readable push body.
  pub fn push_text(&self) -> Result<String> {
    match self.notification.notification_type {
      NotificationType::Subscription => {
        let s = self.episode_subject()?;
        Ok(format!(
          "{} - Добавлен {}-й эпизод",
          s.title_name, s.episode_number
        ))
      }
    }
  }

  /// Frontend-relative URL the push message links to.
  pub fn push_url(&self) -> Result<String> {
    match self.notification.notification_type {
      NotificationType::Subscription => {
        let s = self.episode_subject()?;
        Ok(format!("/title/{}/", s.title_slug))
      }
    }
  }
}

// ─── Push endpoints ──────────────────────────────────────────────────────────

/// Client keys from a browser `PushSubscription`, base64url-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
  /// The user agent's P-256 ECDH public key (uncompressed point).
  pub p256dh: String,
  /// The 16-byte authentication secret.
  pub auth:   String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEndpoint {
  pub endpoint_id: Uuid,
  pub user_id:     Uuid,
  pub endpoint:    String,
  pub keys:        PushKeys,
  pub device:      Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::CatalogStore::add_push_endpoint`].
#[derive(Debug, Clone)]
pub struct NewPushEndpoint {
  pub user_id:  Uuid,
  pub endpoint: String,
  pub keys:     PushKeys,
  pub device:   Option<String>,
}
