//! The `CatalogStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `genkai-store-sqlite`).
//! The sync engine and the server depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  catalog::{ContentKind, Episode, Translation, TranslationKey, Translator},
  notification::{
    NewNotification, NewPushEndpoint, Notification, PushContext, PushEndpoint,
    Subscription,
  },
  resolver::{EntityKind, ResolverMapping, Service},
  title::{NewTitle, Title, TitleMetadata},
  update::{NewUpdateRun, UpdateRun},
};

/// Abstraction over a Genkai catalog store backend.
///
/// Every `get_or_create_*` method must be safe under concurrent callers: it
/// relies on the backend's unique constraints (or an equivalent transactional
/// upsert) so that racing callers observe the same row rather than creating
/// duplicates. The returned `bool` is `true` only for the caller whose call
/// actually created the row.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Resolver ──────────────────────────────────────────────────────────

  /// Look up the internal id bound to an external id.
  ///
  /// Fails with [`crate::Error::DuplicateMappingConflict`] if more than one
  /// mapping is found for the key.
  fn resolve(
    &self,
    service: Service,
    entity_kind: EntityKind,
    external_id: String,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// Upsert a mapping; an existing mapping for the key is re-pointed.
  fn bind(
    &self,
    service: Service,
    entity_kind: EntityKind,
    external_id: String,
    internal_id: Uuid,
  ) -> impl Future<Output = Result<ResolverMapping, Self::Error>> + Send + '_;

  // ── Translators ───────────────────────────────────────────────────────

  fn create_translator(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Translator, Self::Error>> + Send + '_;

  fn get_translator(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Translator>, Self::Error>> + Send + '_;

  // ── Translations ──────────────────────────────────────────────────────

  /// Get or create a translation by `(external_id, service, season)`.
  /// `url` is only used when creating.
  ///
  /// Fails with [`crate::Error::AmbiguousTranslation`] if more than one row
  /// matches the key.
  fn get_or_create_translation(
    &self,
    key: TranslationKey,
    url: Option<String>,
  ) -> impl Future<Output = Result<(Translation, bool), Self::Error>> + Send + '_;

  /// Persist the title and translator links of a translation.
  fn save_translation(
    &self,
    translation: Translation,
  ) -> impl Future<Output = Result<Translation, Self::Error>> + Send + '_;

  // ── Titles ────────────────────────────────────────────────────────────

  /// Get or create a title by `(shikimori_id, season)`, or by
  /// `(lowercased name, season)` when `shikimori_id` is `None`.
  fn get_or_create_title(
    &self,
    input: NewTitle,
  ) -> impl Future<Output = Result<(Title, bool), Self::Error>> + Send + '_;

  fn get_title(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Title>, Self::Error>> + Send + '_;

  /// Merge descriptive metadata into a title. Tags are get-or-created by
  /// case-insensitive name within their kind.
  fn apply_title_metadata(
    &self,
    title_id: Uuid,
    metadata: TitleMetadata,
  ) -> impl Future<Output = Result<Title, Self::Error>> + Send + '_;

  // ── Episodes ──────────────────────────────────────────────────────────

  /// Get or create an episode by `(translation_id, number)`.
  /// `url` is only used when creating.
  fn get_or_create_episode(
    &self,
    translation_id: Uuid,
    number: u32,
    url: String,
  ) -> impl Future<Output = Result<(Episode, bool), Self::Error>> + Send + '_;

  fn get_episode(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Episode>, Self::Error>> + Send + '_;

  // ── Update ledger ─────────────────────────────────────────────────────

  /// Append one run to the ledger.
  fn record_update(
    &self,
    input: NewUpdateRun,
  ) -> impl Future<Output = Result<UpdateRun, Self::Error>> + Send + '_;

  fn get_update(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<UpdateRun>, Self::Error>> + Send + '_;

  /// Most recent runs first.
  fn list_updates(
    &self,
    kind: Option<ContentKind>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<UpdateRun>, Self::Error>> + Send + '_;

  // ── Subscriptions ─────────────────────────────────────────────────────

  fn add_subscription(
    &self,
    user_id: Uuid,
    title_id: Uuid,
    translator_id: Uuid,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;

  /// Users subscribed to the `(title, translator)` pair of the episode's
  /// translation. Empty when either side of the pair is unresolved.
  fn subscribers_for_episode(
    &self,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Insert a batch of notifications in one transaction.
  ///
  /// Inputs that duplicate an existing `(user, type, episode)` notification
  /// are skipped; only newly inserted rows are returned.
  fn create_notifications(
    &self,
    input: Vec<NewNotification>,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn get_notification(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Load a notification together with what its push templates need.
  /// Returns `None` if the notification no longer exists.
  fn push_context(
    &self,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<Option<PushContext>, Self::Error>> + Send + '_;

  // ── Push endpoints ────────────────────────────────────────────────────

  fn add_push_endpoint(
    &self,
    input: NewPushEndpoint,
  ) -> impl Future<Output = Result<PushEndpoint, Self::Error>> + Send + '_;

  fn list_push_endpoints(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PushEndpoint>, Self::Error>> + Send + '_;

  /// Returns `false` if the endpoint was already gone.
  fn delete_push_endpoint(
    &self,
    endpoint_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Admission counters ────────────────────────────────────────────────

  /// Atomically increment the named counter and return its new value.
  fn admission_increment(
    &self,
    key: String,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Reset the named counter to zero.
  fn admission_clear(
    &self,
    key: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Reset every counter. Called at process start, when no run can be in
  /// flight.
  fn admission_clear_all(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
