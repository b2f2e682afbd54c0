//! The `AlertStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `sentinela-store-sqlite`, or [`crate::memory::MemoryStore`] in tests).
//! The engine treats it as a remote store: every call is a request/response
//! round trip, and nothing is shared in memory between callers.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  alert::{Alert, AlertStatus, Evidence},
  changes::ChangeFeed,
  identity::Identity,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`AlertStore::list_alerts`]. The persisted status is
/// matched, not the effective one; callers apply lazy expiry afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertQuery {
  pub identity_id: Option<Uuid>,
  pub status:      Option<AlertStatus>,
}

impl AlertQuery {
  pub fn all() -> Self { Self::default() }

  pub fn owned_by(identity_id: Uuid) -> Self {
    Self { identity_id: Some(identity_id), status: None }
  }

  pub fn with_status(mut self, status: AlertStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn matches(&self, alert: &Alert) -> bool {
    self.identity_id.is_none_or(|id| alert.identity_id == id)
      && self.status.is_none_or(|s| alert.status == s)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the persistent store backing alerts, evidence and
/// identities.
///
/// Every successful alert or evidence write must fire the matching
/// [`ChangeEvent`](crate::changes::ChangeEvent) on [`AlertStore::changes`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AlertStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Alerts ────────────────────────────────────────────────────────────

  /// Persist a new alert row. Fails if the id is already taken.
  fn insert_alert(
    &self,
    alert: Alert,
  ) -> impl Future<Output = Result<Alert, Self::Error>> + Send + '_;

  /// Overwrite an existing alert row. Returns `None` if it does not exist.
  fn update_alert(
    &self,
    alert: Alert,
  ) -> impl Future<Output = Result<Option<Alert>, Self::Error>> + Send + '_;

  /// Write only the lifecycle columns of `alert`: status, `expires_at`,
  /// `resolved_at` and `updated_at`. Everything else in the stored row is
  /// kept. Returns the row as stored, or `None` if it does not exist.
  fn update_alert_lifecycle(
    &self,
    alert: Alert,
  ) -> impl Future<Output = Result<Option<Alert>, Self::Error>> + Send + '_;

  /// Persist an observed expiry: set EXPIRED and `updated_at`, but only if
  /// the stored row is still ACTIVE with exactly `expires_at`. Returns the
  /// updated row, or `None` if the row has since moved on or is gone.
  fn expire_alert(
    &self,
    id: Uuid,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Alert>, Self::Error>> + Send + '_;

  /// Replace the note and set `updated_at`, leaving every other column
  /// alone. Returns the row as stored, or `None` if it does not exist.
  fn set_alert_note(
    &self,
    id: Uuid,
    note: Option<String>,
    updated_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Alert>, Self::Error>> + Send + '_;

  /// Administrative delete; evidence rows go with the alert. Returns `false`
  /// if nothing was deleted.
  fn delete_alert(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_alert(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Alert>, Self::Error>> + Send + '_;

  /// List alerts matching `query`, newest first.
  fn list_alerts(
    &self,
    query: AlertQuery,
  ) -> impl Future<Output = Result<Vec<Alert>, Self::Error>> + Send + '_;

  // ── Evidence ──────────────────────────────────────────────────────────

  fn insert_evidence(
    &self,
    evidence: Evidence,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  /// List evidence for one alert, or for every alert when `alert_id` is
  /// `None`. Ordered by alert, then position.
  fn list_evidence(
    &self,
    alert_id: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Evidence>, Self::Error>> + Send + '_;

  // ── Identities ────────────────────────────────────────────────────────

  /// Persist a new identity. Fails if the contact or token is already taken.
  fn insert_identity(
    &self,
    identity: Identity,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  /// Overwrite an existing identity. Returns `None` if it does not exist.
  fn update_identity(
    &self,
    identity: Identity,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Administrative delete; the identity's alerts go with it.
  fn delete_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Look up by canonical contact identifier.
  fn find_identity_by_contact(
    &self,
    contact: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Look up by token. Matching is case-insensitive.
  fn find_identity_by_token(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn list_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  // ── Change events ─────────────────────────────────────────────────────

  /// The feed this store fires on alert and evidence writes.
  fn changes(&self) -> &ChangeFeed;
}
