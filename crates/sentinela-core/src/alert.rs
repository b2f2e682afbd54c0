//! Alert types. An alert is a flood report pinned to a location and owned
//! by an identity.
//!
//! The persisted [`Alert`] row carries no evidence. Evidence references live
//! in their own table and are joined into an [`AlertView`] at read time.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, geo::GeoPoint};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The persisted lifecycle status of an alert.
///
/// `Active` on disk does not imply active for display: see
/// [`crate::lifecycle::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
  Active,
  Expired,
  Resolved,
}

impl AlertStatus {
  pub const ALL: [Self; 3] = [Self::Active, Self::Expired, Self::Resolved];

  /// The discriminant stored in the `status` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "ACTIVE",
      Self::Expired => "EXPIRED",
      Self::Resolved => "RESOLVED",
    }
  }
}

impl fmt::Display for AlertStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AlertStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| Error::Validation(format!("unknown alert status: {s:?}")))
  }
}

// ─── Alert ───────────────────────────────────────────────────────────────────

/// A flood report as persisted by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
  pub alert_id:     Uuid,
  pub identity_id:  Uuid,
  pub location:     GeoPoint,
  pub address:      String,
  pub neighborhood: Option<String>,
  pub status:       AlertStatus,
  pub note:         Option<String>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
  /// Set if and only if `status == Resolved`.
  pub resolved_at:  Option<DateTime<Utc>>,
}

impl Alert {
  /// Check the structural invariants a persisted row must satisfy.
  pub fn validate(&self) -> Result<(), Error> {
    if !self.location.is_valid() {
      return Err(Error::Validation(format!(
        "alert {} has invalid coordinates",
        self.alert_id
      )));
    }
    match (self.status, self.resolved_at) {
      (AlertStatus::Resolved, None) => Err(Error::Validation(format!(
        "alert {} is resolved without a resolution time",
        self.alert_id
      ))),
      (AlertStatus::Active | AlertStatus::Expired, Some(_)) => {
        Err(Error::Validation(format!(
          "alert {} carries a resolution time but is {}",
          self.alert_id, self.status
        )))
      }
      _ => Ok(()),
    }
  }
}

// ─── Evidence ────────────────────────────────────────────────────────────────

/// A durable reference to a photo attached to an alert. No image bytes are
/// ever stored by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
  pub evidence_id: Uuid,
  pub alert_id:    Uuid,
  /// URL or opaque id returned by the upload collaborator.
  pub reference:   String,
  /// Zero-based order within the alert.
  pub position:    u32,
  pub created_at:  DateTime<Utc>,
}

/// Raw photo bytes handed to the upload collaborator.
#[derive(Clone)]
pub struct PhotoUpload {
  pub media_type: String,
  pub data:       Vec<u8>,
}

impl fmt::Debug for PhotoUpload {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PhotoUpload")
      .field("media_type", &self.media_type)
      .field("len", &self.data.len())
      .finish()
  }
}

// ─── NewAlert ────────────────────────────────────────────────────────────────

/// Input to `LifecycleManager::create`. Timestamps and status are always set
/// by the lifecycle manager.
#[derive(Debug, Clone)]
pub struct NewAlert {
  pub identity_id:  Uuid,
  pub location:     GeoPoint,
  pub address:      String,
  pub neighborhood: Option<String>,
  pub note:         Option<String>,
  /// At least one photo is required by policy.
  pub photos:       Vec<PhotoUpload>,
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// An alert joined with its evidence, with lazy expiry already applied;
/// never stored, always derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertView {
  pub alert:    Alert,
  pub evidence: Vec<Evidence>,
}

impl AlertView {
  /// Evidence references in display order.
  pub fn references(&self) -> impl Iterator<Item = &str> {
    self.evidence.iter().map(|e| e.reference.as_str())
  }
}
