//! Error types for `sentinela-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{alert::AlertStatus, lifecycle::Transition};

#[derive(Debug, Error)]
pub enum Error {
  /// A required field is missing or malformed (e.g. no evidence attached).
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("location ({lat}, {lng}) is outside the service area")]
  OutOfBounds { lat: f64, lng: f64 },

  #[error("identity {identity_id} already has {limit} active alerts")]
  QuotaExceeded { identity_id: Uuid, limit: usize },

  #[error("alert not found: {0}")]
  AlertNotFound(Uuid),

  #[error("identity not found: {0}")]
  IdentityNotFound(Uuid),

  #[error("no identity is registered for this token")]
  UnknownToken,

  #[error("cannot {transition} an alert that is {from}")]
  InvalidTransition {
    from:       AlertStatus,
    transition: Transition,
  },

  /// A background refresh failed; the view degrades to stale.
  #[error("sync failed: {0}")]
  TransientSync(String),

  /// A write or read at the backing store failed.
  #[error("persistence error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error into [`Error::Persistence`].
  pub fn persistence<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(e))
  }

  /// `true` for the class of errors that reject a request before any state
  /// is mutated.
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      Self::Validation(_) | Self::OutOfBounds { .. } | Self::QuotaExceeded { .. }
    )
  }

  /// `true` for unknown ids and unknown tokens.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::AlertNotFound(_) | Self::IdentityNotFound(_) | Self::UnknownToken
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
