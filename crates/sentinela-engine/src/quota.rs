//! Ceiling on concurrently-active alerts per identity.
//!
//! The count and the subsequent insert are separate store round trips, so
//! two simultaneous submissions from one identity can both pass and leave it
//! one alert over the ceiling. That window is accepted.

use std::sync::Arc;

use sentinela_core::{
  Error, Result,
  alert::AlertStatus,
  clock::Clock,
  lifecycle,
  store::{AlertQuery, AlertStore},
};
use uuid::Uuid;

pub struct QuotaEnforcer<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  limit: usize,
}

impl<S: AlertStore> QuotaEnforcer<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, limit: usize) -> Self {
    Self { store, clock, limit }
  }

  pub fn limit(&self) -> usize { self.limit }

  /// Alerts owned by `identity_id` that are active once lazy expiry is
  /// taken into account.
  pub async fn active_count(&self, identity_id: Uuid) -> Result<usize> {
    let now = self.clock.now();
    let alerts = self
      .store
      .list_alerts(AlertQuery::owned_by(identity_id).with_status(AlertStatus::Active))
      .await
      .map_err(Error::persistence)?;
    Ok(
      alerts
        .iter()
        .filter(|a| lifecycle::is_effectively_active(a, now))
        .count(),
    )
  }

  /// Fail with [`Error::QuotaExceeded`] if the identity is at the ceiling.
  /// Nothing is held between this call and the caller's insert.
  pub async fn check_and_reserve(&self, identity_id: Uuid) -> Result<()> {
    let active = self.active_count(identity_id).await?;
    if active >= self.limit {
      tracing::info!(%identity_id, active, limit = self.limit, "quota exceeded");
      return Err(Error::QuotaExceeded { identity_id, limit: self.limit });
    }
    Ok(())
  }
}
