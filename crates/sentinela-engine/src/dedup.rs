//! Advisory duplicate detection: a recent open alert from the same identity
//! close to the new location. A match is reported, never enforced.

use std::sync::Arc;

use chrono::Duration;
use sentinela_core::{
  Error, Result,
  alert::{Alert, AlertStatus},
  clock::Clock,
  geo::{DistanceModel, GeoPoint},
  lifecycle,
  policy::Policy,
  store::{AlertQuery, AlertStore},
};
use uuid::Uuid;

pub struct DedupGuard<S> {
  store:  Arc<S>,
  clock:  Arc<dyn Clock>,
  window: Duration,
  radius: f64,
  model:  DistanceModel,
}

impl<S: AlertStore> DedupGuard<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, policy: &Policy) -> Self {
    Self {
      store,
      clock,
      window: policy.dedup_window(),
      radius: policy.dedup_radius_meters,
      model: policy.distance_model,
    }
  }

  /// The newest effectively-active alert owned by `identity_id`, created
  /// inside the window, strictly closer than the radius to `location`.
  pub async fn find_nearby_open_alert(
    &self,
    identity_id: Uuid,
    location: GeoPoint,
  ) -> Result<Option<Alert>> {
    let now = self.clock.now();
    let since = now - self.window;
    let candidates = self
      .store
      .list_alerts(AlertQuery::owned_by(identity_id).with_status(AlertStatus::Active))
      .await
      .map_err(Error::persistence)?;

    let hit = candidates.into_iter().find(|a| {
      lifecycle::is_effectively_active(a, now)
        && a.created_at >= since
        && self.model.meters(a.location, location) < self.radius
    });
    if let Some(a) = &hit {
      tracing::debug!(%identity_id, duplicate_of = %a.alert_id, "nearby open alert");
    }
    Ok(hit)
  }
}
