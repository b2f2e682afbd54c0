//! The lifecycle manager: creation, explicit transitions, and the read
//! paths that observe expiry.
//!
//! Every read applies lazy expiry first and writes any newly-expired rows
//! back on a best-effort basis; a failed write-back is logged and the read
//! still reports the expired status. A write-back only lands if the row is
//! still ACTIVE with the expiry that was read, so it never undoes a renewal
//! or resolution that got there first. Transitions start from the observed
//! status, so resolving an overdue alert fails the same way resolving a
//! persisted EXPIRED one does.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentinela_core::{
  Error, Result,
  alert::{Alert, AlertStatus, AlertView, Evidence, NewAlert, PhotoUpload},
  clock::Clock,
  geo::GeoPoint,
  lifecycle::{self, Transition},
  policy::Policy,
  store::{AlertQuery, AlertStore},
  upload::EvidenceUploader,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  quota::QuotaEnforcer,
  view::{self, AlertFilter, AlertStats, Listing},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// A photo that could not be attached after the alert was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceFailure {
  pub position: u32,
  pub reason:   String,
}

/// The result of [`LifecycleManager::create`]. The alert exists even when
/// `evidence_failures` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Created {
  pub view:              AlertView,
  pub evidence_failures: Vec<EvidenceFailure>,
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Checks that need no store access: service area, address, and evidence
/// count. Run before anything is written.
pub fn validate_submission(
  location: GeoPoint,
  address: &str,
  photos: &[PhotoUpload],
  policy: &Policy,
) -> Result<()> {
  if !location.is_valid() || !policy.bounds.contains(location) {
    return Err(Error::OutOfBounds { lat: location.lat, lng: location.lng });
  }
  if address.trim().is_empty() {
    return Err(Error::Validation("address is required".into()));
  }
  if photos.is_empty() {
    return Err(Error::Validation("at least one photo is required".into()));
  }
  if photos.len() > policy.max_photos {
    return Err(Error::Validation(format!(
      "at most {} photos are accepted, got {}",
      policy.max_photos,
      photos.len()
    )));
  }
  if let Some(i) = photos.iter().position(|p| p.data.is_empty()) {
    return Err(Error::Validation(format!("photo {i} is empty")));
  }
  Ok(())
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct LifecycleManager<S, U> {
  store:    Arc<S>,
  uploader: Arc<U>,
  clock:    Arc<dyn Clock>,
  policy:   Policy,
  quota:    QuotaEnforcer<S>,
}

impl<S, U> LifecycleManager<S, U>
where
  S: AlertStore,
  U: EvidenceUploader,
{
  pub fn new(store: Arc<S>, uploader: Arc<U>, clock: Arc<dyn Clock>, policy: Policy) -> Self {
    let quota = QuotaEnforcer::new(store.clone(), clock.clone(), policy.max_active_per_identity);
    Self { store, uploader, clock, policy, quota }
  }

  pub fn quota(&self) -> &QuotaEnforcer<S> { &self.quota }

  pub fn policy(&self) -> &Policy { &self.policy }

  // ── Create ────────────────────────────────────────────────────────────────

  /// Validate, check the quota, persist, then upload and attach evidence.
  ///
  /// Rejections happen before the insert. Once the alert row exists, photo
  /// failures are collected into [`Created::evidence_failures`] and the
  /// alert is kept.
  pub async fn create(&self, input: NewAlert) -> Result<Created> {
    validate_submission(input.location, &input.address, &input.photos, &self.policy)?;

    let owner = self
      .store
      .get_identity(input.identity_id)
      .await
      .map_err(Error::persistence)?;
    if owner.is_none() {
      return Err(Error::IdentityNotFound(input.identity_id));
    }
    self.quota.check_and_reserve(input.identity_id).await?;

    let alert = lifecycle::open(&input, self.clock.now(), self.policy.alert_ttl());
    let alert = self
      .store
      .insert_alert(alert)
      .await
      .map_err(Error::persistence)?;
    tracing::info!(
      alert_id = %alert.alert_id,
      identity_id = %alert.identity_id,
      photos = input.photos.len(),
      "alert created"
    );

    let (evidence, evidence_failures) = self.attach_evidence(alert.alert_id, input.photos).await;
    Ok(Created { view: AlertView { alert, evidence }, evidence_failures })
  }

  async fn attach_evidence(
    &self,
    alert_id: Uuid,
    photos: Vec<PhotoUpload>,
  ) -> (Vec<Evidence>, Vec<EvidenceFailure>) {
    let mut attached = Vec::with_capacity(photos.len());
    let mut failures = Vec::new();

    for (position, photo) in (0u32..).zip(photos) {
      let reference = match self.uploader.upload(alert_id, position, photo).await {
        Ok(r) => r,
        Err(e) => {
          tracing::warn!(%alert_id, position, error = %e, "evidence upload failed");
          failures.push(EvidenceFailure { position, reason: e.to_string() });
          continue;
        }
      };
      let evidence = Evidence {
        evidence_id: Uuid::new_v4(),
        alert_id,
        reference,
        position,
        created_at: self.clock.now(),
      };
      match self.store.insert_evidence(evidence).await {
        Ok(e) => attached.push(e),
        Err(e) => {
          tracing::warn!(%alert_id, position, error = %e, "evidence insert failed");
          failures.push(EvidenceFailure { position, reason: e.to_string() });
        }
      }
    }
    (attached, failures)
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Resolve an alert. Resolving a RESOLVED alert returns it unchanged.
  pub async fn resolve(&self, id: Uuid) -> Result<AlertView> {
    self.transition(id, Transition::Resolve).await
  }

  /// Reactivate from any status, restarting the lifetime from now. The
  /// quota is not re-checked.
  pub async fn renew(&self, id: Uuid) -> Result<AlertView> {
    self.transition(id, Transition::Renew).await
  }

  async fn transition(&self, id: Uuid, transition: Transition) -> Result<AlertView> {
    let mut alert = self.load(id).await?;
    let now = self.clock.now();
    let expired = lifecycle::expire_if_due(&mut alert, now);

    let outcome = match lifecycle::apply(&mut alert, transition, now, self.policy.alert_ttl()) {
      Ok(outcome) => outcome,
      Err(e) => {
        if expired {
          self.write_back(alert, now).await;
        }
        return Err(e);
      }
    };

    let alert = if outcome.is_changed() || expired {
      let alert = self.save(alert).await?;
      tracing::info!(alert_id = %id, %transition, status = %alert.status, "alert transitioned");
      alert
    } else {
      alert
    };
    self.view(alert).await
  }

  /// Replace the free-text note. A blank note clears it. Status is left
  /// alone.
  pub async fn update_note(&self, id: Uuid, note: Option<String>) -> Result<AlertView> {
    let note = note
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .map(str::to_owned);
    let now = self.clock.now();
    let mut alert = self
      .store
      .set_alert_note(id, note, now)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::AlertNotFound(id))?;
    tracing::debug!(alert_id = %id, "note updated");

    if lifecycle::expire_if_due(&mut alert, now) {
      alert = self.write_back(alert, now).await;
    }
    self.view(alert).await
  }

  /// Persist EXPIRED for every overdue ACTIVE row. Returns how many changed.
  pub async fn sweep_expired(&self) -> Result<usize> {
    let now = self.clock.now();
    let active = self
      .store
      .list_alerts(AlertQuery::all().with_status(AlertStatus::Active))
      .await
      .map_err(Error::persistence)?;

    let mut swept = 0;
    for mut alert in active {
      if !lifecycle::expire_if_due(&mut alert, now) {
        continue;
      }
      let expired = self
        .store
        .expire_alert(alert.alert_id, alert.expires_at, alert.updated_at)
        .await
        .map_err(Error::persistence)?;
      if expired.is_some() {
        swept += 1;
      }
    }
    if swept > 0 {
      tracing::info!(swept, "expired overdue alerts");
    }
    Ok(swept)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn get_view(&self, id: Uuid) -> Result<AlertView> {
    let mut alert = self.load(id).await?;
    let now = self.clock.now();
    if lifecycle::expire_if_due(&mut alert, now) {
      alert = self.write_back(alert, now).await;
    }
    self.view(alert).await
  }

  /// Alerts matching `filter`, newest first, with counters over every alert.
  pub async fn listing(&self, filter: AlertFilter) -> Result<Listing> {
    let now = self.clock.now();
    let mut alerts = self.fetch_alerts(AlertQuery::all()).await?;
    self.expire_overdue(&mut alerts, now).await;
    let evidence = self
      .store
      .list_evidence(None)
      .await
      .map_err(Error::persistence)?;
    Ok(view::build_listing(alerts, evidence, filter, now))
  }

  /// Every alert owned by `identity_id`, any status, newest first.
  pub async fn alerts_for_identity(&self, identity_id: Uuid) -> Result<Vec<AlertView>> {
    let now = self.clock.now();
    let mut alerts = self.fetch_alerts(AlertQuery::owned_by(identity_id)).await?;
    self.expire_overdue(&mut alerts, now).await;
    let evidence = self
      .store
      .list_evidence(None)
      .await
      .map_err(Error::persistence)?;
    Ok(view::join(alerts, evidence))
  }

  pub async fn stats(&self) -> Result<AlertStats> {
    let alerts = self.fetch_alerts(AlertQuery::all()).await?;
    Ok(AlertStats::tally(&alerts, self.clock.now()))
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn load(&self, id: Uuid) -> Result<Alert> {
    self
      .store
      .get_alert(id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::AlertNotFound(id))
  }

  async fn fetch_alerts(&self, query: AlertQuery) -> Result<Vec<Alert>> {
    self
      .store
      .list_alerts(query)
      .await
      .map_err(Error::persistence)
  }

  async fn save(&self, alert: Alert) -> Result<Alert> {
    let id = alert.alert_id;
    self
      .store
      .update_alert_lifecycle(alert)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::AlertNotFound(id))
  }

  /// Best-effort persist of an observed expiry.
  ///
  /// If the row moved on since it was read, the current row is returned
  /// instead, with lazy expiry applied in memory only. On a store error the
  /// observed alert is returned.
  async fn write_back(&self, alert: Alert, now: DateTime<Utc>) -> Alert {
    let id = alert.alert_id;
    match self.store.expire_alert(id, alert.expires_at, alert.updated_at).await {
      Ok(Some(saved)) => saved,
      Ok(None) => match self.store.get_alert(id).await {
        Ok(Some(mut current)) => {
          tracing::debug!(
            alert_id = %id,
            status = %current.status,
            "row changed before expiry write-back"
          );
          lifecycle::expire_if_due(&mut current, now);
          current
        }
        Ok(None) => alert,
        Err(e) => {
          tracing::warn!(alert_id = %id, error = %e, "reload after skipped write-back failed");
          alert
        }
      },
      Err(e) => {
        tracing::warn!(alert_id = %id, error = %e, "expiry write-back failed");
        alert
      }
    }
  }

  async fn expire_overdue(&self, alerts: &mut [Alert], now: DateTime<Utc>) {
    for alert in alerts.iter_mut() {
      if lifecycle::expire_if_due(alert, now) {
        *alert = self.write_back(alert.clone(), now).await;
      }
    }
  }

  async fn view(&self, alert: Alert) -> Result<AlertView> {
    let evidence = self
      .store
      .list_evidence(Some(alert.alert_id))
      .await
      .map_err(Error::persistence)?;
    Ok(AlertView { alert, evidence })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use sentinela_core::{
    clock::ManualClock,
    memory::{MemoryStore, MemoryUploader},
  };

  use super::*;
  use crate::fixtures::{new_alert, photos, registered, registered_as, t0};

  struct Harness {
    store:   Arc<MemoryStore>,
    clock:   Arc<ManualClock>,
    manager: LifecycleManager<MemoryStore, MemoryUploader>,
    owner:   Uuid,
  }

  async fn harness_with(uploader: MemoryUploader) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = LifecycleManager::new(
      store.clone(),
      Arc::new(uploader),
      clock.clone(),
      Policy::default(),
    );
    let owner = registered(&store).await.identity_id;
    Harness { store, clock, manager, owner }
  }

  async fn harness() -> Harness { harness_with(MemoryUploader::new()).await }

  // ── Create ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_sets_lifetime_and_attaches_evidence() {
    let h = harness().await;
    let created = h.manager.create(new_alert(h.owner, 2)).await.unwrap();
    let a = &created.view.alert;
    assert_eq!(a.status, AlertStatus::Active);
    assert_eq!(a.expires_at, a.created_at + Duration::hours(24));
    assert_eq!(
      created.view.references().collect::<Vec<_>>(),
      vec![format!("mem://{}/0", a.alert_id), format!("mem://{}/1", a.alert_id)]
    );
    assert!(created.evidence_failures.is_empty());
  }

  #[tokio::test]
  async fn bounds_are_enforced() {
    let h = harness().await;
    let mut inside = new_alert(h.owner, 1);
    inside.location = GeoPoint::new(-9.90, -67.80);
    h.manager.create(inside).await.unwrap();

    let mut north = new_alert(h.owner, 1);
    north.location = GeoPoint::new(-9.80, -67.80);
    assert!(matches!(h.manager.create(north).await, Err(Error::OutOfBounds { .. })));
  }

  #[tokio::test]
  async fn evidence_is_mandatory_and_capped() {
    let h = harness().await;
    assert!(matches!(
      h.manager.create(new_alert(h.owner, 0)).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      h.manager.create(new_alert(h.owner, 4)).await,
      Err(Error::Validation(_))
    ));
    assert!(h.store.list_alerts(AlertQuery::all()).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_owner_is_rejected() {
    let h = harness().await;
    assert!(matches!(
      h.manager.create(new_alert(Uuid::new_v4(), 1)).await,
      Err(Error::IdentityNotFound(_))
    ));
  }

  #[tokio::test]
  async fn fourth_active_alert_is_refused_until_one_leaves_active() {
    let h = harness().await;
    let mut ids = Vec::new();
    for _ in 0..3 {
      ids.push(h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id);
    }
    assert!(matches!(
      h.manager.create(new_alert(h.owner, 1)).await,
      Err(Error::QuotaExceeded { .. })
    ));
    assert_eq!(h.store.list_alerts(AlertQuery::all()).await.unwrap().len(), 3);

    h.manager.resolve(ids[0]).await.unwrap();
    h.manager.create(new_alert(h.owner, 1)).await.unwrap();
  }

  #[tokio::test]
  async fn natural_expiry_frees_quota() {
    let h = harness().await;
    for _ in 0..3 {
      h.manager.create(new_alert(h.owner, 1)).await.unwrap();
    }
    h.clock.advance(Duration::hours(24));
    h.manager.create(new_alert(h.owner, 1)).await.unwrap();
  }

  #[tokio::test]
  async fn partial_upload_failure_keeps_the_alert() {
    let h = harness_with(MemoryUploader::failing_at([1])).await;
    let created = h.manager.create(new_alert(h.owner, 3)).await.unwrap();

    assert_eq!(created.view.evidence.len(), 2);
    assert_eq!(
      created.view.evidence.iter().map(|e| e.position).collect::<Vec<_>>(),
      vec![0, 2]
    );
    assert_eq!(created.evidence_failures.len(), 1);
    assert_eq!(created.evidence_failures[0].position, 1);

    let stored = h.manager.get_view(created.view.alert.alert_id).await.unwrap();
    assert_eq!(stored.evidence.len(), 2);
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn resolve_is_idempotent() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;

    h.clock.advance(Duration::minutes(10));
    let first = h.manager.resolve(id).await.unwrap();
    assert_eq!(first.alert.status, AlertStatus::Resolved);
    assert_eq!(first.alert.resolved_at, Some(t0() + Duration::minutes(10)));

    h.clock.advance(Duration::minutes(10));
    let second = h.manager.resolve(id).await.unwrap();
    assert_eq!(second, first);
  }

  #[tokio::test]
  async fn resolving_an_overdue_alert_is_rejected_and_expiry_persisted() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(25));

    assert!(matches!(
      h.manager.resolve(id).await,
      Err(Error::InvalidTransition { from: AlertStatus::Expired, .. })
    ));
    let stored = h.store.get_alert(id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Expired);
  }

  #[tokio::test]
  async fn renew_from_every_status() {
    let h = harness().await;
    let expired = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(30));
    h.manager.get_view(expired).await.unwrap();
    let active = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    let resolved = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.manager.resolve(resolved).await.unwrap();
    h.clock.advance(Duration::hours(1));

    for id in [active, resolved, expired] {
      let now = h.clock.now();
      let renewed = h.manager.renew(id).await.unwrap().alert;
      assert_eq!(renewed.status, AlertStatus::Active);
      assert_eq!(renewed.expires_at, now + Duration::hours(24));
      assert!(renewed.resolved_at.is_none());
      assert_eq!(renewed.updated_at, now);
    }
  }

  #[tokio::test]
  async fn renew_does_not_recheck_quota() {
    let h = harness().await;
    let first = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.manager.resolve(first).await.unwrap();
    for _ in 0..3 {
      h.manager.create(new_alert(h.owner, 1)).await.unwrap();
    }
    h.manager.renew(first).await.unwrap();
    assert_eq!(h.manager.quota().active_count(h.owner).await.unwrap(), 4);
  }

  #[tokio::test]
  async fn unknown_alert_is_not_found() {
    let h = harness().await;
    let id = Uuid::new_v4();
    assert!(matches!(h.manager.resolve(id).await, Err(Error::AlertNotFound(_))));
    assert!(matches!(h.manager.renew(id).await, Err(Error::AlertNotFound(_))));
    assert!(matches!(h.manager.get_view(id).await, Err(Error::AlertNotFound(_))));
  }

  #[tokio::test]
  async fn note_edit_keeps_status() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::minutes(5));

    let v = h.manager.update_note(id, Some("  subiu mais  ".into())).await.unwrap();
    assert_eq!(v.alert.note.as_deref(), Some("subiu mais"));
    assert_eq!(v.alert.status, AlertStatus::Active);
    assert_eq!(v.alert.updated_at, t0() + Duration::minutes(5));

    let v = h.manager.update_note(id, Some("   ".into())).await.unwrap();
    assert_eq!(v.alert.note, None);
  }

  #[tokio::test]
  async fn note_edit_leaves_lifecycle_columns_alone() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::minutes(5));
    let resolved = h.manager.resolve(id).await.unwrap().alert;

    h.clock.advance(Duration::minutes(5));
    let v = h.manager.update_note(id, Some("baixou".into())).await.unwrap();
    assert_eq!(v.alert.status, AlertStatus::Resolved);
    assert_eq!(v.alert.resolved_at, resolved.resolved_at);
    assert_eq!(v.alert.expires_at, resolved.expires_at);
    let stored = h.store.get_alert(id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Resolved);
    assert_eq!(stored.note.as_deref(), Some("baixou"));
  }

  #[tokio::test]
  async fn note_edit_on_an_overdue_alert_persists_expiry() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(25));

    let v = h.manager.update_note(id, Some("ainda alagado".into())).await.unwrap();
    assert_eq!(v.alert.status, AlertStatus::Expired);
    let stored = h.store.get_alert(id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Expired);
    assert_eq!(stored.note.as_deref(), Some("ainda alagado"));
    assert!(matches!(
      h.manager.update_note(Uuid::new_v4(), None).await,
      Err(Error::AlertNotFound(_))
    ));
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn stale_expiry_write_back_does_not_undo_a_renewal() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(25));

    // A listing reads the overdue row, then a renewal lands before the
    // listing writes the expiry back.
    let read = h.store.list_alerts(AlertQuery::all()).await.unwrap();
    let renewed = h.manager.renew(id).await.unwrap().alert;
    let mut alerts = read;
    h.manager.expire_overdue(&mut alerts, h.clock.now()).await;

    assert_eq!(alerts[0].status, AlertStatus::Active);
    assert_eq!(alerts[0].expires_at, renewed.expires_at);
    let stored = h.store.get_alert(id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Active);
    assert_eq!(stored.expires_at, h.clock.now() + Duration::hours(24));
  }

  #[tokio::test]
  async fn stale_expiry_write_back_does_not_undo_a_resolution() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(23));
    let read = h.store.get_alert(id).await.unwrap().unwrap();
    h.manager.resolve(id).await.unwrap();

    h.clock.advance(Duration::hours(2));
    let mut alerts = vec![read];
    h.manager.expire_overdue(&mut alerts, h.clock.now()).await;
    assert_eq!(alerts[0].status, AlertStatus::Resolved);
    assert_eq!(h.store.get_alert(id).await.unwrap().unwrap().status, AlertStatus::Resolved);
    assert_eq!(h.manager.sweep_expired().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn listing_reports_lazy_expiry_without_a_sweep() {
    let h = harness().await;
    let id = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(24) + Duration::seconds(1));

    let listing = h.manager.listing(AlertFilter::HISTORY).await.unwrap();
    assert_eq!(listing.alerts[0].alert.status, AlertStatus::Expired);
    assert_eq!(listing.stats.expired, 1);
    assert!(h.manager.listing(AlertFilter::ACTIVE_24H).await.unwrap().alerts.is_empty());

    // Written back on read.
    assert_eq!(h.store.get_alert(id).await.unwrap().unwrap().status, AlertStatus::Expired);
  }

  #[tokio::test]
  async fn my_alerts_include_every_status() {
    let h = harness().await;
    let other = registered_as(&h.store, "+5568999990002").await.identity_id;
    let a = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.manager.resolve(a).await.unwrap();
    h.manager.create(new_alert(h.owner, 2)).await.unwrap();
    h.manager.create(new_alert(other, 1)).await.unwrap();

    let mine = h.manager.alerts_for_identity(h.owner).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|v| v.alert.identity_id == h.owner));
    assert_eq!(mine.iter().map(|v| v.evidence.len()).sum::<usize>(), 3);
  }

  #[tokio::test]
  async fn sweep_persists_expiry() {
    let h = harness().await;
    h.manager.create(new_alert(h.owner, 1)).await.unwrap();
    let keep = h.manager.create(new_alert(h.owner, 1)).await.unwrap().view.alert.alert_id;
    h.clock.advance(Duration::hours(20));
    h.manager.renew(keep).await.unwrap();
    h.clock.advance(Duration::hours(5));

    assert_eq!(h.manager.sweep_expired().await.unwrap(), 1);
    assert_eq!(h.manager.sweep_expired().await.unwrap(), 0);
    let stats = h.manager.stats().await.unwrap();
    assert_eq!((stats.active, stats.expired), (1, 1));
  }

  #[test]
  fn validation_is_pure() {
    let policy = Policy::default();
    assert!(validate_submission(policy.bounds.center(), "Rua A", &photos(1), &policy).is_ok());
    assert!(matches!(
      validate_submission(policy.bounds.center(), "  ", &photos(1), &policy),
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      validate_submission(GeoPoint::new(f64::NAN, 0.0), "Rua A", &photos(1), &policy),
      Err(Error::OutOfBounds { .. })
    ));
  }
}
