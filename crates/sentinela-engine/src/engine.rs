//! [`Engine`] wires the services together over one store, uploader and
//! clock, and runs the submission pipeline.

use std::{sync::Arc, time::Duration};

use sentinela_core::{
  Error, Result,
  alert::{AlertView, NewAlert, PhotoUpload},
  clock::{Clock, SystemClock},
  geo::GeoPoint,
  identity::{Identity, IdentityUpsert},
  policy::Policy,
  store::AlertStore,
  upload::EvidenceUploader,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  dedup::DedupGuard,
  identities::IdentityService,
  manager::{EvidenceFailure, LifecycleManager, validate_submission},
  sync::{DEFAULT_POLL_INTERVAL, Subscription, SyncBroadcaster},
  view::AlertFilter,
};

// ─── Submission ──────────────────────────────────────────────────────────────

/// Everything a reporter sends in one go: who they are and what they saw.
#[derive(Debug, Clone)]
pub struct Submission {
  pub contact:      String,
  pub display_name: String,
  pub location:     GeoPoint,
  pub address:      String,
  pub neighborhood: Option<String>,
  pub note:         Option<String>,
  pub photos:       Vec<PhotoUpload>,
}

/// What the reporter gets back. `identity.token` is their key to manage the
/// alert later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
  pub identity:          Identity,
  pub view:              AlertView,
  /// A recent nearby open alert by the same reporter, if any. Advisory.
  pub duplicate_of:      Option<Uuid>,
  pub evidence_failures: Vec<EvidenceFailure>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Engine<S, U> {
  store:      Arc<S>,
  identities: IdentityService<S>,
  dedup:      DedupGuard<S>,
  manager:    LifecycleManager<S, U>,
  sync:       SyncBroadcaster<S>,
}

impl<S, U> Engine<S, U>
where
  S: AlertStore + 'static,
  U: EvidenceUploader,
{
  /// An engine on the system clock with the default poll interval.
  pub fn new(store: Arc<S>, uploader: Arc<U>, policy: Policy) -> Self {
    Self::with_clock(store, uploader, policy, Arc::new(SystemClock), DEFAULT_POLL_INTERVAL)
  }

  pub fn with_clock(
    store: Arc<S>,
    uploader: Arc<U>,
    policy: Policy,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
  ) -> Self {
    Self {
      identities: IdentityService::new(store.clone(), clock.clone(), policy.token_length),
      dedup: DedupGuard::new(store.clone(), clock.clone(), &policy),
      sync: SyncBroadcaster::new(store.clone(), clock.clone(), poll_interval),
      manager: LifecycleManager::new(store.clone(), uploader, clock, policy),
      store,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn identities(&self) -> &IdentityService<S> { &self.identities }

  pub fn dedup(&self) -> &DedupGuard<S> { &self.dedup }

  pub fn manager(&self) -> &LifecycleManager<S, U> { &self.manager }

  pub fn policy(&self) -> &Policy { self.manager.policy() }

  /// Open a live listing. See [`SyncBroadcaster::subscribe`].
  pub fn subscribe(&self, filter: AlertFilter) -> Subscription { self.sync.subscribe(filter) }

  /// Register (or refresh) the reporter and open an alert for them.
  ///
  /// Location and evidence are checked before anything is written. The
  /// identity is then upserted, so a later quota rejection still leaves the
  /// reporter registered; the alert itself is never partially created.
  pub async fn submit(&self, submission: Submission) -> Result<Receipt> {
    let Submission { contact, display_name, location, address, neighborhood, note, photos } =
      submission;
    validate_submission(location, &address, &photos, self.policy())?;

    let identity = self
      .identities
      .upsert(IdentityUpsert {
        contact,
        display_name,
        default_address: Some(address.clone()),
        default_location: Some(location),
      })
      .await?;

    let duplicate_of = self
      .dedup
      .find_nearby_open_alert(identity.identity_id, location)
      .await?
      .map(|a| a.alert_id);

    let created = self
      .manager
      .create(NewAlert {
        identity_id: identity.identity_id,
        location,
        address,
        neighborhood,
        note,
        photos,
      })
      .await?;

    if let Some(dup) = duplicate_of {
      tracing::info!(
        alert_id = %created.view.alert.alert_id,
        duplicate_of = %dup,
        "submission looks like a duplicate"
      );
    }
    Ok(Receipt {
      identity,
      view: created.view,
      duplicate_of,
      evidence_failures: created.evidence_failures,
    })
  }

  // ── Bearer-token management ───────────────────────────────────────────────

  /// Every alert belonging to the holder of `token`.
  pub async fn my_alerts(&self, token: &str) -> Result<(Identity, Vec<AlertView>)> {
    let identity = self.identities.find_by_token(token).await?;
    let alerts = self.manager.alerts_for_identity(identity.identity_id).await?;
    Ok((identity, alerts))
  }

  /// Fails with [`Error::AlertNotFound`] unless `alert_id` belongs to the
  /// holder of `token`; someone else's alert is indistinguishable from a
  /// missing one.
  async fn owned(&self, token: &str, alert_id: Uuid) -> Result<Identity> {
    let identity = self.identities.find_by_token(token).await?;
    let alert = self
      .store
      .get_alert(alert_id)
      .await
      .map_err(Error::persistence)?;
    match alert {
      Some(a) if a.identity_id == identity.identity_id => Ok(identity),
      _ => Err(Error::AlertNotFound(alert_id)),
    }
  }

  pub async fn resolve_mine(&self, token: &str, alert_id: Uuid) -> Result<AlertView> {
    self.owned(token, alert_id).await?;
    self.manager.resolve(alert_id).await
  }

  pub async fn renew_mine(&self, token: &str, alert_id: Uuid) -> Result<AlertView> {
    self.owned(token, alert_id).await?;
    self.manager.renew(alert_id).await
  }

  pub async fn update_my_note(
    &self,
    token: &str,
    alert_id: Uuid,
    note: Option<String>,
  ) -> Result<AlertView> {
    self.owned(token, alert_id).await?;
    self.manager.update_note(alert_id, note).await
  }
}
