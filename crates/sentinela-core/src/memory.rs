//! In-memory [`AlertStore`] and [`EvidenceUploader`] used by tests and by
//! embedders that do not need durability.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  alert::{Alert, AlertStatus, Evidence, PhotoUpload},
  changes::{ChangeEvent, ChangeFeed},
  identity::{Identity, normalize_token},
  store::{AlertQuery, AlertStore},
  upload::EvidenceUploader,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("alert {0} already exists")]
  DuplicateAlert(Uuid),
  #[error("alert {0} does not exist")]
  UnknownAlert(Uuid),
  #[error("identity {0} does not exist")]
  UnknownIdentity(Uuid),
  #[error("contact {0} is already registered")]
  DuplicateContact(String),
  #[error("token is already in use")]
  DuplicateToken,
}

#[derive(Default)]
struct Tables {
  alerts:     HashMap<Uuid, Alert>,
  evidence:   Vec<Evidence>,
  identities: HashMap<Uuid, Identity>,
}

/// A process-local store. Cloning is not supported; share it behind an
/// `Arc`.
#[derive(Default)]
pub struct MemoryStore {
  tables:  Mutex<Tables>,
  changes: ChangeFeed,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn tables(&self) -> MutexGuard<'_, Tables> {
    self.tables.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Edit one alert in place under the lock. `edit` returns whether it
  /// wrote anything; a change event fires only then.
  fn modify_alert(
    &self,
    id: Uuid,
    edit: impl FnOnce(&mut Alert) -> bool,
  ) -> Result<Option<Alert>, MemoryError> {
    let (stored, wrote) = {
      let mut t = self.tables();
      let Some(slot) = t.alerts.get_mut(&id) else {
        return Ok(None);
      };
      let wrote = edit(slot);
      (slot.clone(), wrote)
    };
    if wrote {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(Some(stored))
  }
}

impl AlertStore for MemoryStore {
  type Error = MemoryError;

  async fn insert_alert(&self, alert: Alert) -> Result<Alert, MemoryError> {
    {
      let mut t = self.tables();
      if t.alerts.contains_key(&alert.alert_id) {
        return Err(MemoryError::DuplicateAlert(alert.alert_id));
      }
      if !t.identities.contains_key(&alert.identity_id) {
        return Err(MemoryError::UnknownIdentity(alert.identity_id));
      }
      t.alerts.insert(alert.alert_id, alert.clone());
    }
    self.changes.notify(ChangeEvent::Alert);
    Ok(alert)
  }

  async fn update_alert(&self, alert: Alert) -> Result<Option<Alert>, MemoryError> {
    {
      let mut t = self.tables();
      let Some(slot) = t.alerts.get_mut(&alert.alert_id) else {
        return Ok(None);
      };
      *slot = alert.clone();
    }
    self.changes.notify(ChangeEvent::Alert);
    Ok(Some(alert))
  }

  async fn update_alert_lifecycle(&self, alert: Alert) -> Result<Option<Alert>, MemoryError> {
    self.modify_alert(alert.alert_id, |slot| {
      slot.status = alert.status;
      slot.expires_at = alert.expires_at;
      slot.resolved_at = alert.resolved_at;
      slot.updated_at = alert.updated_at;
      true
    })
  }

  async fn expire_alert(
    &self,
    id: Uuid,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
  ) -> Result<Option<Alert>, MemoryError> {
    let mut matched = false;
    let stored = self.modify_alert(id, |slot| {
      matched = slot.status == AlertStatus::Active && slot.expires_at == expires_at;
      if matched {
        slot.status = AlertStatus::Expired;
        slot.updated_at = updated_at;
      }
      matched
    })?;
    Ok(stored.filter(|_| matched))
  }

  async fn set_alert_note(
    &self,
    id: Uuid,
    note: Option<String>,
    updated_at: DateTime<Utc>,
  ) -> Result<Option<Alert>, MemoryError> {
    self.modify_alert(id, |slot| {
      slot.note = note;
      slot.updated_at = updated_at;
      true
    })
  }

  async fn delete_alert(&self, id: Uuid) -> Result<bool, MemoryError> {
    let removed = {
      let mut t = self.tables();
      let removed = t.alerts.remove(&id).is_some();
      t.evidence.retain(|e| e.alert_id != id);
      removed
    };
    if removed {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(removed)
  }

  async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>, MemoryError> {
    Ok(self.tables().alerts.get(&id).cloned())
  }

  async fn list_alerts(&self, query: AlertQuery) -> Result<Vec<Alert>, MemoryError> {
    let mut alerts: Vec<Alert> = self
      .tables()
      .alerts
      .values()
      .filter(|a| query.matches(a))
      .cloned()
      .collect();
    alerts.sort_by(|a, b| {
      b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.alert_id.cmp(&b.alert_id))
    });
    Ok(alerts)
  }

  async fn insert_evidence(&self, evidence: Evidence) -> Result<Evidence, MemoryError> {
    {
      let mut t = self.tables();
      if !t.alerts.contains_key(&evidence.alert_id) {
        return Err(MemoryError::UnknownAlert(evidence.alert_id));
      }
      t.evidence.push(evidence.clone());
    }
    self.changes.notify(ChangeEvent::Evidence);
    Ok(evidence)
  }

  async fn list_evidence(&self, alert_id: Option<Uuid>) -> Result<Vec<Evidence>, MemoryError> {
    let mut evidence: Vec<Evidence> = self
      .tables()
      .evidence
      .iter()
      .filter(|e| alert_id.is_none_or(|id| e.alert_id == id))
      .cloned()
      .collect();
    evidence.sort_by_key(|e| (e.alert_id, e.position));
    Ok(evidence)
  }

  async fn insert_identity(&self, identity: Identity) -> Result<Identity, MemoryError> {
    let mut t = self.tables();
    if t.identities.values().any(|i| i.contact == identity.contact) {
      return Err(MemoryError::DuplicateContact(identity.contact));
    }
    if t.identities.values().any(|i| i.token == identity.token) {
      return Err(MemoryError::DuplicateToken);
    }
    t.identities.insert(identity.identity_id, identity.clone());
    Ok(identity)
  }

  async fn update_identity(
    &self,
    identity: Identity,
  ) -> Result<Option<Identity>, MemoryError> {
    let mut t = self.tables();
    let Some(slot) = t.identities.get_mut(&identity.identity_id) else {
      return Ok(None);
    };
    *slot = identity.clone();
    Ok(Some(identity))
  }

  async fn delete_identity(&self, id: Uuid) -> Result<bool, MemoryError> {
    let (removed, cascaded) = {
      let mut t = self.tables();
      let removed = t.identities.remove(&id).is_some();
      let owned: Vec<Uuid> = t
        .alerts
        .values()
        .filter(|a| a.identity_id == id)
        .map(|a| a.alert_id)
        .collect();
      for alert_id in &owned {
        t.alerts.remove(alert_id);
      }
      t.evidence.retain(|e| !owned.contains(&e.alert_id));
      (removed, !owned.is_empty())
    };
    if cascaded {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(removed)
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>, MemoryError> {
    Ok(self.tables().identities.get(&id).cloned())
  }

  async fn find_identity_by_contact(
    &self,
    contact: String,
  ) -> Result<Option<Identity>, MemoryError> {
    Ok(
      self
        .tables()
        .identities
        .values()
        .find(|i| i.contact == contact)
        .cloned(),
    )
  }

  async fn find_identity_by_token(
    &self,
    token: String,
  ) -> Result<Option<Identity>, MemoryError> {
    let token = normalize_token(&token);
    Ok(
      self
        .tables()
        .identities
        .values()
        .find(|i| i.token.eq_ignore_ascii_case(&token))
        .cloned(),
    )
  }

  async fn list_identities(&self) -> Result<Vec<Identity>, MemoryError> {
    let mut identities: Vec<Identity> =
      self.tables().identities.values().cloned().collect();
    identities.sort_by_key(|i| i.created_at);
    Ok(identities)
  }

  fn changes(&self) -> &ChangeFeed { &self.changes }
}

// ─── Uploader ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("upload of photo {position} for alert {alert_id} failed")]
pub struct UploadRejected {
  pub alert_id: Uuid,
  pub position: u32,
}

/// Keeps uploaded bytes in memory and hands out `mem://` references.
#[derive(Default)]
pub struct MemoryUploader {
  blobs:             Mutex<HashMap<String, PhotoUpload>>,
  /// Positions whose upload is rejected, to reproduce partial failures.
  failing_positions: Vec<u32>,
}

impl MemoryUploader {
  pub fn new() -> Self { Self::default() }

  /// An uploader that rejects the photos at `positions`.
  pub fn failing_at(positions: impl IntoIterator<Item = u32>) -> Self {
    Self {
      blobs:             Mutex::default(),
      failing_positions: positions.into_iter().collect(),
    }
  }

  pub fn stored(&self) -> usize {
    self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
  }
}

impl EvidenceUploader for MemoryUploader {
  type Error = UploadRejected;

  async fn upload(
    &self,
    alert_id: Uuid,
    position: u32,
    photo: PhotoUpload,
  ) -> Result<String, UploadRejected> {
    if self.failing_positions.contains(&position) {
      return Err(UploadRejected { alert_id, position });
    }
    let reference = format!("mem://{alert_id}/{position}");
    self
      .blobs
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(reference.clone(), photo);
    Ok(reference)
  }
}
