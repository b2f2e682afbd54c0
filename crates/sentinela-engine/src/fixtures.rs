//! Shared test data.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sentinela_core::{
  alert::{Alert, AlertStatus, NewAlert, PhotoUpload},
  geo::GeoPoint,
  identity::Identity,
  store::AlertStore,
};
use uuid::Uuid;

pub fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap() }

pub fn photos(n: usize) -> Vec<PhotoUpload> {
  (0..n)
    .map(|i| PhotoUpload { media_type: "image/jpeg".into(), data: vec![0xff, 0xd8, i as u8] })
    .collect()
}

pub fn new_alert(identity_id: Uuid, n_photos: usize) -> NewAlert {
  NewAlert {
    identity_id,
    location: GeoPoint::new(-9.9747, -67.8107),
    address: "Av. Ceará, 1500".into(),
    neighborhood: Some("Centro".into()),
    note: None,
    photos: photos(n_photos),
  }
}

/// A persisted-shape ACTIVE alert created at `created_at`, bypassing the
/// manager.
pub fn active_alert(identity_id: Uuid, created_at: DateTime<Utc>) -> Alert {
  Alert {
    alert_id: Uuid::new_v4(),
    identity_id,
    location: GeoPoint::new(-9.9747, -67.8107),
    address: "Av. Ceará, 1500".into(),
    neighborhood: None,
    status: AlertStatus::Active,
    note: None,
    created_at,
    updated_at: created_at,
    expires_at: created_at + Duration::hours(24),
    resolved_at: None,
  }
}

pub async fn registered_as<S: AlertStore>(store: &Arc<S>, contact: &str) -> Identity {
  let token: String = contact.chars().rev().take(8).collect();
  store
    .insert_identity(Identity {
      identity_id:      Uuid::new_v4(),
      display_name:     "Maria".into(),
      contact:          contact.into(),
      token:            format!("T{token}"),
      default_address:  None,
      default_location: None,
      created_at:       t0(),
      updated_at:       t0(),
    })
    .await
    .unwrap()
}

pub async fn registered<S: AlertStore>(store: &Arc<S>) -> Identity {
  registered_as(store, "+5568999990001").await
}
