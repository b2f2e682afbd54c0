//! The alert state machine.
//!
//! Every legal transition is listed in [`TRANSITIONS`]; anything not in the
//! table is rejected. Expiry is never scheduled: it is observed lazily, by
//! applying [`Transition::Expire`] to overdue rows whenever they are read.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  alert::{Alert, AlertStatus, NewAlert},
};

// ─── Transitions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
  /// Time elapsed past `expires_at`, observed at read time.
  Expire,
  Resolve,
  /// Renew or reactivate; restarts the lifetime from now.
  Renew,
}

impl fmt::Display for Transition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Expire => "expire",
      Self::Resolve => "resolve",
      Self::Renew => "renew",
    })
  }
}

/// What a transition does to the row, beyond setting the target status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
  /// Nothing changes; the alert is returned as-is.
  None,
  Expire,
  Resolve,
  Renew,
}

/// `(from, trigger, to, effect)`.
const TRANSITIONS: &[(AlertStatus, Transition, AlertStatus, Effect)] = &[
  (AlertStatus::Active, Transition::Expire, AlertStatus::Expired, Effect::Expire),
  (AlertStatus::Active, Transition::Resolve, AlertStatus::Resolved, Effect::Resolve),
  (AlertStatus::Resolved, Transition::Resolve, AlertStatus::Resolved, Effect::None),
  (AlertStatus::Active, Transition::Renew, AlertStatus::Active, Effect::Renew),
  (AlertStatus::Expired, Transition::Renew, AlertStatus::Active, Effect::Renew),
  (AlertStatus::Resolved, Transition::Renew, AlertStatus::Active, Effect::Renew),
];

/// Whether [`apply`] changed the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Changed,
  Unchanged,
}

impl Outcome {
  pub fn is_changed(self) -> bool { matches!(self, Self::Changed) }
}

/// Look up the target status for `transition` from `from`.
pub fn target(from: AlertStatus, transition: Transition) -> Option<AlertStatus> {
  TRANSITIONS
    .iter()
    .find(|(f, t, ..)| *f == from && *t == transition)
    .map(|(_, _, to, _)| *to)
}

/// Apply `transition` to `alert` at time `now`.
pub fn apply(
  alert: &mut Alert,
  transition: Transition,
  now: DateTime<Utc>,
  ttl: Duration,
) -> Result<Outcome> {
  let (_, _, to, effect) = TRANSITIONS
    .iter()
    .find(|(f, t, ..)| *f == alert.status && *t == transition)
    .copied()
    .ok_or(Error::InvalidTransition { from: alert.status, transition })?;

  match effect {
    Effect::None => return Ok(Outcome::Unchanged),
    Effect::Expire => {}
    Effect::Resolve => alert.resolved_at = Some(now),
    Effect::Renew => {
      alert.expires_at = now + ttl;
      alert.resolved_at = None;
    }
  }
  alert.status = to;
  alert.updated_at = now;
  Ok(Outcome::Changed)
}

// ─── Lazy expiry ─────────────────────────────────────────────────────────────

/// `true` while the alert should be displayed as active.
pub fn is_effectively_active(alert: &Alert, now: DateTime<Utc>) -> bool {
  alert.status == AlertStatus::Active && now < alert.expires_at
}

/// The status an observer sees at `now`, without mutating the row.
pub fn effective_status(alert: &Alert, now: DateTime<Utc>) -> AlertStatus {
  if alert.status == AlertStatus::Active && now >= alert.expires_at {
    AlertStatus::Expired
  } else {
    alert.status
  }
}

/// Apply the expiry transition if the alert is active and overdue. Returns
/// `true` if the row changed.
///
/// `updated_at` becomes the moment the alert expired, not `now`, so repeated
/// reads of the same overdue row agree with each other.
pub fn expire_if_due(alert: &mut Alert, now: DateTime<Utc>) -> bool {
  if effective_status(alert, now) == alert.status {
    return false;
  }
  alert.status = AlertStatus::Expired;
  alert.updated_at = alert.updated_at.max(alert.expires_at);
  true
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Build the persisted row for a freshly created alert.
pub fn open(input: &NewAlert, now: DateTime<Utc>, ttl: Duration) -> Alert {
  Alert {
    alert_id:     Uuid::new_v4(),
    identity_id:  input.identity_id,
    location:     input.location,
    address:      input.address.trim().to_owned(),
    neighborhood: input
      .neighborhood
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .map(str::to_owned),
    status:       AlertStatus::Active,
    note:         input
      .note
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .map(str::to_owned),
    created_at:   now,
    updated_at:   now,
    expires_at:   now + ttl,
    resolved_at:  None,
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::geo::GeoPoint;

  fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap() }

  fn ttl() -> Duration { Duration::hours(24) }

  fn fresh() -> Alert {
    open(
      &NewAlert {
        identity_id:  Uuid::new_v4(),
        location:     GeoPoint::new(-9.9747, -67.8107),
        address:      " Av. Ceará, 1500 ".into(),
        neighborhood: Some("  ".into()),
        note:         Some("água no joelho".into()),
        photos:       vec![],
      },
      t0(),
      ttl(),
    )
  }

  #[test]
  fn open_sets_lifetime_and_trims_text() {
    let a = fresh();
    assert_eq!(a.status, AlertStatus::Active);
    assert_eq!(a.created_at, t0());
    assert_eq!(a.updated_at, t0());
    assert_eq!(a.expires_at, a.created_at + Duration::hours(24));
    assert_eq!(a.address, "Av. Ceará, 1500");
    assert_eq!(a.neighborhood, None);
    assert!(a.resolved_at.is_none());
  }

  #[test]
  fn resolve_sets_resolution_time() {
    let mut a = fresh();
    let now = t0() + Duration::hours(1);
    assert_eq!(apply(&mut a, Transition::Resolve, now, ttl()).unwrap(), Outcome::Changed);
    assert_eq!(a.status, AlertStatus::Resolved);
    assert_eq!(a.resolved_at, Some(now));
    assert_eq!(a.updated_at, now);
  }

  #[test]
  fn resolving_twice_is_a_no_op() {
    let mut a = fresh();
    apply(&mut a, Transition::Resolve, t0(), ttl()).unwrap();
    let before = a.clone();
    let outcome =
      apply(&mut a, Transition::Resolve, t0() + Duration::hours(2), ttl()).unwrap();
    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(a, before);
  }

  #[test]
  fn resolving_an_expired_alert_is_rejected() {
    let mut a = fresh();
    a.status = AlertStatus::Expired;
    let err = apply(&mut a, Transition::Resolve, t0(), ttl()).unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidTransition { from: AlertStatus::Expired, transition: Transition::Resolve }
    ));
  }

  #[test]
  fn renew_works_from_every_status() {
    for from in AlertStatus::ALL {
      let mut a = fresh();
      a.status = from;
      a.resolved_at = (from == AlertStatus::Resolved).then_some(t0());
      let now = t0() + Duration::hours(30);
      apply(&mut a, Transition::Renew, now, ttl()).unwrap();
      assert_eq!(a.status, AlertStatus::Active);
      assert_eq!(a.expires_at, now + Duration::hours(24));
      assert!(a.resolved_at.is_none());
      assert!(a.validate().is_ok());
    }
  }

  #[test]
  fn expire_only_from_active() {
    assert_eq!(target(AlertStatus::Active, Transition::Expire), Some(AlertStatus::Expired));
    assert_eq!(target(AlertStatus::Resolved, Transition::Expire), None);
    assert_eq!(target(AlertStatus::Expired, Transition::Expire), None);
  }

  #[test]
  fn lazy_expiry_at_the_boundary() {
    let mut a = fresh();
    let just_before = a.expires_at - Duration::seconds(1);
    assert!(is_effectively_active(&a, just_before));
    assert!(!expire_if_due(&mut a, just_before));

    let at = a.expires_at;
    assert_eq!(effective_status(&a, at), AlertStatus::Expired);
    assert!(expire_if_due(&mut a, at));
    assert_eq!(a.status, AlertStatus::Expired);
    assert_eq!(a.updated_at, at);

    // Already expired: nothing further to do.
    assert!(!expire_if_due(&mut a, at + Duration::hours(1)));
  }

  #[test]
  fn lazy_expiry_stamps_the_expiry_time_not_the_read_time() {
    let row = fresh();
    let mut early = row.clone();
    let mut late = row.clone();
    assert!(expire_if_due(&mut early, row.expires_at + Duration::minutes(1)));
    assert!(expire_if_due(&mut late, row.expires_at + Duration::days(2)));
    assert_eq!(early, late);
    assert_eq!(late.updated_at, row.expires_at);
  }

  #[test]
  fn lazy_expiry_ignores_resolved() {
    let mut a = fresh();
    apply(&mut a, Transition::Resolve, t0(), ttl()).unwrap();
    assert!(!expire_if_due(&mut a, t0() + Duration::days(3)));
    assert_eq!(a.status, AlertStatus::Resolved);
  }
}
