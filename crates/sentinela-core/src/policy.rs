//! Tunable policy constants. Every field has a default, so an empty config
//! section yields the stock behaviour.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  geo::{Bounds, DistanceModel, GeoPoint},
};

/// Upper limit on `alert_ttl_hours`: one year.
pub const MAX_ALERT_TTL_HOURS: i64 = 24 * 365;
/// Upper limit on `dedup_window_minutes`: one week.
pub const MAX_DEDUP_WINDOW_MINUTES: i64 = 7 * 24 * 60;
/// Accepted range of `token_length`.
pub const TOKEN_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
  /// Lifetime of an alert from creation or renewal.
  pub alert_ttl_hours:         i64,
  /// Ceiling on concurrently-active alerts per identity.
  pub max_active_per_identity: usize,
  /// Look-back window of the dedup guard.
  pub dedup_window_minutes:    i64,
  /// Matches strictly closer than this are flagged as likely duplicates.
  pub dedup_radius_meters:     f64,
  pub distance_model:          DistanceModel,
  /// Photos accepted per submission.
  pub max_photos:              usize,
  pub token_length:            usize,
  pub bounds:                  Bounds,
}

impl Policy {
  pub fn alert_ttl(&self) -> Duration { Duration::hours(self.alert_ttl_hours) }

  pub fn dedup_window(&self) -> Duration {
    Duration::minutes(self.dedup_window_minutes)
  }

  /// Reject settings the engine cannot run with. Called once at startup,
  /// before anything reads the durations.
  pub fn validate(&self) -> Result<()> {
    let invalid = |msg: String| -> Result<()> { Err(Error::Validation(msg)) };

    if !(1..=MAX_ALERT_TTL_HOURS).contains(&self.alert_ttl_hours) {
      return invalid(format!(
        "alert_ttl_hours must be between 1 and {MAX_ALERT_TTL_HOURS}, got {}",
        self.alert_ttl_hours
      ));
    }
    if self.max_active_per_identity == 0 {
      return invalid("max_active_per_identity must be at least 1".into());
    }
    if !(0..=MAX_DEDUP_WINDOW_MINUTES).contains(&self.dedup_window_minutes) {
      return invalid(format!(
        "dedup_window_minutes must be between 0 and {MAX_DEDUP_WINDOW_MINUTES}, got {}",
        self.dedup_window_minutes
      ));
    }
    if !self.dedup_radius_meters.is_finite() || self.dedup_radius_meters < 0.0 {
      return invalid(format!(
        "dedup_radius_meters must be a non-negative distance, got {}",
        self.dedup_radius_meters
      ));
    }
    if self.max_photos == 0 {
      return invalid("max_photos must be at least 1".into());
    }
    if !TOKEN_LENGTH_RANGE.contains(&self.token_length) {
      return invalid(format!(
        "token_length must be between {} and {}, got {}",
        TOKEN_LENGTH_RANGE.start(),
        TOKEN_LENGTH_RANGE.end(),
        self.token_length
      ));
    }

    let b = &self.bounds;
    let corners_valid = GeoPoint::new(b.north, b.east).is_valid()
      && GeoPoint::new(b.south, b.west).is_valid();
    if !corners_valid || b.south >= b.north || b.west >= b.east {
      return invalid(format!(
        "bounds must satisfy south < north and west < east, got {b:?}"
      ));
    }
    Ok(())
  }
}

impl Default for Policy {
  fn default() -> Self {
    Self {
      alert_ttl_hours:         24,
      max_active_per_identity: 3,
      dedup_window_minutes:    120,
      dedup_radius_meters:     200.0,
      distance_model:          DistanceModel::Planar,
      max_photos:              3,
      token_length:            8,
      bounds:                  Bounds::RIO_BRANCO,
    }
  }
}
