//! The derived read model: listing filters, counters, and the single
//! fetch-and-transform routine shared by listings and live subscriptions.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use sentinela_core::{
  Error,
  alert::{Alert, AlertStatus, AlertView, Evidence},
  lifecycle,
};
use serde::Serialize;
use uuid::Uuid;

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Which alerts a listing or subscription shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertFilter {
  /// Drop alerts created more than this many hours ago.
  pub max_age_hours:   Option<i64>,
  /// Keep expired and resolved alerts too.
  pub include_history: bool,
}

impl AlertFilter {
  pub const ACTIVE_24H: Self = Self::active_within(24);
  pub const ACTIVE_6H: Self = Self::active_within(6);
  pub const HISTORY: Self = Self { max_age_hours: None, include_history: true };

  pub const fn active_within(hours: i64) -> Self {
    Self { max_age_hours: Some(hours), include_history: false }
  }

  /// `alert` must already have lazy expiry applied.
  pub fn matches(&self, alert: &Alert, now: DateTime<Utc>) -> bool {
    if !self.include_history && !lifecycle::is_effectively_active(alert, now) {
      return false;
    }
    self
      .max_age_hours
      .is_none_or(|hours| now - alert.created_at <= Duration::hours(hours))
  }
}

impl Default for AlertFilter {
  fn default() -> Self { Self::ACTIVE_24H }
}

impl fmt::Display for AlertFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.include_history, self.max_age_hours) {
      (true, None) => f.write_str("history"),
      (true, Some(h)) => write!(f, "history-{h}h"),
      (false, None) => f.write_str("active"),
      (false, Some(h)) => write!(f, "active-{h}h"),
    }
  }
}

impl FromStr for AlertFilter {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "active-24h" => Ok(Self::ACTIVE_24H),
      "active-6h" => Ok(Self::ACTIVE_6H),
      "history" => Ok(Self::HISTORY),
      other => Err(Error::Validation(format!("unknown filter: {other:?}"))),
    }
  }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Counters by effective status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
  pub total:    usize,
  pub active:   usize,
  pub expired:  usize,
  pub resolved: usize,
}

impl AlertStats {
  pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a Alert>, now: DateTime<Utc>) -> Self {
    alerts.into_iter().fold(Self::default(), |mut stats, alert| {
      stats.total += 1;
      match lifecycle::effective_status(alert, now) {
        AlertStatus::Active => stats.active += 1,
        AlertStatus::Expired => stats.expired += 1,
        AlertStatus::Resolved => stats.resolved += 1,
      }
      stats
    })
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// A filtered list of alerts plus counters over the unfiltered set, both
/// derived from the same fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
  pub alerts: Vec<AlertView>,
  pub stats:  AlertStats,
}

/// Attach each alert's evidence, in position order. Evidence for alerts not
/// in `alerts` is ignored.
pub fn join(alerts: Vec<Alert>, evidence: Vec<Evidence>) -> Vec<AlertView> {
  let mut by_alert: HashMap<Uuid, Vec<Evidence>> = HashMap::new();
  for e in evidence {
    by_alert.entry(e.alert_id).or_default().push(e);
  }
  alerts
    .into_iter()
    .map(|alert| {
      let mut evidence = by_alert.remove(&alert.alert_id).unwrap_or_default();
      evidence.sort_by_key(|e| e.position);
      AlertView { alert, evidence }
    })
    .collect()
}

/// Apply lazy expiry in memory, count, filter, then join evidence. Input
/// order is preserved.
pub fn build_listing(
  mut alerts: Vec<Alert>,
  evidence: Vec<Evidence>,
  filter: AlertFilter,
  now: DateTime<Utc>,
) -> Listing {
  for alert in &mut alerts {
    lifecycle::expire_if_due(alert, now);
  }
  let stats = AlertStats::tally(&alerts, now);
  alerts.retain(|a| filter.matches(a, now));
  Listing { alerts: join(alerts, evidence), stats }
}
