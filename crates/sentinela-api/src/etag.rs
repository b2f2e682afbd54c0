//! ETag computation for alert listings.
//!
//! The tag is a SHA-256 over every listed alert's id and `updated_at`, the
//! evidence attached to each, and the unfiltered counts. Any write that a
//! viewer could notice moves at least one of those.

use axum::http::{HeaderMap, header};
use sentinela_engine::Listing;
use sha2::{Digest, Sha256};

/// Compute a strong ETag for `listing`, returned with surrounding quotes.
pub fn listing_etag(listing: &Listing) -> String {
  let mut hasher = Sha256::new();
  for view in &listing.alerts {
    hasher.update(view.alert.alert_id.as_bytes());
    hasher.update(view.alert.updated_at.timestamp_micros().to_be_bytes());
    hasher.update((view.evidence.len() as u64).to_be_bytes());
    for ev in &view.evidence {
      hasher.update(ev.evidence_id.as_bytes());
    }
  }
  let s = &listing.stats;
  for n in [s.total, s.active, s.expired, s.resolved] {
    hasher.update((n as u64).to_be_bytes());
  }
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// `true` when the request's `If-None-Match` already names `etag`.
pub fn not_modified(headers: &HeaderMap, etag: &str) -> bool {
  let Some(value) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) else {
    return false;
  };
  let wanted = strip_etag_quotes(etag);
  value.split(',').map(str::trim).any(|candidate| {
    candidate == "*" || strip_etag_quotes(candidate.trim_start_matches("W/")) == wanted
  })
}

fn strip_etag_quotes(s: &str) -> &str { s.trim_matches('"') }
