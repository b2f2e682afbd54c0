//! Identity: a registered reporter, keyed naturally by a canonical phone
//! number and addressed by an opaque bearer token.

use chrono::{DateTime, Utc};
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, geo::GeoPoint};

/// Characters a token is drawn from. Tokens are compared case-insensitively
/// and always stored uppercase.
const TOKEN_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const COUNTRY_CODE: &str = "55";

/// A registered reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
  pub identity_id:      Uuid,
  pub display_name:     String,
  /// Canonical E.164 phone number; unique across identities.
  pub contact:          String,
  /// Opaque bearer token; unique, uppercase.
  pub token:            String,
  /// The last address the reporter submitted from.
  pub default_address:  Option<String>,
  pub default_location: Option<GeoPoint>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input to `IdentityService::upsert`.
#[derive(Debug, Clone)]
pub struct IdentityUpsert {
  /// Raw phone number as typed; canonicalised before use.
  pub contact:          String,
  pub display_name:     String,
  pub default_address:  Option<String>,
  pub default_location: Option<GeoPoint>,
}

/// Canonicalise a Brazilian phone number to E.164.
///
/// Non-digits are stripped. Numbers that already carry the country code
/// (12 digits or more starting with `55`) keep it; anything else is prefixed
/// with `+55`.
pub fn canonical_contact(raw: &str) -> Result<String> {
  let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
  if digits.len() < 10 {
    return Err(Error::Validation(format!(
      "phone number {raw:?} needs at least 10 digits"
    )));
  }
  if digits.len() >= 12 && digits.starts_with(COUNTRY_CODE) {
    Ok(format!("+{digits}"))
  } else {
    Ok(format!("+{COUNTRY_CODE}{digits}"))
  }
}

/// Trim and uppercase a token candidate for lookup.
pub fn normalize_token(raw: &str) -> String { raw.trim().to_ascii_uppercase() }

/// Draw a fresh uppercase base-36 token of `len` characters.
pub fn generate_token<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> String {
  let mut token = String::with_capacity(len);
  while token.len() < len {
    // Rejection sampling keeps the distribution uniform over the alphabet.
    let idx = (rng.next_u32() & 0x3f) as usize;
    if let Some(&c) = TOKEN_ALPHABET.get(idx) {
      token.push(c as char);
    }
  }
  token
}
