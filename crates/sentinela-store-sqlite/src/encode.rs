//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so they sort
//! lexically. UUIDs are stored as hyphenated lowercase strings. Rows are read
//! into `Raw*` structs first and only become domain types after validation;
//! a row that decodes but breaks an invariant is rejected, never patched up.

use chrono::{DateTime, SecondsFormat, Utc};
use sentinela_core::{
  alert::{Alert, AlertStatus, Evidence},
  geo::GeoPoint,
  identity::Identity,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── AlertStatus ──────────────────────────────────────────────────────────────

pub fn encode_status(s: AlertStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<AlertStatus> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `alerts` row.
pub struct RawAlert {
  pub alert_id:     String,
  pub identity_id:  String,
  pub lat:          f64,
  pub lng:          f64,
  pub address:      String,
  pub neighborhood: Option<String>,
  pub status:       String,
  pub note:         Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
  pub expires_at:   String,
  pub resolved_at:  Option<String>,
}

pub const ALERT_COLUMNS: &str = "alert_id, identity_id, lat, lng, address, \
  neighborhood, status, note, created_at, updated_at, expires_at, resolved_at";

impl RawAlert {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:     row.get(0)?,
      identity_id:  row.get(1)?,
      lat:          row.get(2)?,
      lng:          row.get(3)?,
      address:      row.get(4)?,
      neighborhood: row.get(5)?,
      status:       row.get(6)?,
      note:         row.get(7)?,
      created_at:   row.get(8)?,
      updated_at:   row.get(9)?,
      expires_at:   row.get(10)?,
      resolved_at:  row.get(11)?,
    })
  }

  pub fn into_alert(self) -> Result<Alert> {
    let alert = Alert {
      alert_id:     decode_uuid(&self.alert_id)?,
      identity_id:  decode_uuid(&self.identity_id)?,
      location:     GeoPoint::new(self.lat, self.lng),
      address:      self.address,
      neighborhood: self.neighborhood,
      status:       decode_status(&self.status)?,
      note:         self.note,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
      expires_at:   decode_dt(&self.expires_at)?,
      resolved_at:  self.resolved_at.as_deref().map(decode_dt).transpose()?,
    };
    alert.validate()?;
    Ok(alert)
  }
}

/// Raw values read directly from an `alert_media` row.
pub struct RawEvidence {
  pub evidence_id: String,
  pub alert_id:    String,
  pub reference:   String,
  pub position:    i64,
  pub created_at:  String,
}

pub const EVIDENCE_COLUMNS: &str =
  "evidence_id, alert_id, reference, position, created_at";

impl RawEvidence {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      evidence_id: row.get(0)?,
      alert_id:    row.get(1)?,
      reference:   row.get(2)?,
      position:    row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_evidence(self) -> Result<Evidence> {
    let position = u32::try_from(self.position).map_err(|_| {
      sentinela_core::Error::Validation(format!(
        "evidence {} has position {}",
        self.evidence_id, self.position
      ))
    })?;
    if self.reference.trim().is_empty() {
      return Err(
        sentinela_core::Error::Validation(format!(
          "evidence {} has an empty reference",
          self.evidence_id
        ))
        .into(),
      );
    }
    Ok(Evidence {
      evidence_id: decode_uuid(&self.evidence_id)?,
      alert_id: decode_uuid(&self.alert_id)?,
      reference: self.reference,
      position,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_id:     String,
  pub display_name:    String,
  pub contact:         String,
  pub token:           String,
  pub default_address: Option<String>,
  pub default_lat:     Option<f64>,
  pub default_lng:     Option<f64>,
  pub created_at:      String,
  pub updated_at:      String,
}

pub const IDENTITY_COLUMNS: &str = "identity_id, display_name, contact, token, \
  default_address, default_lat, default_lng, created_at, updated_at";

impl RawIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id:     row.get(0)?,
      display_name:    row.get(1)?,
      contact:         row.get(2)?,
      token:           row.get(3)?,
      default_address: row.get(4)?,
      default_lat:     row.get(5)?,
      default_lng:     row.get(6)?,
      created_at:      row.get(7)?,
      updated_at:      row.get(8)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    let default_location = match (self.default_lat, self.default_lng) {
      (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
      (None, None) => None,
      _ => {
        return Err(
          sentinela_core::Error::Validation(format!(
            "identity {} has half a default location",
            self.identity_id
          ))
          .into(),
        );
      }
    };
    Ok(Identity {
      identity_id: decode_uuid(&self.identity_id)?,
      display_name: self.display_name,
      contact: self.contact,
      token: self.token,
      default_address: self.default_address,
      default_location,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
