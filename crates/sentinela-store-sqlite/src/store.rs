//! [`SqliteStore`], the SQLite implementation of [`AlertStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use sentinela_core::{
  alert::{Alert, AlertStatus, Evidence},
  changes::{ChangeEvent, ChangeFeed},
  identity::{Identity, normalize_token},
  store::{AlertQuery, AlertStore},
};

use crate::{
  Error, Result,
  encode::{
    ALERT_COLUMNS, EVIDENCE_COLUMNS, IDENTITY_COLUMNS, RawAlert, RawEvidence,
    RawIdentity, encode_dt, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An alert store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection and change feed are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  changes:         ChangeFeed,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, changes: ChangeFeed::new() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, changes: ChangeFeed::new() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_identity_where(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Identity>> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE {column} = ?1");
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], RawIdentity::from_row)
            .optional()?,
        )
      })
      .await?;
    raw.map(RawIdentity::into_identity).transpose()
  }
}

/// Decode a batch of rows, skipping (and logging) any that are malformed so
/// one bad row cannot blank a whole listing.
/// Run one alert `UPDATE` and read the row back on the same connection.
/// Nothing is returned when the statement touched no rows.
async fn write_alert_row<F>(
  conn: &tokio_rusqlite::Connection,
  id: Uuid,
  write: F,
) -> Result<Option<Alert>>
where
  F: FnOnce(&rusqlite::Connection, &str) -> rusqlite::Result<usize> + Send + 'static,
{
  let id_str = encode_uuid(id);
  let raw: Option<RawAlert> = conn
    .call(move |conn| {
      if write(conn, &id_str)? == 0 {
        return Ok(None);
      }
      Ok(
        conn
          .query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE alert_id = ?1"),
            rusqlite::params![id_str],
            RawAlert::from_row,
          )
          .optional()?,
      )
    })
    .await?;

  raw.map(RawAlert::into_alert).transpose()
}

fn decode_all<R, T>(
  raws: Vec<R>,
  what: &'static str,
  decode: impl Fn(R) -> Result<T>,
) -> Vec<T> {
  raws
    .into_iter()
    .filter_map(|raw| match decode(raw) {
      Ok(v) => Some(v),
      Err(e) => {
        tracing::warn!(error = %e, "skipping malformed {what} row");
        None
      }
    })
    .collect()
}

// ─── AlertStore impl ─────────────────────────────────────────────────────────

impl AlertStore for SqliteStore {
  type Error = Error;

  // ── Alerts ────────────────────────────────────────────────────────────────

  async fn insert_alert(&self, alert: Alert) -> Result<Alert> {
    alert.validate()?;

    let id_str       = encode_uuid(alert.alert_id);
    let identity_str = encode_uuid(alert.identity_id);
    let lat          = alert.location.lat;
    let lng          = alert.location.lng;
    let address      = alert.address.clone();
    let neighborhood = alert.neighborhood.clone();
    let status       = encode_status(alert.status);
    let note         = alert.note.clone();
    let created_str  = encode_dt(alert.created_at);
    let updated_str  = encode_dt(alert.updated_at);
    let expires_str  = encode_dt(alert.expires_at);
    let resolved_str = alert.resolved_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO alerts (
             alert_id, identity_id, lat, lng, address, neighborhood, status,
             note, created_at, updated_at, expires_at, resolved_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            id_str,
            identity_str,
            lat,
            lng,
            address,
            neighborhood,
            status,
            note,
            created_str,
            updated_str,
            expires_str,
            resolved_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    self.changes.notify(ChangeEvent::Alert);
    Ok(alert)
  }

  async fn update_alert(&self, alert: Alert) -> Result<Option<Alert>> {
    alert.validate()?;

    let id_str       = encode_uuid(alert.alert_id);
    let lat          = alert.location.lat;
    let lng          = alert.location.lng;
    let address      = alert.address.clone();
    let neighborhood = alert.neighborhood.clone();
    let status       = encode_status(alert.status);
    let note         = alert.note.clone();
    let updated_str  = encode_dt(alert.updated_at);
    let expires_str  = encode_dt(alert.expires_at);
    let resolved_str = alert.resolved_at.map(encode_dt);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE alerts SET
             lat = ?2, lng = ?3, address = ?4, neighborhood = ?5, status = ?6,
             note = ?7, updated_at = ?8, expires_at = ?9, resolved_at = ?10
           WHERE alert_id = ?1",
          rusqlite::params![
            id_str,
            lat,
            lng,
            address,
            neighborhood,
            status,
            note,
            updated_str,
            expires_str,
            resolved_str,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.changes.notify(ChangeEvent::Alert);
    Ok(Some(alert))
  }

  async fn update_alert_lifecycle(&self, alert: Alert) -> Result<Option<Alert>> {
    alert.validate()?;

    let status       = encode_status(alert.status);
    let updated_str  = encode_dt(alert.updated_at);
    let expires_str  = encode_dt(alert.expires_at);
    let resolved_str = alert.resolved_at.map(encode_dt);

    let stored = write_alert_row(&self.conn, alert.alert_id, move |conn, id| {
      conn.execute(
        "UPDATE alerts SET
           status = ?2, updated_at = ?3, expires_at = ?4, resolved_at = ?5
         WHERE alert_id = ?1",
        rusqlite::params![id, status, updated_str, expires_str, resolved_str],
      )
    })
    .await?;

    if stored.is_some() {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(stored)
  }

  async fn expire_alert(
    &self,
    id: Uuid,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
  ) -> Result<Option<Alert>> {
    let active      = encode_status(AlertStatus::Active);
    let expired     = encode_status(AlertStatus::Expired);
    let expires_str = encode_dt(expires_at);
    let updated_str = encode_dt(updated_at);

    let stored = write_alert_row(&self.conn, id, move |conn, id| {
      conn.execute(
        "UPDATE alerts SET status = ?2, updated_at = ?3
         WHERE alert_id = ?1 AND status = ?4 AND expires_at = ?5",
        rusqlite::params![id, expired, updated_str, active, expires_str],
      )
    })
    .await?;

    if stored.is_some() {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(stored)
  }

  async fn set_alert_note(
    &self,
    id: Uuid,
    note: Option<String>,
    updated_at: DateTime<Utc>,
  ) -> Result<Option<Alert>> {
    let updated_str = encode_dt(updated_at);

    let stored = write_alert_row(&self.conn, id, move |conn, id| {
      conn.execute(
        "UPDATE alerts SET note = ?2, updated_at = ?3 WHERE alert_id = ?1",
        rusqlite::params![id, note, updated_str],
      )
    })
    .await?;

    if stored.is_some() {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(stored)
  }

  async fn delete_alert(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM alerts WHERE alert_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if deleted > 0 {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(deleted > 0)
  }

  async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawAlert> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE alert_id = ?1"),
              rusqlite::params![id_str],
              RawAlert::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAlert::into_alert).transpose()
  }

  async fn list_alerts(&self, query: AlertQuery) -> Result<Vec<Alert>> {
    let identity_str = query.identity_id.map(encode_uuid);
    let status       = query.status.map(encode_status);

    let raws: Vec<RawAlert> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ALERT_COLUMNS} FROM alerts
           WHERE (?1 IS NULL OR identity_id = ?1)
             AND (?2 IS NULL OR status = ?2)
           ORDER BY created_at DESC, alert_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![identity_str, status], RawAlert::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_all(raws, "alert", RawAlert::into_alert))
  }

  // ── Evidence ──────────────────────────────────────────────────────────────

  async fn insert_evidence(&self, evidence: Evidence) -> Result<Evidence> {
    let id_str      = encode_uuid(evidence.evidence_id);
    let alert_str   = encode_uuid(evidence.alert_id);
    let reference   = evidence.reference.clone();
    let position    = i64::from(evidence.position);
    let created_str = encode_dt(evidence.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO alert_media (evidence_id, alert_id, reference, position, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, alert_str, reference, position, created_str],
        )?;
        Ok(())
      })
      .await?;

    self.changes.notify(ChangeEvent::Evidence);
    Ok(evidence)
  }

  async fn list_evidence(&self, alert_id: Option<Uuid>) -> Result<Vec<Evidence>> {
    let alert_str = alert_id.map(encode_uuid);
    let raws: Vec<RawEvidence> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVIDENCE_COLUMNS} FROM alert_media
           WHERE (?1 IS NULL OR alert_id = ?1)
           ORDER BY alert_id, position"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![alert_str], RawEvidence::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_all(raws, "evidence", RawEvidence::into_evidence))
  }

  // ── Identities ────────────────────────────────────────────────────────────

  async fn insert_identity(&self, identity: Identity) -> Result<Identity> {
    let id_str      = encode_uuid(identity.identity_id);
    let name        = identity.display_name.clone();
    let contact     = identity.contact.clone();
    let token       = normalize_token(&identity.token);
    let address     = identity.default_address.clone();
    let lat         = identity.default_location.map(|p| p.lat);
    let lng         = identity.default_location.map(|p| p.lng);
    let created_str = encode_dt(identity.created_at);
    let updated_str = encode_dt(identity.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identities (
             identity_id, display_name, contact, token, default_address,
             default_lat, default_lng, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            name,
            contact,
            token,
            address,
            lat,
            lng,
            created_str,
            updated_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(identity)
  }

  async fn update_identity(&self, identity: Identity) -> Result<Option<Identity>> {
    let id_str      = encode_uuid(identity.identity_id);
    let name        = identity.display_name.clone();
    let address     = identity.default_address.clone();
    let lat         = identity.default_location.map(|p| p.lat);
    let lng         = identity.default_location.map(|p| p.lng);
    let updated_str = encode_dt(identity.updated_at);

    // Contact and token are immutable once issued.
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE identities SET
             display_name = ?2, default_address = ?3, default_lat = ?4,
             default_lng = ?5, updated_at = ?6
           WHERE identity_id = ?1",
          rusqlite::params![id_str, name, address, lat, lng, updated_str],
        )?)
      })
      .await?;

    Ok((changed > 0).then_some(identity))
  }

  async fn delete_identity(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let (deleted, cascaded) = self
      .conn
      .call(move |conn| {
        let owned: i64 = conn.query_row(
          "SELECT COUNT(*) FROM alerts WHERE identity_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;
        let deleted = conn.execute(
          "DELETE FROM identities WHERE identity_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok((deleted, owned > 0))
      })
      .await?;

    if deleted > 0 && cascaded {
      self.changes.notify(ChangeEvent::Alert);
    }
    Ok(deleted > 0)
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    self.find_identity_where("identity_id", encode_uuid(id)).await
  }

  async fn find_identity_by_contact(&self, contact: String) -> Result<Option<Identity>> {
    self.find_identity_where("contact", contact).await
  }

  async fn find_identity_by_token(&self, token: String) -> Result<Option<Identity>> {
    self.find_identity_where("token", normalize_token(&token)).await
  }

  async fn list_identities(&self) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {IDENTITY_COLUMNS} FROM identities ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map([], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_all(raws, "identity", RawIdentity::into_identity))
  }

  // ── Change events ─────────────────────────────────────────────────────────

  fn changes(&self) -> &ChangeFeed { &self.changes }
}
