//! SQL schema for the Sentinela SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    identity_id      TEXT PRIMARY KEY,
    display_name     TEXT NOT NULL,
    contact          TEXT NOT NULL UNIQUE,             -- canonical E.164
    token            TEXT NOT NULL UNIQUE COLLATE NOCASE,
    default_address  TEXT,
    default_lat      REAL,
    default_lng      REAL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    alert_id      TEXT PRIMARY KEY,
    identity_id   TEXT NOT NULL REFERENCES identities(identity_id) ON DELETE CASCADE,
    lat           REAL NOT NULL,
    lng           REAL NOT NULL,
    address       TEXT NOT NULL,
    neighborhood  TEXT,
    status        TEXT NOT NULL,    -- 'ACTIVE' | 'EXPIRED' | 'RESOLVED'
    note          TEXT,
    created_at    TEXT NOT NULL,    -- ISO 8601 UTC
    updated_at    TEXT NOT NULL,
    expires_at    TEXT NOT NULL,
    resolved_at   TEXT,
    CHECK ((status = 'RESOLVED') = (resolved_at IS NOT NULL))
);

-- Evidence references only; no image bytes live in the database.
CREATE TABLE IF NOT EXISTS alert_media (
    evidence_id  TEXT PRIMARY KEY,
    alert_id     TEXT NOT NULL REFERENCES alerts(alert_id) ON DELETE CASCADE,
    reference    TEXT NOT NULL,
    position     INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS alerts_identity_idx ON alerts(identity_id);
CREATE INDEX IF NOT EXISTS alerts_status_idx   ON alerts(status);
CREATE INDEX IF NOT EXISTS alerts_created_idx  ON alerts(created_at);
CREATE INDEX IF NOT EXISTS media_alert_idx     ON alert_media(alert_id);

PRAGMA user_version = 1;
";
