//! Error type for `sentinela-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row decoded cleanly but violates a domain invariant.
  #[error("malformed row: {0}")]
  Malformed(#[from] sentinela_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
