//! Error type for `stride-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] stride_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {kind}: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },
}

impl Error {
  /// Whether SQLite reported lock contention with another writer.
  pub fn is_busy(&self) -> bool {
    match self {
      Error::Sqlite(e) => sqlite_busy(e),
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => sqlite_busy(e),
      _ => false,
    }
  }
}

fn sqlite_busy(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
  )
}

impl From<Error> for stride_core::Error {
  fn from(e: Error) -> Self {
    if e.is_busy() {
      return stride_core::Error::TransientStorage(e.to_string());
    }
    match e {
      Error::Core(inner) => inner,
      Error::Json(inner) => stride_core::Error::Serialization(inner),
      other => stride_core::Error::Storage(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
