//! Error type for `shajareh-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain invariant or workflow precondition failed. The inner error
  /// is propagated unmodified so callers can map it precisely.
  #[error(transparent)]
  Core(#[from] shajareh_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl shajareh_core::DomainError for Error {
  fn domain(&self) -> Option<&shajareh_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
