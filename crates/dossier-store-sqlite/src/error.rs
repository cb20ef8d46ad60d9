//! Error type for `dossier-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),

  #[error("no fact recorded for key {0:?}")]
  FactNotFound(String),

  /// The one-active-fact-per-key index rejected an insert.
  #[error("an active fact already exists for key {0:?}")]
  DuplicateActiveFact(String),

  /// The compare-and-set guard matched no row: another writer won.
  #[error("fact {0:?} was modified concurrently")]
  VersionConflict(String),
}

/// Fold backend causes into the core taxonomy so the resolver can
/// classify conflicts and the API layer can map status codes.
impl From<Error> for dossier_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::FactNotFound(key) => Self::FactNotFound(key),
      Error::DuplicateActiveFact(key) => Self::DuplicateActiveFact(key),
      Error::VersionConflict(key) => Self::VersionConflict { key },
      Error::Database(e) => Self::storage(e),
      Error::Uuid(e) => Self::storage(e),
      other @ (Error::DateParse(_) | Error::Decode(_)) => {
        Self::Storage(other.to_string().into())
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
