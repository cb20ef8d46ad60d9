//! Error taxonomy for `dossier-core`.
//!
//! Grouped the way callers handle them: validation errors are rejected
//! per-candidate before any write, `FactNotFound` surfaces to the caller,
//! conflict errors drive the resolver's retry loop, and the integrity
//! variants indicate a storage-layer defect rather than a recoverable
//! runtime condition.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation (pre-write, per-candidate) ─────────────────────────────

  #[error("confidence {0} is outside [0.0, 1.0]")]
  ConfidenceOutOfRange(f64),

  #[error("candidate for field {0:?} has an empty value")]
  EmptyValue(String),

  #[error(
    "candidate for field {field_name:?} references document {got}, but the \
     batch is for document {expected}"
  )]
  DocumentMismatch {
    field_name: String,
    expected:   Uuid,
    got:        Uuid,
  },

  // ── Not found ─────────────────────────────────────────────────────────

  #[error("no fact recorded for key {0:?}")]
  FactNotFound(String),

  // ── Concurrency ───────────────────────────────────────────────────────

  /// Another writer updated the fact between our read and our write.
  #[error("fact {key:?} was modified concurrently")]
  VersionConflict { key: String },

  #[error("resolution for key {key:?} abandoned after {attempts} conflicting writes")]
  RetriesExhausted { key: String, attempts: u32 },

  // ── Integrity (fatal by contract) ─────────────────────────────────────

  /// A second active fact would exist for a key that already has one.
  #[error("a second active fact would be created for key {0:?}")]
  DuplicateActiveFact(String),

  /// The append-only guarantee of the history ledger was violated.
  #[error("history ledger is append-only: {0}")]
  HistoryImmutable(String),

  // ── Infrastructure ────────────────────────────────────────────────────

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap an arbitrary backend error as a storage failure.
  pub fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(err))
  }

  /// True for errors raised by candidate validation, which drop a single
  /// candidate without touching its siblings.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::ConfidenceOutOfRange(_)
        | Self::EmptyValue(_)
        | Self::DocumentMismatch { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
