//! Candidate values proposed by external extraction producers.
//!
//! Candidates are ephemeral: the engine consumes a batch, converges each
//! attribute key onto one canonical [`Fact`](crate::fact::Fact), and keeps
//! only the winning candidate's id as a source reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Extraction method ───────────────────────────────────────────────────────

/// How a candidate value was produced upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
  Ocr,
  LanguageModel,
  Manual,
}

// ─── Document reference ──────────────────────────────────────────────────────

/// Identity of the source document a batch of candidates came from.
///
/// The engine never sees document content; it records the id and an optional
/// display name so explanations can cite the source by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
  pub document_id:  Uuid,
  pub display_name: Option<String>,
}

// ─── Candidate ───────────────────────────────────────────────────────────────

/// One extracted value for one named attribute, as handed over by an
/// upstream producer (document reader, language model, OCR).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCandidate {
  pub candidate_id:       Uuid,
  pub source_document_id: Uuid,
  /// The attribute key this value is proposed for, e.g. `company_name`.
  pub field_name:         String,
  pub value:              String,
  /// Producer-reported confidence in `[0.0, 1.0]`.
  pub confidence:         f64,
  pub method:             ExtractionMethod,
  /// When the producer observed the value, not when the engine saw it.
  pub observed_at:        DateTime<Utc>,
}

impl ExtractedCandidate {
  /// Reject malformed candidates before any write. A failing candidate is
  /// dropped on its own; siblings in the same batch are unaffected.
  pub fn validate(&self, batch_document: Uuid) -> Result<()> {
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(Error::ConfidenceOutOfRange(self.confidence));
    }
    if self.value.trim().is_empty() {
      return Err(Error::EmptyValue(self.field_name.clone()));
    }
    if self.source_document_id != batch_document {
      return Err(Error::DocumentMismatch {
        field_name: self.field_name.clone(),
        expected:   batch_document,
        got:        self.source_document_id,
      });
    }
    Ok(())
  }
}
