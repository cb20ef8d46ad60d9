//! History ledger types.
//!
//! Every change applied to a fact, and every ingestion attempt that was
//! suppressed or rejected, appends one immutable entry. Entries are never
//! edited or removed; ordering by `changed_at` (with `seq` as the stable
//! secondary key for equal timestamps) reconstructs a fact's full lineage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor name recorded on system-sourced ledger entries.
pub const SYSTEM_ACTOR: &str = "system";

// ─── ChangeType ──────────────────────────────────────────────────────────────

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
  /// An extraction created the fact, or attempted to and was not applied.
  Extraction,
  UserEdit,
  /// The system replaced the value or raised the confidence.
  SystemUpdate,
  /// Reserved: written by no current operation.
  Merge,
  Deprecate,
}

// ─── HistoryEntry ────────────────────────────────────────────────────────────

/// One immutable row in the audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub entry_id:           Uuid,
  /// Store-assigned monotonic sequence; breaks ties between entries with
  /// identical `changed_at`.
  pub seq:                i64,
  pub fact_id:            Uuid,
  pub change_type:        ChangeType,
  /// `None` for the entry recording a fact's creation.
  pub old_value:          Option<String>,
  pub new_value:          String,
  pub old_confidence:     Option<f64>,
  pub new_confidence:     Option<f64>,
  /// `"system"` or a user identifier.
  pub changed_by:         String,
  pub changed_at:         DateTime<Utc>,
  pub reason:             Option<String>,
  pub source_document_id: Option<Uuid>,
}

// ─── NewHistoryEntry ─────────────────────────────────────────────────────────

/// Input to a ledger append. `entry_id`, `seq`, `fact_id`, and `changed_at`
/// are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
  pub change_type:        ChangeType,
  pub old_value:          Option<String>,
  pub new_value:          String,
  pub old_confidence:     Option<f64>,
  pub new_confidence:     Option<f64>,
  pub changed_by:         String,
  pub reason:             Option<String>,
  pub source_document_id: Option<Uuid>,
}
