//! Fact types — the canonical record the engine converges each attribute
//! key onto.
//!
//! Exactly zero or one fact with [`FactStatus::Active`] exists per key at
//! any time. Facts are mutated only by the conflict resolver (system path)
//! and the user-edit path, and are never deleted; retiring a fact means
//! marking it `deprecated`. Once `edit_count > 0` a fact is *protected*:
//! no system-sourced update may change its value or confidence again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of a canonical fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactStatus {
  Active,
  Deprecated,
  Merged,
}

// ─── Category ────────────────────────────────────────────────────────────────

/// Coarse classification derived from the attribute key, used for grouped
/// listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
  CompanyInfo,
  Legal,
  Location,
  Contact,
}

impl FactCategory {
  /// Derive the category for an attribute key.
  pub fn for_key(key: &str) -> Self {
    match key {
      "company_name" | "dba_name" => Self::CompanyInfo,
      "ein" | "tax_id" | "state_of_incorporation" => Self::Legal,
      "city" | "state" | "zip_code" => Self::Location,
      "phone" | "email" | "website" => Self::Contact,
      k if k.starts_with("address") => Self::Location,
      k if k.contains("incorporation") || k.contains("date") => Self::Legal,
      _ => Self::CompanyInfo,
    }
  }
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// The canonical, currently-authoritative value for one attribute key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
  pub fact_id:             Uuid,
  /// Unique among active facts, e.g. `company_name`, `ein`.
  pub fact_key:            String,
  pub value:               String,
  /// Trust in the value, `[0.0, 1.0]`. User edits always carry `1.0`.
  pub confidence:          f64,
  pub category:            FactCategory,
  pub source_document_id:  Option<Uuid>,
  pub source_candidate_id: Option<Uuid>,
  /// Store-assigned; never changes after creation.
  pub created_at:          DateTime<Utc>,
  /// Store-assigned on every applied write; doubles as the optimistic
  /// compare-and-set token for concurrent writers.
  pub updated_at:          DateTime<Utc>,
  pub last_edited_by:      Option<String>,
  /// Number of user edits. Monotonically non-decreasing; increases only
  /// through the user-edit path.
  pub edit_count:          u32,
  pub status:              FactStatus,
}

impl Fact {
  /// A user-edited fact is immune to system overwrites.
  pub fn is_protected(&self) -> bool { self.edit_count > 0 }
}

// ─── NewFact ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::FactStore::create_fact`].
/// `fact_id`, `created_at`, and `updated_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewFact {
  pub fact_key:            String,
  pub value:               String,
  pub confidence:          f64,
  pub category:            FactCategory,
  pub source_document_id:  Option<Uuid>,
  pub source_candidate_id: Option<Uuid>,
  pub last_edited_by:      Option<String>,
  pub edit_count:          u32,
}

impl NewFact {
  /// A system-created fact derived from an extraction, with no edits yet.
  pub fn from_extraction(
    fact_key: impl Into<String>,
    value: impl Into<String>,
    confidence: f64,
    source_document_id: Uuid,
    source_candidate_id: Uuid,
  ) -> Self {
    let fact_key = fact_key.into();
    let category = FactCategory::for_key(&fact_key);
    Self {
      fact_key,
      value: value.into(),
      confidence,
      category,
      source_document_id: Some(source_document_id),
      source_candidate_id: Some(source_candidate_id),
      last_edited_by: None,
      edit_count: 0,
    }
  }
}

// ─── FactPatch ───────────────────────────────────────────────────────────────

/// The fields a system-sourced update may change, applied through
/// [`crate::store::FactStore::update_fact`] under compare-and-set.
#[derive(Debug, Clone)]
pub struct FactPatch {
  pub value:               String,
  pub confidence:          f64,
  pub source_document_id:  Option<Uuid>,
  pub source_candidate_id: Option<Uuid>,
}
