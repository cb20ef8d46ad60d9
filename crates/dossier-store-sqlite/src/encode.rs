//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated
//! lowercase strings, enums as their snake_case discriminants, and
//! confidences as REAL columns.

use chrono::{DateTime, Utc};
use dossier_core::{
  fact::{Fact, FactCategory, FactStatus},
  history::{ChangeType, HistoryEntry},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── FactCategory ────────────────────────────────────────────────────────────

pub fn encode_category(c: FactCategory) -> &'static str {
  match c {
    FactCategory::CompanyInfo => "company_info",
    FactCategory::Legal => "legal",
    FactCategory::Location => "location",
    FactCategory::Contact => "contact",
  }
}

pub fn decode_category(s: &str) -> Result<FactCategory> {
  match s {
    "company_info" => Ok(FactCategory::CompanyInfo),
    "legal" => Ok(FactCategory::Legal),
    "location" => Ok(FactCategory::Location),
    "contact" => Ok(FactCategory::Contact),
    other => Err(Error::Decode(format!("unknown fact category: {other:?}"))),
  }
}

// ─── FactStatus ──────────────────────────────────────────────────────────────

pub fn encode_status(s: FactStatus) -> &'static str {
  match s {
    FactStatus::Active => "active",
    FactStatus::Deprecated => "deprecated",
    FactStatus::Merged => "merged",
  }
}

pub fn decode_status(s: &str) -> Result<FactStatus> {
  match s {
    "active" => Ok(FactStatus::Active),
    "deprecated" => Ok(FactStatus::Deprecated),
    "merged" => Ok(FactStatus::Merged),
    other => Err(Error::Decode(format!("unknown fact status: {other:?}"))),
  }
}

// ─── ChangeType ──────────────────────────────────────────────────────────────

pub fn encode_change_type(c: ChangeType) -> &'static str {
  match c {
    ChangeType::Extraction => "extraction",
    ChangeType::UserEdit => "user_edit",
    ChangeType::SystemUpdate => "system_update",
    ChangeType::Merge => "merge",
    ChangeType::Deprecate => "deprecate",
  }
}

pub fn decode_change_type(s: &str) -> Result<ChangeType> {
  match s {
    "extraction" => Ok(ChangeType::Extraction),
    "user_edit" => Ok(ChangeType::UserEdit),
    "system_update" => Ok(ChangeType::SystemUpdate),
    "merge" => Ok(ChangeType::Merge),
    "deprecate" => Ok(ChangeType::Deprecate),
    other => Err(Error::Decode(format!("unknown change type: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `facts` row.
pub struct RawFact {
  pub fact_id:             String,
  pub fact_key:            String,
  pub value:               String,
  pub confidence:          f64,
  pub category:            String,
  pub source_document_id:  Option<String>,
  pub source_candidate_id: Option<String>,
  pub created_at:          String,
  pub updated_at:          String,
  pub last_edited_by:      Option<String>,
  pub edit_count:          i64,
  pub status:              String,
}

impl RawFact {
  pub fn into_fact(self) -> Result<Fact> {
    Ok(Fact {
      fact_id:             decode_uuid(&self.fact_id)?,
      fact_key:            self.fact_key,
      value:               self.value,
      confidence:          self.confidence,
      category:            decode_category(&self.category)?,
      source_document_id:  decode_opt_uuid(self.source_document_id.as_deref())?,
      source_candidate_id: decode_opt_uuid(self.source_candidate_id.as_deref())?,
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
      last_edited_by:      self.last_edited_by,
      edit_count:          self.edit_count as u32,
      status:              decode_status(&self.status)?,
    })
  }
}

/// Raw strings read directly from a `fact_history` row.
pub struct RawHistoryEntry {
  pub seq:                i64,
  pub entry_id:           String,
  pub fact_id:            String,
  pub change_type:        String,
  pub old_value:          Option<String>,
  pub new_value:          String,
  pub old_confidence:     Option<f64>,
  pub new_confidence:     Option<f64>,
  pub changed_by:         String,
  pub changed_at:         String,
  pub reason:             Option<String>,
  pub source_document_id: Option<String>,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      entry_id:           decode_uuid(&self.entry_id)?,
      seq:                self.seq,
      fact_id:            decode_uuid(&self.fact_id)?,
      change_type:        decode_change_type(&self.change_type)?,
      old_value:          self.old_value,
      new_value:          self.new_value,
      old_confidence:     self.old_confidence,
      new_confidence:     self.new_confidence,
      changed_by:         self.changed_by,
      changed_at:         decode_dt(&self.changed_at)?,
      reason:             self.reason,
      source_document_id: decode_opt_uuid(self.source_document_id.as_deref())?,
    })
  }
}
