//! [`SqliteStore`] — the SQLite implementation of [`FactStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use dossier_core::{
  candidate::DocumentRef,
  fact::{Fact, FactCategory, FactPatch, FactStatus, NewFact},
  history::{ChangeType, HistoryEntry, NewHistoryEntry},
  normalize::normalize_value,
  store::FactStore,
};

use crate::{
  Error, Result,
  encode::{
    RawFact, RawHistoryEntry, encode_category, encode_change_type, encode_dt,
    encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

/// The `facts` column list shared by every fact SELECT.
const FACT_COLUMNS: &str = "fact_id, fact_key, value, confidence, category, \
   source_document_id, source_candidate_id, created_at, updated_at, \
   last_edited_by, edit_count, status";

/// The `fact_history` column list shared by every ledger SELECT.
const HISTORY_COLUMNS: &str = "seq, entry_id, fact_id, change_type, \
   old_value, new_value, old_confidence, new_confidence, changed_by, \
   changed_at, reason, source_document_id";

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn raw_fact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFact> {
  Ok(RawFact {
    fact_id:             row.get(0)?,
    fact_key:            row.get(1)?,
    value:               row.get(2)?,
    confidence:          row.get(3)?,
    category:            row.get(4)?,
    source_document_id:  row.get(5)?,
    source_candidate_id: row.get(6)?,
    created_at:          row.get(7)?,
    updated_at:          row.get(8)?,
    last_edited_by:      row.get(9)?,
    edit_count:          row.get(10)?,
    status:              row.get(11)?,
  })
}

fn raw_history_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawHistoryEntry> {
  Ok(RawHistoryEntry {
    seq:                row.get(0)?,
    entry_id:           row.get(1)?,
    fact_id:            row.get(2)?,
    change_type:        row.get(3)?,
    old_value:          row.get(4)?,
    new_value:          row.get(5)?,
    old_confidence:     row.get(6)?,
    new_confidence:     row.get(7)?,
    changed_by:         row.get(8)?,
    changed_at:         row.get(9)?,
    reason:             row.get(10)?,
    source_document_id: row.get(11)?,
  })
}

/// Insert one ledger row inside an open transaction and return its `seq`.
///
/// `confidences` and `reason` arrive pre-encoded; `changed_at` is the same
/// instant as any paired fact write so the chain's terminal entry always
/// agrees with the live row.
#[allow(clippy::too_many_arguments)]
fn insert_history_row(
  tx: &rusqlite::Transaction<'_>,
  entry_id: &str,
  fact_id: &str,
  change_type: &str,
  old_value: Option<&str>,
  new_value: &str,
  old_confidence: Option<f64>,
  new_confidence: Option<f64>,
  changed_by: &str,
  changed_at: &str,
  reason: Option<&str>,
  source_document_id: Option<&str>,
) -> rusqlite::Result<i64> {
  tx.execute(
    "INSERT INTO fact_history (
       entry_id, fact_id, change_type, old_value, new_value,
       old_confidence, new_confidence, changed_by, changed_at,
       reason, source_document_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    rusqlite::params![
      entry_id,
      fact_id,
      change_type,
      old_value,
      new_value,
      old_confidence,
      new_confidence,
      changed_by,
      changed_at,
      reason,
      source_document_id,
    ],
  )?;
  Ok(tx.last_insert_rowid())
}

/// Map a unique-index violation on the active-key index to the domain
/// error; pass everything else through as a database failure.
fn map_create_err(key: &str, err: tokio_rusqlite::Error) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, _)) = &err
    && code.code == rusqlite::ErrorCode::ConstraintViolation
  {
    return Error::DuplicateActiveFact(key.to_owned());
  }
  Error::Database(err)
}

// ─── Closure result carriers ─────────────────────────────────────────────────

enum CasOutcome {
  Applied(RawFact, i64),
  Stale,
  Missing,
}

enum EditOutcome {
  Applied(RawFact),
  Unchanged(RawFact),
  Missing,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Dossier fact store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// writes for one key are serialized on the connection's worker thread,
/// and each fact write commits together with its ledger entry.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_fact(&self, key: &str) -> Result<Option<Fact>> {
    let key = key.to_owned();

    let raw: Option<RawFact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {FACT_COLUMNS} FROM facts
                 WHERE fact_key = ?1 AND status = 'active'"
              ),
              rusqlite::params![key],
              raw_fact_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFact::into_fact).transpose()
  }

  async fn list_facts(
    &self,
    category: Option<FactCategory>,
    include_inactive: bool,
  ) -> Result<Vec<Fact>> {
    let category_str = category.map(encode_category).map(str::to_owned);

    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut conds: Vec<&'static str> = vec![];
        if !include_inactive {
          conds.push("status = 'active'");
        }
        if category_str.is_some() {
          conds.push("category = ?1");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {FACT_COLUMNS} FROM facts {where_clause} ORDER BY fact_key"
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = if let Some(cat) = category_str {
          stmt
            .query_map(rusqlite::params![cat], raw_fact_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          stmt
            .query_map([], raw_fact_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFact::into_fact).collect()
  }

  async fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
    let key_owned = key.to_owned();

    let raws: Option<Vec<RawHistoryEntry>> = self
      .conn
      .call(move |conn| {
        let known: bool = conn
          .query_row(
            "SELECT 1 FROM facts WHERE fact_key = ?1 LIMIT 1",
            rusqlite::params![key_owned],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if !known {
          return Ok(None);
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLUMNS} FROM fact_history h
           WHERE h.fact_id IN (SELECT fact_id FROM facts WHERE fact_key = ?1)
           ORDER BY h.changed_at DESC, h.seq DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key_owned], raw_history_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    match raws {
      Some(rows) => rows.into_iter().map(RawHistoryEntry::into_entry).collect(),
      None => Err(Error::FactNotFound(key.to_owned())),
    }
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create_fact(
    &self,
    input: NewFact,
    history: NewHistoryEntry,
  ) -> Result<(Fact, HistoryEntry)> {
    let now = Utc::now();
    let fact = Fact {
      fact_id:             Uuid::new_v4(),
      fact_key:            input.fact_key,
      value:               input.value,
      confidence:          input.confidence,
      category:            input.category,
      source_document_id:  input.source_document_id,
      source_candidate_id: input.source_candidate_id,
      created_at:          now,
      updated_at:          now,
      last_edited_by:      input.last_edited_by,
      edit_count:          input.edit_count,
      status:              FactStatus::Active,
    };

    let entry_id = Uuid::new_v4();

    let fact_id_str     = encode_uuid(fact.fact_id);
    let fact_key        = fact.fact_key.clone();
    let value           = fact.value.clone();
    let confidence      = fact.confidence;
    let category_str    = encode_category(fact.category).to_owned();
    let source_doc_str  = fact.source_document_id.map(encode_uuid);
    let source_cand_str = fact.source_candidate_id.map(encode_uuid);
    let now_str         = encode_dt(now);
    let edited_by       = fact.last_edited_by.clone();
    let edit_count      = fact.edit_count as i64;
    let status_str      = encode_status(fact.status).to_owned();

    let entry_id_str    = encode_uuid(entry_id);
    let change_type_str = encode_change_type(history.change_type).to_owned();
    let h               = history.clone();
    let h_doc_str       = h.source_document_id.map(encode_uuid);

    let key_for_err = fact.fact_key.clone();

    let seq = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO facts (
             fact_id, fact_key, value, confidence, category,
             source_document_id, source_candidate_id, created_at, updated_at,
             last_edited_by, edit_count, status
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            fact_id_str,
            fact_key,
            value,
            confidence,
            category_str,
            source_doc_str,
            source_cand_str,
            now_str,
            now_str,
            edited_by,
            edit_count,
            status_str,
          ],
        )?;
        let seq = insert_history_row(
          &tx,
          &entry_id_str,
          &fact_id_str,
          &change_type_str,
          h.old_value.as_deref(),
          &h.new_value,
          h.old_confidence,
          h.new_confidence,
          &h.changed_by,
          &now_str,
          h.reason.as_deref(),
          h_doc_str.as_deref(),
        )?;
        tx.commit()?;
        Ok(seq)
      })
      .await
      .map_err(|e| map_create_err(&key_for_err, e))?;

    let entry = HistoryEntry {
      entry_id,
      seq,
      fact_id: fact.fact_id,
      change_type: history.change_type,
      old_value: history.old_value,
      new_value: history.new_value,
      old_confidence: history.old_confidence,
      new_confidence: history.new_confidence,
      changed_by: history.changed_by,
      changed_at: now,
      reason: history.reason,
      source_document_id: history.source_document_id,
    };

    Ok((fact, entry))
  }

  async fn update_fact(
    &self,
    key: &str,
    expected_updated_at: DateTime<Utc>,
    patch: FactPatch,
    history: NewHistoryEntry,
  ) -> Result<(Fact, HistoryEntry)> {
    let now = Utc::now();
    let entry_id = Uuid::new_v4();

    let key_owned       = key.to_owned();
    let value           = patch.value;
    let confidence      = patch.confidence;
    let source_doc_str  = patch.source_document_id.map(encode_uuid);
    let source_cand_str = patch.source_candidate_id.map(encode_uuid);
    let now_str         = encode_dt(now);
    let expected_str    = encode_dt(expected_updated_at);

    let entry_id_str    = encode_uuid(entry_id);
    let change_type_str = encode_change_type(history.change_type).to_owned();
    let h               = history.clone();
    let h_doc_str       = h.source_document_id.map(encode_uuid);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let rows = tx.execute(
          "UPDATE facts SET
             value = ?1, confidence = ?2,
             source_document_id = ?3, source_candidate_id = ?4,
             updated_at = ?5
           WHERE fact_key = ?6 AND status = 'active' AND updated_at = ?7",
          rusqlite::params![
            value,
            confidence,
            source_doc_str,
            source_cand_str,
            now_str,
            key_owned,
            expected_str,
          ],
        )?;

        if rows == 0 {
          let exists: bool = tx
            .query_row(
              "SELECT 1 FROM facts WHERE fact_key = ?1 AND status = 'active'",
              rusqlite::params![key_owned],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          return Ok(if exists { CasOutcome::Stale } else { CasOutcome::Missing });
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {FACT_COLUMNS} FROM facts
             WHERE fact_key = ?1 AND status = 'active'"
          ),
          rusqlite::params![key_owned],
          raw_fact_from_row,
        )?;

        let seq = insert_history_row(
          &tx,
          &entry_id_str,
          &raw.fact_id,
          &change_type_str,
          h.old_value.as_deref(),
          &h.new_value,
          h.old_confidence,
          h.new_confidence,
          &h.changed_by,
          &now_str,
          h.reason.as_deref(),
          h_doc_str.as_deref(),
        )?;
        tx.commit()?;
        Ok(CasOutcome::Applied(raw, seq))
      })
      .await?;

    match outcome {
      CasOutcome::Applied(raw, seq) => {
        let fact = raw.into_fact()?;
        let entry = HistoryEntry {
          entry_id,
          seq,
          fact_id: fact.fact_id,
          change_type: history.change_type,
          old_value: history.old_value,
          new_value: history.new_value,
          old_confidence: history.old_confidence,
          new_confidence: history.new_confidence,
          changed_by: history.changed_by,
          changed_at: now,
          reason: history.reason,
          source_document_id: history.source_document_id,
        };
        Ok((fact, entry))
      }
      CasOutcome::Stale => Err(Error::VersionConflict(key.to_owned())),
      CasOutcome::Missing => Err(Error::FactNotFound(key.to_owned())),
    }
  }

  async fn append_history(
    &self,
    fact_id: Uuid,
    entry: NewHistoryEntry,
  ) -> Result<HistoryEntry> {
    let now = Utc::now();
    let entry_id = Uuid::new_v4();

    let fact_id_str     = encode_uuid(fact_id);
    let entry_id_str    = encode_uuid(entry_id);
    let change_type_str = encode_change_type(entry.change_type).to_owned();
    let now_str         = encode_dt(now);
    let h               = entry.clone();
    let h_doc_str       = h.source_document_id.map(encode_uuid);

    let seq = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let seq = insert_history_row(
          &tx,
          &entry_id_str,
          &fact_id_str,
          &change_type_str,
          h.old_value.as_deref(),
          &h.new_value,
          h.old_confidence,
          h.new_confidence,
          &h.changed_by,
          &now_str,
          h.reason.as_deref(),
          h_doc_str.as_deref(),
        )?;
        tx.commit()?;
        Ok(seq)
      })
      .await?;

    Ok(HistoryEntry {
      entry_id,
      seq,
      fact_id,
      change_type: entry.change_type,
      old_value: entry.old_value,
      new_value: entry.new_value,
      old_confidence: entry.old_confidence,
      new_confidence: entry.new_confidence,
      changed_by: entry.changed_by,
      changed_at: now,
      reason: entry.reason,
      source_document_id: entry.source_document_id,
    })
  }

  async fn apply_user_edit(
    &self,
    key: &str,
    new_value: &str,
    editor: &str,
    reason: Option<String>,
  ) -> Result<Fact> {
    let now = Utc::now();

    let key_owned    = key.to_owned();
    let new_value    = new_value.to_owned();
    let editor_owned = editor.to_owned();
    let now_str      = encode_dt(now);
    let entry_id_str = encode_uuid(Uuid::new_v4());
    let reason_str   = reason.unwrap_or_else(|| "User edit".to_owned());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawFact> = tx
          .query_row(
            &format!(
              "SELECT {FACT_COLUMNS} FROM facts
               WHERE fact_key = ?1 AND status = 'active'"
            ),
            rusqlite::params![key_owned],
            raw_fact_from_row,
          )
          .optional()?;

        let Some(raw) = raw else {
          return Ok(EditOutcome::Missing);
        };

        // A redundant edit is a silent no-op: no ledger noise, no
        // edit_count bump, no protection change.
        if normalize_value(&raw.value) == normalize_value(&new_value) {
          return Ok(EditOutcome::Unchanged(raw));
        }

        tx.execute(
          "UPDATE facts SET
             value = ?1, confidence = 1.0,
             edit_count = edit_count + 1,
             last_edited_by = ?2, updated_at = ?3
           WHERE fact_key = ?4 AND status = 'active'",
          rusqlite::params![new_value, editor_owned, now_str, key_owned],
        )?;

        insert_history_row(
          &tx,
          &entry_id_str,
          &raw.fact_id,
          encode_change_type(ChangeType::UserEdit),
          Some(&raw.value),
          &new_value,
          Some(raw.confidence),
          Some(1.0),
          &editor_owned,
          &now_str,
          Some(&reason_str),
          None,
        )?;

        let updated = tx.query_row(
          &format!(
            "SELECT {FACT_COLUMNS} FROM facts
             WHERE fact_key = ?1 AND status = 'active'"
          ),
          rusqlite::params![key_owned],
          raw_fact_from_row,
        )?;
        tx.commit()?;
        Ok(EditOutcome::Applied(updated))
      })
      .await?;

    match outcome {
      EditOutcome::Applied(raw) | EditOutcome::Unchanged(raw) => raw.into_fact(),
      EditOutcome::Missing => Err(Error::FactNotFound(key.to_owned())),
    }
  }

  async fn deprecate_fact(
    &self,
    key: &str,
    actor: &str,
    reason: Option<String>,
  ) -> Result<Fact> {
    let now = Utc::now();

    let key_owned    = key.to_owned();
    let actor_owned  = actor.to_owned();
    let now_str      = encode_dt(now);
    let entry_id_str = encode_uuid(Uuid::new_v4());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawFact> = tx
          .query_row(
            &format!(
              "SELECT {FACT_COLUMNS} FROM facts
               WHERE fact_key = ?1 AND status = 'active'"
            ),
            rusqlite::params![key_owned],
            raw_fact_from_row,
          )
          .optional()?;

        let Some(raw) = raw else {
          return Ok(EditOutcome::Missing);
        };

        tx.execute(
          "UPDATE facts SET status = 'deprecated', updated_at = ?1
           WHERE fact_key = ?2 AND status = 'active'",
          rusqlite::params![now_str, key_owned],
        )?;

        insert_history_row(
          &tx,
          &entry_id_str,
          &raw.fact_id,
          encode_change_type(ChangeType::Deprecate),
          Some(&raw.value),
          &raw.value,
          Some(raw.confidence),
          Some(raw.confidence),
          &actor_owned,
          &now_str,
          reason.as_deref(),
          None,
        )?;

        let updated = tx.query_row(
          &format!("SELECT {FACT_COLUMNS} FROM facts WHERE fact_id = ?1"),
          rusqlite::params![raw.fact_id],
          raw_fact_from_row,
        )?;
        tx.commit()?;
        Ok(EditOutcome::Applied(updated))
      })
      .await?;

    match outcome {
      EditOutcome::Applied(raw) | EditOutcome::Unchanged(raw) => raw.into_fact(),
      EditOutcome::Missing => Err(Error::FactNotFound(key.to_owned())),
    }
  }

  // ── Source documents ──────────────────────────────────────────────────────

  async fn register_document(&self, document: &DocumentRef) -> Result<()> {
    let id_str = encode_uuid(document.document_id);
    let name   = document.display_name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO source_documents (document_id, display_name)
           VALUES (?1, ?2)
           ON CONFLICT(document_id) DO UPDATE
           SET display_name = COALESCE(excluded.display_name, display_name)",
          rusqlite::params![id_str, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_document(&self, document_id: Uuid) -> Result<Option<DocumentRef>> {
    let id_str = encode_uuid(document_id);

    let name: Option<Option<String>> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT display_name FROM source_documents WHERE document_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(name.map(|display_name| DocumentRef {
      document_id,
      display_name,
    }))
  }
}
