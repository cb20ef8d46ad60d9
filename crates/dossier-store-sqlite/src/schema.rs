//! SQL schema for the Dossier SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Source documents are external; we keep only identity and display name
-- so explanations can cite them.
CREATE TABLE IF NOT EXISTS source_documents (
    document_id  TEXT PRIMARY KEY,
    display_name TEXT
);

CREATE TABLE IF NOT EXISTS facts (
    fact_id             TEXT PRIMARY KEY,
    fact_key            TEXT NOT NULL,
    value               TEXT NOT NULL,
    confidence          REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
    category            TEXT NOT NULL,   -- 'company_info' | 'legal' | 'location' | 'contact'
    source_document_id  TEXT,
    source_candidate_id TEXT,
    created_at          TEXT NOT NULL,   -- ISO 8601 UTC; store-assigned
    updated_at          TEXT NOT NULL,   -- compare-and-set token
    last_edited_by      TEXT,
    edit_count          INTEGER NOT NULL DEFAULT 0,
    status              TEXT NOT NULL DEFAULT 'active'  -- 'active' | 'deprecated' | 'merged'
);

-- At most one active fact per key, ever.
CREATE UNIQUE INDEX IF NOT EXISTS facts_active_key_idx
    ON facts(fact_key) WHERE status = 'active';

CREATE INDEX IF NOT EXISTS facts_category_idx ON facts(category, status);

-- The audit ledger. Strictly append-only: entries are never edited or
-- removed. `seq` is the stable secondary ordering key for entries that
-- share a `changed_at` timestamp.
CREATE TABLE IF NOT EXISTS fact_history (
    seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id            TEXT NOT NULL UNIQUE,
    fact_id             TEXT NOT NULL REFERENCES facts(fact_id),
    change_type         TEXT NOT NULL,   -- 'extraction' | 'user_edit' | 'system_update' | 'merge' | 'deprecate'
    old_value           TEXT,
    new_value           TEXT NOT NULL,
    old_confidence      REAL,
    new_confidence      REAL,
    changed_by          TEXT NOT NULL,
    changed_at          TEXT NOT NULL,
    reason              TEXT,
    source_document_id  TEXT
);

CREATE INDEX IF NOT EXISTS fact_history_fact_idx
    ON fact_history(fact_id, changed_at);

-- Any UPDATE or DELETE against the ledger is an integrity violation, not
-- a supported operation.
CREATE TRIGGER IF NOT EXISTS fact_history_no_update
BEFORE UPDATE ON fact_history
BEGIN
    SELECT RAISE(ABORT, 'fact_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS fact_history_no_delete
BEFORE DELETE ON fact_history
BEGIN
    SELECT RAISE(ABORT, 'fact_history is append-only');
END;

PRAGMA user_version = 1;
";
