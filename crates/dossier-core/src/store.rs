//! The `FactStore` trait.
//!
//! Implemented by storage backends (e.g. `dossier-store-sqlite`). The
//! resolver, explanation builder, and HTTP layer depend on this
//! abstraction, not on any concrete backend.
//!
//! The contract carries the engine's invariants: at most one active fact
//! per key (a violation surfaces as `DuplicateActiveFact`), history is
//! append-only, and every write pairing a fact mutation with its ledger
//! entry is atomic per key. Writes on facts are guarded by an optimistic
//! compare-and-set on `updated_at`; losing writers see `VersionConflict`
//! and retry from a fresh read.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  candidate::DocumentRef,
  fact::{Fact, FactCategory, FactPatch, NewFact},
  history::{HistoryEntry, NewHistoryEntry},
};

/// Abstraction over a Dossier fact-store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`). Backend errors
/// must convert into the core taxonomy so the resolver can classify them.
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The active fact for a key, if any.
  fn get_fact<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Fact>, Self::Error>> + Send + 'a;

  /// All facts ordered by key. Active only unless `include_inactive`.
  fn list_facts(
    &self,
    category: Option<FactCategory>,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  /// The ledger for a key, newest first (`changed_at` desc, then `seq`
  /// desc). Fails with `FactNotFound` if the key has never existed.
  fn history<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + 'a;

  // ── Writes — resolver and user-edit paths only ────────────────────────

  /// Create a fact and its creation ledger entry in one atomic unit.
  /// Fails with `DuplicateActiveFact` if the key already has an active
  /// fact.
  fn create_fact(
    &self,
    input: NewFact,
    history: NewHistoryEntry,
  ) -> impl Future<Output = Result<(Fact, HistoryEntry), Self::Error>> + Send + '_;

  /// Apply a system-sourced patch and its ledger entry in one atomic
  /// unit, guarded by compare-and-set on the fact's `updated_at`. Fails
  /// with `VersionConflict` if another writer got there first.
  fn update_fact<'a>(
    &'a self,
    key: &'a str,
    expected_updated_at: DateTime<Utc>,
    patch: FactPatch,
    history: NewHistoryEntry,
  ) -> impl Future<Output = Result<(Fact, HistoryEntry), Self::Error>> + Send + 'a;

  /// Append a ledger entry for an attempt that left the fact untouched
  /// (suppressed or rejected candidates).
  fn append_history(
    &self,
    fact_id: Uuid,
    entry: NewHistoryEntry,
  ) -> impl Future<Output = Result<HistoryEntry, Self::Error>> + Send + '_;

  /// Apply a user edit: sets the value, confidence 1.0, bumps
  /// `edit_count`, records the editor, and appends a `user_edit` ledger
  /// entry — atomically. Editing to a normalized-equal value is a silent
  /// no-op. Fails with `FactNotFound` if the key is absent.
  fn apply_user_edit<'a>(
    &'a self,
    key: &'a str,
    new_value: &'a str,
    editor: &'a str,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Fact, Self::Error>> + Send + 'a;

  /// Mark a fact deprecated (facts are never deleted) and append a
  /// `deprecate` ledger entry. Fails with `FactNotFound` if absent.
  fn deprecate_fact<'a>(
    &'a self,
    key: &'a str,
    actor: &'a str,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Fact, Self::Error>> + Send + 'a;

  // ── Source documents ──────────────────────────────────────────────────

  /// Remember a document's display name for explanations. Upserts; a
  /// later batch may fill in a name that was previously unknown.
  fn register_document<'a>(
    &'a self,
    document: &'a DocumentRef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Look up a registered document by id.
  fn get_document(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Option<DocumentRef>, Self::Error>> + Send + '_;
}
