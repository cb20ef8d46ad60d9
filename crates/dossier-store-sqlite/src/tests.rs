//! Integration tests for `SqliteStore` against an in-memory database,
//! driving the full resolution and explanation paths from `dossier-core`.

use chrono::{Duration, Utc};
use uuid::Uuid;

use dossier_core::{
  candidate::{DocumentRef, ExtractedCandidate, ExtractionMethod},
  explain::ExplanationBuilder,
  fact::{FactCategory, FactPatch, FactStatus, NewFact},
  history::{ChangeType, NewHistoryEntry, SYSTEM_ACTOR},
  matcher::FieldMatcher,
  resolve::{Applied, Resolver},
  store::FactStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn document() -> DocumentRef {
  DocumentRef {
    document_id:  Uuid::new_v4(),
    display_name: Some("articles_of_incorporation.pdf".into()),
  }
}

fn candidate(document: &DocumentRef, field: &str, value: &str, confidence: f64) -> ExtractedCandidate {
  ExtractedCandidate {
    candidate_id:       Uuid::new_v4(),
    source_document_id: document.document_id,
    field_name:         field.into(),
    value:              value.into(),
    confidence,
    method:             ExtractionMethod::LanguageModel,
    observed_at:        Utc::now(),
  }
}

fn extraction_entry(value: &str, confidence: f64, document: &DocumentRef) -> NewHistoryEntry {
  NewHistoryEntry {
    change_type:        ChangeType::Extraction,
    old_value:          None,
    new_value:          value.into(),
    old_confidence:     None,
    new_confidence:     Some(confidence),
    changed_by:         SYSTEM_ACTOR.into(),
    reason:             Some("initial extraction from document".into()),
    source_document_id: Some(document.document_id),
  }
}

// ─── Scenario A: first extraction creates the fact ───────────────────────────

#[tokio::test]
async fn first_extraction_creates_fact_with_ledger_entry() {
  let s = store().await;
  let doc = document();

  let outcome = Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.88)])
    .await
    .unwrap();

  assert_eq!(outcome.resolutions.len(), 1);
  let res = &outcome.resolutions[0];
  assert_eq!(res.outcome, Applied::Created);

  let fact = s.get_fact("company_name").await.unwrap().unwrap();
  assert_eq!(fact.value, "Acme Corp");
  assert_eq!(fact.confidence, 0.88);
  assert_eq!(fact.edit_count, 0);
  assert_eq!(fact.status, FactStatus::Active);
  assert_eq!(fact.category, FactCategory::CompanyInfo);
  assert_eq!(fact.source_document_id, Some(doc.document_id));

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].change_type, ChangeType::Extraction);
  assert_eq!(history[0].old_value, None);
  assert_eq!(history[0].new_value, "Acme Corp");
  assert_eq!(history[0].fact_id, fact.fact_id);
}

// ─── Scenario B: similar confidence, newer observation wins ──────────────────

#[tokio::test]
async fn similar_confidence_newer_observation_replaces() {
  let s = store().await;
  let doc = document();
  let resolver = Resolver::new(&s);

  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.88)])
    .await
    .unwrap();

  // Delta 0.07 is within the margin; the candidate is observed after the
  // fact's last update, so recency decides.
  let doc2 = document();
  let outcome = resolver
    .ingest_batch(&doc2, vec![candidate(
      &doc2,
      "company_name",
      "Acme Corporation",
      0.95,
    )])
    .await
    .unwrap();

  assert_eq!(outcome.resolutions[0].outcome, Applied::Replaced);

  let fact = s.get_fact("company_name").await.unwrap().unwrap();
  assert_eq!(fact.value, "Acme Corporation");
  assert_eq!(fact.confidence, 0.95);
  assert_eq!(fact.source_document_id, Some(doc2.document_id));

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 2);
  // Newest first.
  assert_eq!(history[0].change_type, ChangeType::SystemUpdate);
  assert_eq!(history[0].old_value.as_deref(), Some("Acme Corp"));
  assert_eq!(history[0].new_value, "Acme Corporation");
}

// ─── Scenario C: user edits protect the fact ─────────────────────────────────

#[tokio::test]
async fn user_edited_fact_suppresses_system_updates() {
  let s = store().await;
  let doc = document();
  let resolver = Resolver::new(&s);

  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.88)])
    .await
    .unwrap();

  s.apply_user_edit("company_name", "Acme Corp Inc.", "user_17", None)
    .await
    .unwrap();

  let outcome = resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "ACME CORP", 0.99)])
    .await
    .unwrap();
  assert_eq!(outcome.resolutions[0].outcome, Applied::Suppressed);

  // The fact is untouched.
  let fact = s.get_fact("company_name").await.unwrap().unwrap();
  assert_eq!(fact.value, "Acme Corp Inc.");
  assert_eq!(fact.confidence, 1.0);
  assert_eq!(fact.edit_count, 1);

  // The attempt is still on the ledger.
  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 3);
  assert_eq!(history[0].change_type, ChangeType::Extraction);
  assert_eq!(history[0].old_value.as_deref(), Some("Acme Corp Inc."));
  assert_eq!(history[0].new_value, "ACME CORP");
  assert!(
    history[0]
      .reason
      .as_deref()
      .unwrap()
      .contains("fact is user-protected")
  );
}

// ─── User edits ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_edit_sets_confidence_editor_and_count() {
  let s = store().await;
  let doc = document();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "ein", "12-3456789", 0.8)])
    .await
    .unwrap();

  let fact = s
    .apply_user_edit("ein", "98-7654321", "user_17", Some("typo in filing".into()))
    .await
    .unwrap();

  assert_eq!(fact.value, "98-7654321");
  assert_eq!(fact.confidence, 1.0);
  assert_eq!(fact.edit_count, 1);
  assert_eq!(fact.last_edited_by.as_deref(), Some("user_17"));
  assert!(fact.is_protected());

  let history = s.history("ein").await.unwrap();
  assert_eq!(history[0].change_type, ChangeType::UserEdit);
  assert_eq!(history[0].changed_by, "user_17");
  assert_eq!(history[0].reason.as_deref(), Some("typo in filing"));
  assert_eq!(history[0].new_confidence, Some(1.0));
}

#[tokio::test]
async fn redundant_user_edit_is_a_silent_noop() {
  let s = store().await;
  let doc = document();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.9)])
    .await
    .unwrap();

  // Differs only in case and spacing: no ledger entry, no protection.
  let fact = s
    .apply_user_edit("company_name", "  ACME   corp ", "user_17", None)
    .await
    .unwrap();

  assert_eq!(fact.value, "Acme Corp");
  assert_eq!(fact.edit_count, 0);
  assert!(!fact.is_protected());

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn user_edit_of_unknown_key_errors() {
  let s = store().await;
  let err = s
    .apply_user_edit("website", "https://acme.example", "user_17", None)
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::FactNotFound(_)));
}

// ─── Re-ingestion behaviour ──────────────────────────────────────────────────

#[tokio::test]
async fn identical_reingest_appends_nothing() {
  let s = store().await;
  let doc = document();
  let resolver = Resolver::new(&s);

  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.88)])
    .await
    .unwrap();
  let outcome = resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "acme corp", 0.80)])
    .await
    .unwrap();

  assert_eq!(outcome.resolutions[0].outcome, Applied::Unchanged);

  let fact = s.get_fact("company_name").await.unwrap().unwrap();
  assert_eq!(fact.value, "Acme Corp");
  assert_eq!(fact.confidence, 0.88);

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn identical_reingest_with_gain_raises_confidence_only() {
  let s = store().await;
  let doc = document();
  let resolver = Resolver::new(&s);

  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.80)])
    .await
    .unwrap();
  let outcome = resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "ACME CORP", 0.93)])
    .await
    .unwrap();

  assert_eq!(outcome.resolutions[0].outcome, Applied::ConfidenceRaised);

  let fact = s.get_fact("company_name").await.unwrap().unwrap();
  assert_eq!(fact.value, "Acme Corp");
  assert_eq!(fact.confidence, 0.93);

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].change_type, ChangeType::SystemUpdate);
  // The value did not change, only the confidence.
  assert_eq!(history[0].old_value.as_deref(), Some("Acme Corp"));
  assert_eq!(history[0].new_value, "Acme Corp");
  assert_eq!(history[0].old_confidence, Some(0.80));
  assert_eq!(history[0].new_confidence, Some(0.93));
}

#[tokio::test]
async fn lower_confidence_candidate_is_rejected_but_audited() {
  let s = store().await;
  let doc = document();
  let resolver = Resolver::new(&s);

  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.95)])
    .await
    .unwrap();
  let outcome = resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Inc", 0.60)])
    .await
    .unwrap();

  assert_eq!(outcome.resolutions[0].outcome, Applied::Rejected);

  let fact = s.get_fact("company_name").await.unwrap().unwrap();
  assert_eq!(fact.value, "Acme Corp");

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].change_type, ChangeType::Extraction);
  assert!(
    history[0]
      .reason
      .as_deref()
      .unwrap()
      .contains("extraction attempted but not applied")
  );
}

// ─── Batch behaviour ─────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_candidate_never_blocks_siblings() {
  let s = store().await;
  let doc = document();

  let outcome = Resolver::new(&s)
    .ingest_batch(&doc, vec![
      candidate(&doc, "company_name", "Acme Corp", 1.5), // out of range
      candidate(&doc, "ein", "12-3456789", 0.9),
    ])
    .await
    .unwrap();

  assert_eq!(outcome.resolutions.len(), 2);
  assert!(matches!(
    outcome.resolutions[0].outcome,
    Applied::Dropped { .. }
  ));
  assert_eq!(outcome.resolutions[1].outcome, Applied::Created);

  assert!(s.get_fact("company_name").await.unwrap().is_none());
  assert!(s.get_fact("ein").await.unwrap().is_some());
}

#[tokio::test]
async fn batch_converges_each_key_on_its_best_candidate() {
  let s = store().await;
  let doc = document();

  let mut low = candidate(&doc, "phone", "555-0100", 0.70);
  low.observed_at = Utc::now() - Duration::minutes(5);
  let high = candidate(&doc, "phone", "555-0199", 0.90);

  let outcome = Resolver::new(&s)
    .ingest_batch(&doc, vec![low, high])
    .await
    .unwrap();

  // One resolution per key, not per candidate.
  assert_eq!(outcome.resolutions.len(), 1);
  let fact = s.get_fact("phone").await.unwrap().unwrap();
  assert_eq!(fact.value, "555-0199");

  let history = s.history("phone").await.unwrap();
  assert_eq!(history.len(), 1);
}

// ─── Store invariants ────────────────────────────────────────────────────────

#[tokio::test]
async fn second_active_fact_for_a_key_is_rejected() {
  let s = store().await;
  let doc = document();

  let input = NewFact::from_extraction(
    "company_name",
    "Acme Corp",
    0.9,
    doc.document_id,
    Uuid::new_v4(),
  );
  s.create_fact(input.clone(), extraction_entry("Acme Corp", 0.9, &doc))
    .await
    .unwrap();

  let err = s
    .create_fact(input, extraction_entry("Acme Corp", 0.9, &doc))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::DuplicateActiveFact(_)));
}

#[tokio::test]
async fn stale_compare_and_set_surfaces_version_conflict() {
  let s = store().await;
  let doc = document();

  let (fact, _) = s
    .create_fact(
      NewFact::from_extraction("ein", "12-3456789", 0.8, doc.document_id, Uuid::new_v4()),
      extraction_entry("12-3456789", 0.8, &doc),
    )
    .await
    .unwrap();

  let patch = FactPatch {
    value:               "98-7654321".into(),
    confidence:          0.95,
    source_document_id:  Some(doc.document_id),
    source_candidate_id: None,
  };
  let entry = NewHistoryEntry {
    change_type:        ChangeType::SystemUpdate,
    old_value:          Some("12-3456789".into()),
    new_value:          "98-7654321".into(),
    old_confidence:     Some(0.8),
    new_confidence:     Some(0.95),
    changed_by:         SYSTEM_ACTOR.into(),
    reason:             None,
    source_document_id: None,
  };

  // A token that matches no row: some other writer has moved the fact on.
  let stale = fact.updated_at - Duration::seconds(30);
  let err = s
    .update_fact("ein", stale, patch, entry)
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::VersionConflict(_)));

  // The fact and its ledger are untouched.
  let unchanged = s.get_fact("ein").await.unwrap().unwrap();
  assert_eq!(unchanged.value, "12-3456789");
  assert_eq!(s.history("ein").await.unwrap().len(), 1);
}

#[tokio::test]
async fn ledger_rejects_update_and_delete() {
  let s = store().await;
  let doc = document();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.9)])
    .await
    .unwrap();

  let update_err = s
    .conn
    .call(|conn| {
      conn.execute("UPDATE fact_history SET new_value = 'tampered'", [])?;
      Ok(())
    })
    .await;
  assert!(update_err.is_err());

  let delete_err = s
    .conn
    .call(|conn| {
      conn.execute("DELETE FROM fact_history", [])?;
      Ok(())
    })
    .await;
  assert!(delete_err.is_err());

  // The ledger is intact.
  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].new_value, "Acme Corp");
}

#[tokio::test]
async fn history_of_unknown_key_errors() {
  let s = store().await;
  let err = s.history("company_name").await.unwrap_err();
  assert!(matches!(err, crate::Error::FactNotFound(_)));
}

#[tokio::test]
async fn history_is_ordered_newest_first() {
  let s = store().await;
  let doc = document();
  let resolver = Resolver::new(&s);

  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme", 0.5)])
    .await
    .unwrap();
  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.7)])
    .await
    .unwrap();
  resolver
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corporation", 0.9)])
    .await
    .unwrap();

  let history = s.history("company_name").await.unwrap();
  assert_eq!(history.len(), 3);
  assert!(history.windows(2).all(|w| w[0].seq > w[1].seq));
  assert_eq!(history[0].new_value, "Acme Corporation");
  assert_eq!(history[2].old_value, None);
}

// ─── Listing and deprecation ─────────────────────────────────────────────────

#[tokio::test]
async fn list_facts_filters_by_category_and_status() {
  let s = store().await;
  let doc = document();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![
      candidate(&doc, "company_name", "Acme Corp", 0.9),
      candidate(&doc, "ein", "12-3456789", 0.9),
      candidate(&doc, "phone", "555-0100", 0.9),
    ])
    .await
    .unwrap();

  let all = s.list_facts(None, false).await.unwrap();
  assert_eq!(all.len(), 3);
  // Ordered by key.
  assert_eq!(all[0].fact_key, "company_name");
  assert_eq!(all[1].fact_key, "ein");
  assert_eq!(all[2].fact_key, "phone");

  let legal = s.list_facts(Some(FactCategory::Legal), false).await.unwrap();
  assert_eq!(legal.len(), 1);
  assert_eq!(legal[0].fact_key, "ein");

  s.deprecate_fact("phone", "user_17", Some("line disconnected".into()))
    .await
    .unwrap();

  let active = s.list_facts(None, false).await.unwrap();
  assert_eq!(active.len(), 2);

  let with_inactive = s.list_facts(None, true).await.unwrap();
  assert_eq!(with_inactive.len(), 3);
}

#[tokio::test]
async fn deprecated_fact_is_retained_with_its_ledger() {
  let s = store().await;
  let doc = document();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "website", "https://acme.example", 0.9)])
    .await
    .unwrap();

  let fact = s
    .deprecate_fact("website", "user_17", None)
    .await
    .unwrap();
  assert_eq!(fact.status, FactStatus::Deprecated);

  // No longer visible as the active fact, but never deleted.
  assert!(s.get_fact("website").await.unwrap().is_none());

  let history = s.history("website").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].change_type, ChangeType::Deprecate);
  assert_eq!(history[0].changed_by, "user_17");
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn document_registry_upserts_display_names() {
  let s = store().await;
  let id = Uuid::new_v4();

  s.register_document(&DocumentRef { document_id: id, display_name: None })
    .await
    .unwrap();
  assert_eq!(
    s.get_document(id).await.unwrap().unwrap().display_name,
    None
  );

  // A later batch fills in the name; re-registering without one keeps it.
  s.register_document(&DocumentRef {
    document_id:  id,
    display_name: Some("w9.pdf".into()),
  })
  .await
  .unwrap();
  s.register_document(&DocumentRef { document_id: id, display_name: None })
    .await
    .unwrap();

  assert_eq!(
    s.get_document(id).await.unwrap().unwrap().display_name.as_deref(),
    Some("w9.pdf")
  );
}

// ─── Explanations ────────────────────────────────────────────────────────────

#[tokio::test]
async fn explanations_cover_matched_unmatched_and_empty() {
  let s = store().await;
  let doc = document();
  let matcher = FieldMatcher::with_builtin();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.88)])
    .await
    .unwrap();

  let labels = vec![
    "Company Name".to_owned(),
    "custom_field_xyz".to_owned(),
    "employer identification number".to_owned(),
  ];
  let results = ExplanationBuilder::new(&matcher, &s)
    .explain(&labels)
    .await
    .unwrap();

  assert_eq!(results.len(), 3);

  // Matched with a recorded value.
  let filled = &results[0];
  assert!(filled.matched);
  assert_eq!(filled.fact_key.as_deref(), Some("company_name"));
  assert_eq!(filled.value.as_deref(), Some("Acme Corp"));
  assert_eq!(filled.confidence, 0.88);
  assert_eq!(
    filled.source_document_name.as_deref(),
    Some("articles_of_incorporation.pdf")
  );
  assert_eq!(
    filled.reason,
    "Automatically extracted from document. \
     Source document: articles_of_incorporation.pdf. \
     High confidence (88%)."
  );

  // Unmatched label.
  let unmatched = &results[1];
  assert!(!unmatched.matched);
  assert_eq!(
    unmatched.reason,
    "could not match label 'custom_field_xyz' to any known attribute"
  );

  // Matched key with no recorded value yet.
  let empty = &results[2];
  assert!(empty.matched);
  assert_eq!(empty.fact_key.as_deref(), Some("ein"));
  assert_eq!(empty.value, None);
  assert_eq!(empty.reason, "matched to 'ein' but no value is recorded yet");
}

#[tokio::test]
async fn explanation_cites_manual_verification() {
  let s = store().await;
  let doc = document();
  let matcher = FieldMatcher::with_builtin();

  Resolver::new(&s)
    .ingest_batch(&doc, vec![candidate(&doc, "company_name", "Acme Corp", 0.88)])
    .await
    .unwrap();
  s.apply_user_edit("company_name", "Acme Corp Inc.", "user_17", None)
    .await
    .unwrap();

  let results = ExplanationBuilder::new(&matcher, &s)
    .explain(&["company name".to_owned()])
    .await
    .unwrap();

  let filled = &results[0];
  assert_eq!(filled.value.as_deref(), Some("Acme Corp Inc."));
  assert_eq!(filled.confidence, 1.0);
  assert!(filled.reason.starts_with("Manually verified (edited once)"));
  assert!(filled.reason.ends_with("Very high confidence (100%)."));
}
