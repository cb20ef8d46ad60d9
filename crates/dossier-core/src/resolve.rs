//! Conflict resolution: converging candidate values onto canonical facts.
//!
//! The policy, in priority order: user edits always win (a protected fact
//! is never overwritten by the system), a significantly higher confidence
//! wins, and when confidences are within the margin the newer observation
//! wins. Every attempt lands in the history ledger whether it was applied
//! or not, except a re-extraction that changes nothing at all.
//!
//! [`decide`] is the pure policy function; [`Resolver`] applies decisions
//! through a [`FactStore`] with per-key optimistic retries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  candidate::{DocumentRef, ExtractedCandidate},
  fact::{Fact, FactPatch, NewFact},
  history::{ChangeType, HistoryEntry, NewHistoryEntry, SYSTEM_ACTOR},
  normalize::normalize_value,
  store::FactStore,
};

/// Minimum confidence difference for one value to displace another.
pub const CONFIDENCE_MARGIN: f64 = 0.1;

/// How many times a key's resolution is retried after losing a write race.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

// ─── Decision ────────────────────────────────────────────────────────────────

/// What the policy says to do with the best candidate for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
  /// No fact exists for the key; create one.
  Create,
  /// Replace the fact's value and confidence.
  Replace { reason: String },
  /// Same value, higher confidence; refresh confidence only.
  RaiseConfidence { reason: String },
  /// The fact is user-protected; log the attempt, change nothing.
  Suppress { reason: String },
  /// The candidate loses; log the attempt, change nothing.
  Reject { reason: String },
  /// Same value, no confidence gain; nothing to record.
  NoChange,
}

/// The conflict-resolution policy, as a pure function of the existing fact
/// and the winning candidate for its key.
pub fn decide(existing: Option<&Fact>, candidate: &ExtractedCandidate) -> Decision {
  let Some(fact) = existing else {
    return Decision::Create;
  };

  if fact.is_protected() {
    return Decision::Suppress {
      reason: "update suppressed: fact is user-protected".into(),
    };
  }

  if normalize_value(&candidate.value) == normalize_value(&fact.value) {
    if candidate.confidence > fact.confidence {
      return Decision::RaiseConfidence {
        reason: format!(
          "same value re-extracted with higher confidence ({:.2} -> {:.2})",
          fact.confidence, candidate.confidence
        ),
      };
    }
    return Decision::NoChange;
  }

  let delta = candidate.confidence - fact.confidence;
  if delta > CONFIDENCE_MARGIN {
    Decision::Replace {
      reason: format!(
        "new value has significantly higher confidence ({:.2} vs {:.2})",
        candidate.confidence, fact.confidence
      ),
    }
  } else if delta < -CONFIDENCE_MARGIN {
    Decision::Reject {
      reason: format!(
        "existing value has significantly higher confidence ({:.2} vs {:.2})",
        fact.confidence, candidate.confidence
      ),
    }
  } else if candidate.observed_at > fact.updated_at {
    Decision::Replace {
      reason: format!(
        "confidence similar ({:.2} vs {:.2}), newer observation wins",
        candidate.confidence, fact.confidence
      ),
    }
  } else {
    Decision::Reject {
      reason: format!(
        "confidence similar ({:.2} vs {:.2}), existing value is newer",
        candidate.confidence, fact.confidence
      ),
    }
  }
}

// ─── Batch outcome ───────────────────────────────────────────────────────────

/// How a key's candidate was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Applied {
  Created,
  Replaced,
  ConfidenceRaised,
  /// Identical value with no confidence gain; no ledger entry written.
  Unchanged,
  /// The fact is user-protected; the attempt was logged and nothing changed.
  Suppressed,
  /// The candidate lost on confidence or recency; the attempt was logged.
  Rejected,
  /// The candidate was not applied at all (validation failure, storage
  /// failure, or retry exhaustion).
  Dropped { error: String },
}

/// Per-key result of a batch resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
  pub fact_key: String,
  pub outcome:  Applied,
  /// The fact as it stands after resolution; absent for dropped candidates.
  pub fact:     Option<Fact>,
  /// The ledger entry this resolution appended, if any.
  pub history:  Option<HistoryEntry>,
}

impl Resolution {
  fn dropped(fact_key: &str, error: String) -> Self {
    Self {
      fact_key: fact_key.to_owned(),
      outcome:  Applied::Dropped { error },
      fact:     None,
      history:  None,
    }
  }
}

/// Everything a single ingestion batch did, key by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
  pub source_document_id: Uuid,
  pub resolutions:        Vec<Resolution>,
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Applies the resolution policy to a store.
pub struct Resolver<'s, S> {
  store: &'s S,
}

impl<'s, S: FactStore> Resolver<'s, S> {
  pub fn new(store: &'s S) -> Self { Self { store } }

  /// Resolve one ingestion batch: all candidates extracted from a single
  /// source document.
  ///
  /// Candidates failing validation are dropped individually. Keys are
  /// resolved independently; a failure on one key never blocks the others.
  pub async fn ingest_batch(
    &self,
    document: &DocumentRef,
    candidates: Vec<ExtractedCandidate>,
  ) -> Result<BatchOutcome> {
    self
      .store
      .register_document(document)
      .await
      .map_err(Into::into)?;

    let mut resolutions = Vec::new();

    // Group by field name, preserving both first-arrival order of keys and
    // arrival order within a group (the stable tie-break).
    let mut groups: Vec<(String, Vec<ExtractedCandidate>)> = Vec::new();
    for candidate in candidates {
      if let Err(err) = candidate.validate(document.document_id) {
        tracing::warn!(
          field_name = %candidate.field_name,
          %err,
          "dropping invalid candidate"
        );
        resolutions.push(Resolution::dropped(&candidate.field_name, err.to_string()));
        continue;
      }
      match groups.iter_mut().find(|(key, _)| *key == candidate.field_name) {
        Some((_, group)) => group.push(candidate),
        None => groups.push((candidate.field_name.clone(), vec![candidate])),
      }
    }

    for (key, group) in groups {
      let best = select_best(group);
      resolutions.push(self.resolve_key(&key, best).await);
    }

    tracing::info!(
      source_document_id = %document.document_id,
      keys = resolutions.len(),
      "resolved ingestion batch"
    );

    Ok(BatchOutcome {
      source_document_id: document.document_id,
      resolutions,
    })
  }

  /// Resolve one key with bounded optimistic retries. Losing a write race
  /// (concurrent create or update) restarts from a fresh read; any other
  /// failure drops the candidate without affecting sibling keys.
  async fn resolve_key(&self, key: &str, candidate: ExtractedCandidate) -> Resolution {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      match self.try_resolve(key, &candidate).await {
        Ok(resolution) => return resolution,
        Err(Error::VersionConflict { .. } | Error::DuplicateActiveFact(_)) => {
          tracing::debug!(key, attempt, "lost a write race, retrying from a fresh read");
        }
        Err(err) => {
          tracing::warn!(key, %err, "dropping candidate after store failure");
          return Resolution::dropped(key, err.to_string());
        }
      }
    }

    let err = Error::RetriesExhausted {
      key:      key.to_owned(),
      attempts: MAX_WRITE_ATTEMPTS,
    };
    tracing::warn!(key, %err, "dropping candidate");
    Resolution::dropped(key, err.to_string())
  }

  async fn try_resolve(
    &self,
    key: &str,
    candidate: &ExtractedCandidate,
  ) -> Result<Resolution> {
    let existing = self.store.get_fact(key).await.map_err(Into::into)?;

    match decide(existing.as_ref(), candidate) {
      Decision::Create => {
        let input = NewFact::from_extraction(
          key,
          &candidate.value,
          candidate.confidence,
          candidate.source_document_id,
          candidate.candidate_id,
        );
        let entry = NewHistoryEntry {
          change_type:        ChangeType::Extraction,
          old_value:          None,
          new_value:          candidate.value.clone(),
          old_confidence:     None,
          new_confidence:     Some(candidate.confidence),
          changed_by:         SYSTEM_ACTOR.to_owned(),
          reason:             Some("initial extraction from document".into()),
          source_document_id: Some(candidate.source_document_id),
        };
        let (fact, history) = self
          .store
          .create_fact(input, entry)
          .await
          .map_err(Into::into)?;
        tracing::info!(key, value = %fact.value, "created fact");
        Ok(Resolution {
          fact_key: key.to_owned(),
          outcome:  Applied::Created,
          fact:     Some(fact),
          history:  Some(history),
        })
      }

      Decision::Replace { reason } => {
        let fact = existing.expect("replace decision implies an existing fact");
        let patch = FactPatch {
          value:               candidate.value.clone(),
          confidence:          candidate.confidence,
          source_document_id:  Some(candidate.source_document_id),
          source_candidate_id: Some(candidate.candidate_id),
        };
        let entry = NewHistoryEntry {
          change_type:        ChangeType::SystemUpdate,
          old_value:          Some(fact.value.clone()),
          new_value:          candidate.value.clone(),
          old_confidence:     Some(fact.confidence),
          new_confidence:     Some(candidate.confidence),
          changed_by:         SYSTEM_ACTOR.to_owned(),
          reason:             Some(reason.clone()),
          source_document_id: Some(candidate.source_document_id),
        };
        let (fact, history) = self
          .store
          .update_fact(key, fact.updated_at, patch, entry)
          .await
          .map_err(Into::into)?;
        tracing::info!(key, %reason, "replaced fact value");
        Ok(Resolution {
          fact_key: key.to_owned(),
          outcome:  Applied::Replaced,
          fact:     Some(fact),
          history:  Some(history),
        })
      }

      Decision::RaiseConfidence { reason } => {
        let fact = existing.expect("refresh decision implies an existing fact");
        let patch = FactPatch {
          value:               fact.value.clone(),
          confidence:          candidate.confidence,
          source_document_id:  fact.source_document_id,
          source_candidate_id: fact.source_candidate_id,
        };
        let entry = NewHistoryEntry {
          change_type:        ChangeType::SystemUpdate,
          old_value:          Some(fact.value.clone()),
          new_value:          fact.value.clone(),
          old_confidence:     Some(fact.confidence),
          new_confidence:     Some(candidate.confidence),
          changed_by:         SYSTEM_ACTOR.to_owned(),
          reason:             Some(reason.clone()),
          source_document_id: Some(candidate.source_document_id),
        };
        let (fact, history) = self
          .store
          .update_fact(key, fact.updated_at, patch, entry)
          .await
          .map_err(Into::into)?;
        tracing::info!(key, %reason, "raised fact confidence");
        Ok(Resolution {
          fact_key: key.to_owned(),
          outcome:  Applied::ConfidenceRaised,
          fact:     Some(fact),
          history:  Some(history),
        })
      }

      Decision::Suppress { reason } => {
        let fact = existing.expect("suppress decision implies an existing fact");
        let history = self
          .append_unapplied(&fact, candidate, reason.clone())
          .await?;
        tracing::info!(key, "suppressed update of user-protected fact");
        Ok(Resolution {
          fact_key: key.to_owned(),
          outcome:  Applied::Suppressed,
          fact:     Some(fact),
          history:  Some(history),
        })
      }

      Decision::Reject { reason } => {
        let fact = existing.expect("reject decision implies an existing fact");
        let history = self
          .append_unapplied(&fact, candidate, reason.clone())
          .await?;
        tracing::info!(key, %reason, "rejected candidate");
        Ok(Resolution {
          fact_key: key.to_owned(),
          outcome:  Applied::Rejected,
          fact:     Some(fact),
          history:  Some(history),
        })
      }

      Decision::NoChange => {
        let fact = existing.expect("no-change decision implies an existing fact");
        Ok(Resolution {
          fact_key: key.to_owned(),
          outcome:  Applied::Unchanged,
          fact:     Some(fact),
          history:  None,
        })
      }
    }
  }

  /// Record an extraction attempt that left the fact untouched, so every
  /// ingestion is auditable even when it has no visible effect.
  async fn append_unapplied(
    &self,
    fact: &Fact,
    candidate: &ExtractedCandidate,
    reason: String,
  ) -> Result<HistoryEntry> {
    let entry = NewHistoryEntry {
      change_type:        ChangeType::Extraction,
      old_value:          Some(fact.value.clone()),
      new_value:          candidate.value.clone(),
      old_confidence:     Some(fact.confidence),
      new_confidence:     Some(candidate.confidence),
      changed_by:         SYSTEM_ACTOR.to_owned(),
      reason:             Some(format!("extraction attempted but not applied: {reason}")),
      source_document_id: Some(candidate.source_document_id),
    };
    self
      .store
      .append_history(fact.fact_id, entry)
      .await
      .map_err(Into::into)
  }
}

/// Pick the winning candidate of a group: highest confidence, ties broken
/// by latest observation, then by arrival order (stable).
fn select_best(mut group: Vec<ExtractedCandidate>) -> ExtractedCandidate {
  let mut best = group.remove(0);
  for candidate in group {
    let better = candidate.confidence > best.confidence
      || (candidate.confidence == best.confidence
        && candidate.observed_at > best.observed_at);
    if better {
      best = candidate;
    }
  }
  best
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;
  use crate::{
    candidate::ExtractionMethod,
    fact::{FactCategory, FactStatus},
  };

  fn fact(value: &str, confidence: f64, edit_count: u32) -> Fact {
    Fact {
      fact_id:             Uuid::new_v4(),
      fact_key:            "company_name".into(),
      value:               value.into(),
      confidence,
      category:            FactCategory::CompanyInfo,
      source_document_id:  None,
      source_candidate_id: None,
      created_at:          Utc::now() - Duration::minutes(10),
      updated_at:          Utc::now() - Duration::minutes(10),
      last_edited_by:      None,
      edit_count,
      status:              FactStatus::Active,
    }
  }

  fn candidate(value: &str, confidence: f64) -> ExtractedCandidate {
    ExtractedCandidate {
      candidate_id:       Uuid::new_v4(),
      source_document_id: Uuid::new_v4(),
      field_name:         "company_name".into(),
      value:              value.into(),
      confidence,
      method:             ExtractionMethod::LanguageModel,
      observed_at:        Utc::now(),
    }
  }

  #[test]
  fn no_existing_fact_creates() {
    let c = candidate("Acme Corp", 0.88);
    assert_eq!(decide(None, &c), Decision::Create);
  }

  #[test]
  fn protected_fact_suppresses_everything() {
    let f = fact("Acme Corp Inc.", 1.0, 1);
    let c = candidate("ACME CORP", 0.99);
    assert!(matches!(decide(Some(&f), &c), Decision::Suppress { .. }));
  }

  #[test]
  fn identical_value_with_gain_raises_confidence() {
    let f = fact("Acme Corp", 0.80, 0);
    let c = candidate("  ACME   corp ", 0.92);
    assert!(matches!(
      decide(Some(&f), &c),
      Decision::RaiseConfidence { .. }
    ));
  }

  #[test]
  fn identical_value_without_gain_changes_nothing() {
    let f = fact("Acme Corp", 0.90, 0);
    assert_eq!(decide(Some(&f), &candidate("acme corp", 0.90)), Decision::NoChange);
    assert_eq!(decide(Some(&f), &candidate("acme corp", 0.75)), Decision::NoChange);
  }

  #[test]
  fn clearly_higher_confidence_replaces() {
    let f = fact("Acme Corp", 0.70, 0);
    let c = candidate("Acme Corporation", 0.85);
    assert!(matches!(decide(Some(&f), &c), Decision::Replace { reason }
      if reason.contains("significantly higher confidence")));
  }

  #[test]
  fn clearly_lower_confidence_rejects() {
    let f = fact("Acme Corp", 0.95, 0);
    let c = candidate("Acme Corporation", 0.60);
    assert!(matches!(decide(Some(&f), &c), Decision::Reject { reason }
      if reason.contains("significantly higher confidence")));
  }

  #[test]
  fn similar_confidence_newer_observation_wins() {
    // Delta 0.07 is within the margin; the candidate was observed after
    // the fact's last update, so it wins.
    let f = fact("Acme Corp", 0.88, 0);
    let c = candidate("Acme Corporation", 0.95);
    assert!(matches!(decide(Some(&f), &c), Decision::Replace { reason }
      if reason.contains("newer observation wins")));
  }

  #[test]
  fn similar_confidence_older_observation_loses() {
    let f = fact("Acme Corp", 0.88, 0);
    let mut c = candidate("Acme Corporation", 0.95);
    c.observed_at = f.updated_at - Duration::minutes(5);
    assert!(matches!(decide(Some(&f), &c), Decision::Reject { reason }
      if reason.contains("existing value is newer")));
  }

  #[test]
  fn margin_boundary_falls_to_recency_tie_break() {
    // |delta| exactly 0.1 is not "significantly higher"; recency decides.
    let f = fact("Acme Corp", 0.80, 0);
    let c = candidate("Acme Corporation", 0.90);
    assert!(matches!(decide(Some(&f), &c), Decision::Replace { reason }
      if reason.contains("newer observation wins")));
  }

  #[test]
  fn select_best_prefers_confidence_then_recency_then_arrival() {
    let older = Utc::now() - Duration::minutes(5);
    let newer = Utc::now();

    let mut a = candidate("first", 0.80);
    a.observed_at = older;
    let mut b = candidate("second", 0.90);
    b.observed_at = older;
    let mut c = candidate("third", 0.90);
    c.observed_at = newer;

    // Highest confidence with latest observation wins.
    let best = select_best(vec![a.clone(), b.clone(), c.clone()]);
    assert_eq!(best.value, "third");

    // Equal on both criteria: the earlier arrival is kept.
    let mut d = candidate("fourth", 0.90);
    d.observed_at = newer;
    let best = select_best(vec![c.clone(), d]);
    assert_eq!(best.value, "third");
  }
}
