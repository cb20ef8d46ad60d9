//! Human-facing rationales for form auto-fill decisions.
//!
//! For each external field label, the builder runs the matcher, reads the
//! canonical fact, and emits a structured result with a sentence explaining
//! where the value came from and how much to trust it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  fact::Fact,
  matcher::{FieldMatcher, MatchTier},
  store::FactStore,
};

// ─── Result record ───────────────────────────────────────────────────────────

/// The fill decision for one external field label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillExplanation {
  /// The external label as received.
  pub label:                String,
  pub fact_key:             Option<String>,
  pub tier:                 Option<MatchTier>,
  pub value:                Option<String>,
  pub confidence:           f64,
  pub source_document_id:   Option<Uuid>,
  pub source_document_name: Option<String>,
  pub reason:               String,
  /// True when the label resolved to a known attribute key, even if no
  /// value is recorded for it yet.
  pub matched:              bool,
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Builds [`FillExplanation`]s from a matcher and a fact store.
pub struct ExplanationBuilder<'a, S> {
  matcher: &'a FieldMatcher,
  store:   &'a S,
}

impl<'a, S: FactStore> ExplanationBuilder<'a, S> {
  pub fn new(matcher: &'a FieldMatcher, store: &'a S) -> Self {
    Self { matcher, store }
  }

  /// Explain every label, preserving input order.
  pub async fn explain(&self, labels: &[String]) -> Result<Vec<FillExplanation>> {
    let mut results = Vec::with_capacity(labels.len());
    for label in labels {
      results.push(self.explain_one(label).await?);
    }
    Ok(results)
  }

  async fn explain_one(&self, label: &str) -> Result<FillExplanation> {
    let Some(hit) = self.matcher.match_label(label) else {
      return Ok(FillExplanation {
        label:                label.to_owned(),
        fact_key:             None,
        tier:                 None,
        value:                None,
        confidence:           0.0,
        source_document_id:   None,
        source_document_name: None,
        reason:               format!(
          "could not match label '{label}' to any known attribute"
        ),
        matched:              false,
      });
    };

    let Some(fact) = self
      .store
      .get_fact(&hit.fact_key)
      .await
      .map_err(Into::into)?
    else {
      return Ok(FillExplanation {
        label:                label.to_owned(),
        reason:               format!(
          "matched to '{}' but no value is recorded yet",
          hit.fact_key
        ),
        fact_key:             Some(hit.fact_key),
        tier:                 Some(hit.tier),
        value:                None,
        confidence:           0.0,
        source_document_id:   None,
        source_document_name: None,
        matched:              true,
      });
    };

    let source_document_name = match fact.source_document_id {
      Some(id) => self
        .store
        .get_document(id)
        .await
        .map_err(Into::into)?
        .and_then(|d| d.display_name),
      None => None,
    };

    let mut parts = vec![provenance_phrase(&fact)];
    if let Some(name) = &source_document_name {
      parts.push(format!("Source document: {name}"));
    }
    parts.push(confidence_phrase(fact.confidence));
    let reason = format!("{}.", parts.join(". "));

    Ok(FillExplanation {
      label: label.to_owned(),
      fact_key: Some(hit.fact_key),
      tier: Some(hit.tier),
      value: Some(fact.value.clone()),
      confidence: fact.confidence,
      source_document_id: fact.source_document_id,
      source_document_name,
      reason,
      matched: true,
    })
  }
}

// ─── Phrases ─────────────────────────────────────────────────────────────────

/// Whether the value was vouched for by a person or only by extraction.
fn provenance_phrase(fact: &Fact) -> String {
  match fact.edit_count {
    0 => "Automatically extracted from document".into(),
    1 => "Manually verified (edited once)".into(),
    n => format!("Manually verified (edited {n} times)"),
  }
}

/// Bucket label with the confidence rendered as a percentage.
fn confidence_phrase(confidence: f64) -> String {
  let bucket = if confidence >= 0.95 {
    "Very high confidence"
  } else if confidence >= 0.85 {
    "High confidence"
  } else if confidence >= 0.70 {
    "Moderate confidence"
  } else {
    "Low confidence"
  };
  format!("{bucket} ({:.0}%)", confidence * 100.0)
}
