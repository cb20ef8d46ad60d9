//! Tiered matching of external field labels onto canonical attribute keys.
//!
//! Three tiers, first match wins: exact (normalized label equals an alias
//! verbatim), partial (substring containment either way), and word overlap
//! (at least two shared significant tokens). The alias table is data; the
//! tiers never branch on specific keys.

use serde::{Deserialize, Serialize};

use crate::{
  alias::AliasTable,
  normalize::{normalize_label, significant_tokens},
};

// ─── Result types ────────────────────────────────────────────────────────────

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
  Exact,
  Partial,
  WordOverlap,
}

/// A successful label → key resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMatch {
  pub fact_key: String,
  pub tier:     MatchTier,
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

/// An alias prepared for matching: the raw variant plus its token set.
struct PreparedAlias {
  raw:    String,
  tokens: Vec<String>,
}

struct PreparedEntry {
  fact_key: String,
  aliases:  Vec<PreparedAlias>,
}

/// Maps arbitrary external field labels to canonical attribute keys.
///
/// Construction walks the alias table once and precomputes the token sets
/// used by the word-overlap tier; matching itself allocates only for the
/// normalized input label.
pub struct FieldMatcher {
  entries: Vec<PreparedEntry>,
}

impl FieldMatcher {
  pub fn new(table: &AliasTable) -> Self {
    let entries = table
      .iter()
      .map(|entry| PreparedEntry {
        fact_key: entry.fact_key.clone(),
        aliases:  entry
          .labels
          .iter()
          .map(|label| PreparedAlias {
            raw:    label.clone(),
            tokens: significant_tokens(label),
          })
          .collect(),
      })
      .collect();
    Self { entries }
  }

  /// Matcher over the builtin alias table.
  pub fn with_builtin() -> Self { Self::new(&AliasTable::builtin()) }

  /// Resolve an external field label to an attribute key, or `None` if no
  /// tier matches.
  pub fn match_label(&self, label: &str) -> Option<FieldMatch> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
      return None;
    }

    // Tier 1: the normalized label equals an alias verbatim.
    for entry in &self.entries {
      if entry.aliases.iter().any(|a| a.raw == normalized) {
        tracing::debug!(label, fact_key = %entry.fact_key, "exact match");
        return Some(FieldMatch {
          fact_key: entry.fact_key.clone(),
          tier:     MatchTier::Exact,
        });
      }
    }

    // Tier 2: substring containment in either direction.
    for entry in &self.entries {
      if entry
        .aliases
        .iter()
        .any(|a| normalized.contains(&a.raw) || a.raw.contains(&normalized))
      {
        tracing::debug!(label, fact_key = %entry.fact_key, "partial match");
        return Some(FieldMatch {
          fact_key: entry.fact_key.clone(),
          tier:     MatchTier::Partial,
        });
      }
    }

    // Tier 3: at least two shared significant tokens with some alias.
    // Ties go to the highest overlap count, then to table order.
    let label_tokens = significant_tokens(label);
    let mut best: Option<(usize, &PreparedEntry)> = None;
    for entry in &self.entries {
      let overlap = entry
        .aliases
        .iter()
        .map(|a| {
          a.tokens
            .iter()
            .filter(|t| label_tokens.contains(t))
            .count()
        })
        .max()
        .unwrap_or(0);
      if overlap >= 2 && best.map_or(true, |(b, _)| overlap > b) {
        best = Some((overlap, entry));
      }
    }
    if let Some((overlap, entry)) = best {
      tracing::debug!(label, fact_key = %entry.fact_key, overlap, "word-overlap match");
      return Some(FieldMatch {
        fact_key: entry.fact_key.clone(),
        tier:     MatchTier::WordOverlap,
      });
    }

    tracing::debug!(label, "no match");
    None
  }
}

impl Default for FieldMatcher {
  fn default() -> Self { Self::with_builtin() }
}
