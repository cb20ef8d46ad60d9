//! Text canonicalisation for value equality and label matching.
//!
//! Two flavours: [`normalize_value`] makes extracted values comparable
//! without being fooled by case or spacing, and [`normalize_label`] /
//! [`significant_tokens`] prepare external field labels for the tiered
//! matcher. All functions are pure.

/// Tokens shorter than this never count toward word-level matching.
const MIN_TOKEN_LEN: usize = 3;

/// Connective words excluded from word-level matching. They still
/// participate in substring matching via the joined normalized label.
const STOPWORDS: &[&str] = &["a", "an", "and", "at", "for", "in", "of", "on", "the", "to"];

/// Canonicalise a fact value for equality checks: lowercase, trim, collapse
/// internal whitespace runs to single spaces.
pub fn normalize_value(s: &str) -> String {
  s.split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Canonicalise an external field label: lowercase, replace every
/// non-alphanumeric rune with a space, collapse, trim. The result is the
/// joined form used by the exact and substring match tiers.
pub fn normalize_label(s: &str) -> String {
  let mapped: String = s
    .to_lowercase()
    .chars()
    .map(|c| if c.is_alphanumeric() { c } else { ' ' })
    .collect();
  mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The tokens of a normalized label that qualify for word-level matching.
pub fn significant_tokens(s: &str) -> Vec<String> {
  normalize_label(s)
    .split_whitespace()
    .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOPWORDS.contains(t))
    .map(str::to_owned)
    .collect()
}
