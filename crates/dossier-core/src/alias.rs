//! The alias table: attribute key → known label variants.
//!
//! This is plain data, not logic. The matcher never special-cases a key;
//! extending coverage means adding rows here (or shipping a replacement
//! table from configuration) without touching the matching algorithm.
//! Variants are stored verbatim as they appear on real forms (spaced,
//! underscored, abbreviated) because the substring tier compares them
//! raw against the normalized label.

use serde::{Deserialize, Serialize};

// ─── Types ───────────────────────────────────────────────────────────────────

/// One attribute key and its ordered label variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasEntry {
  pub fact_key: String,
  pub labels:   Vec<String>,
}

/// Ordered key → variants mapping. Order is meaningful: earlier keys win
/// ties in the substring and word-overlap tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasTable {
  pub entries: Vec<AliasEntry>,
}

impl AliasTable {
  pub fn from_entries(entries: Vec<AliasEntry>) -> Self { Self { entries } }

  pub fn iter(&self) -> impl Iterator<Item = &AliasEntry> { self.entries.iter() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// The label variants seen across common company forms.
  pub fn builtin() -> Self {
    let entries = BUILTIN
      .iter()
      .map(|(key, labels)| AliasEntry {
        fact_key: (*key).to_owned(),
        labels:   labels.iter().map(|l| (*l).to_owned()).collect(),
      })
      .collect();
    Self { entries }
  }
}

// ─── Builtin data ────────────────────────────────────────────────────────────

#[rustfmt::skip]
const BUILTIN: &[(&str, &[&str])] = &[
  ("company_name", &[
    "company_name", "company name",
    "business_name", "business name",
    "legal_name", "legal name",
    "entity_name", "entity name",
    "name_of_company", "name of company",
    "company", "business", "entity",
  ]),
  ("dba_name", &[
    "dba", "dba_name", "dba name",
    "doing_business_as", "doing business as",
    "trade_name", "trade name",
    "fictitious_business_name", "fictitious business name",
  ]),
  ("ein", &[
    "ein",
    "employer_id",
    "tax_id", "tax id", "taxid",
    "federal_id", "federal id",
    "fein",
    "employer_identification_number",
    "federal_tax_id", "federal tax id",
  ]),
  ("address_line_1", &[
    "address",
    "street_address", "street address",
    "address_line_1", "address line 1",
    "address1",
    "street",
    "mailing_address", "mailing address",
    "physical_address", "physical address",
  ]),
  ("city", &[
    "city", "town", "municipality", "locality",
  ]),
  ("state", &[
    "state", "province", "state_province", "state province",
  ]),
  ("zip_code", &[
    "zip",
    "zip_code", "zip code",
    "postal_code", "postal code",
    "zipcode", "postalcode",
    "postal",
  ]),
  ("phone", &[
    "phone",
    "phone_number", "phone number",
    "telephone", "tel",
    "contact_phone", "contact phone",
    "phone_num", "phone num",
  ]),
  ("email", &[
    "email",
    "email_address", "email address",
    "e_mail", "e-mail",
    "email_addr", "email addr",
  ]),
  ("website", &[
    "website",
    "web_site", "web site",
    "url",
    "homepage",
  ]),
  ("incorporation_date", &[
    "incorporation_date", "incorporation date",
    "date_of_incorporation", "date of incorporation",
    "inc_date", "inc date",
    "date_incorporated", "date incorporated",
  ]),
  ("state_of_incorporation", &[
    "state_of_incorporation", "state of incorporation",
    "incorporation_state", "incorporation state",
    "inc_state", "inc state",
    "state_incorporated", "state incorporated",
    "incorporated_in", "incorporated in",
  ]),
];
