//! Handlers for `/facts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/facts` | Optional `category`, `include_inactive` |
//! | `GET`  | `/facts/{key}` | Single active fact |
//! | `PUT`  | `/facts/{key}` | Body: [`EditFactBody`]; user edit, always wins |
//! | `GET`  | `/facts/{key}/history` | Full ledger, newest first |
//! | `POST` | `/facts/{key}/deprecate` | Body: [`DeprecateBody`] |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use dossier_core::{
  fact::{Fact, FactCategory},
  history::HistoryEntry,
  store::FactStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// If set, restrict to facts in this category (e.g. `legal`).
  pub category:         Option<FactCategory>,
  /// If `true`, also return deprecated and merged facts. Default `false`.
  #[serde(default)]
  pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct FactListResponse {
  pub facts: Vec<Fact>,
  pub total: usize,
}

/// `GET /facts[?category=...][&include_inactive=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<FactListResponse>, ApiError>
where
  S: FactStore,
{
  let facts = state
    .store
    .list_facts(params.category, params.include_inactive)
    .await
    .map_err(ApiError::from_store)?;

  let total = facts.len();
  Ok(Json(FactListResponse { facts, total }))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /facts/{key}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(key): Path<String>,
) -> Result<Json<Fact>, ApiError>
where
  S: FactStore,
{
  let fact = state
    .store
    .get_fact(&key)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("fact with key {key:?} not found")))?;
  Ok(Json(fact))
}

// ─── User edit ────────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /facts/{key}`.
#[derive(Debug, Deserialize)]
pub struct EditFactBody {
  pub value:     String,
  pub edited_by: String,
  pub reason:    Option<String>,
}

/// `PUT /facts/{key}` — apply a user edit. The edited fact becomes
/// protected against system overwrites.
pub async fn edit_one<S>(
  State(state): State<AppState<S>>,
  Path(key): Path<String>,
  Json(body): Json<EditFactBody>,
) -> Result<Json<Fact>, ApiError>
where
  S: FactStore,
{
  let fact = state
    .store
    .apply_user_edit(&key, &body.value, &body.edited_by, body.reason)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(fact))
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FactHistoryResponse {
  /// The active fact, if the key currently has one.
  pub fact:    Option<Fact>,
  /// Ledger entries, newest first.
  pub entries: Vec<HistoryEntry>,
}

/// `GET /facts/{key}/history`
pub async fn history_one<S>(
  State(state): State<AppState<S>>,
  Path(key): Path<String>,
) -> Result<Json<FactHistoryResponse>, ApiError>
where
  S: FactStore,
{
  let entries = state
    .store
    .history(&key)
    .await
    .map_err(ApiError::from_store)?;
  let fact = state
    .store
    .get_fact(&key)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(FactHistoryResponse { fact, entries }))
}

// ─── Deprecate ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeprecateBody {
  pub actor:  String,
  pub reason: Option<String>,
}

/// `POST /facts/{key}/deprecate` — retire a fact without deleting it.
pub async fn deprecate_one<S>(
  State(state): State<AppState<S>>,
  Path(key): Path<String>,
  Json(body): Json<DeprecateBody>,
) -> Result<Json<Fact>, ApiError>
where
  S: FactStore,
{
  let fact = state
    .store
    .deprecate_fact(&key, &body.actor, body.reason)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(fact))
}
