//! Handler for `POST /fill` — explain how a set of external form labels
//! would be filled from the canonical facts.

use axum::{Json, extract::State};
use dossier_core::{
  explain::{ExplanationBuilder, FillExplanation},
  store::FactStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// JSON body accepted by `POST /fill`.
#[derive(Debug, Deserialize)]
pub struct FillBody {
  /// External field labels, e.g. the field names of a PDF form.
  pub labels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FillResponse {
  pub fields_requested: usize,
  /// Labels that resolved to a known attribute key.
  pub fields_matched:   usize,
  /// Labels with both a key and a recorded value.
  pub fields_filled:    usize,
  /// One result per label, in request order.
  pub results:          Vec<FillExplanation>,
}

/// `POST /fill`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<FillBody>,
) -> Result<Json<FillResponse>, ApiError>
where
  S: FactStore,
{
  let results = ExplanationBuilder::new(&state.matcher, state.store.as_ref())
    .explain(&body.labels)
    .await
    .map_err(ApiError::from_store)?;

  let fields_matched = results.iter().filter(|r| r.matched).count();
  let fields_filled = results.iter().filter(|r| r.value.is_some()).count();

  Ok(Json(FillResponse {
    fields_requested: body.labels.len(),
    fields_matched,
    fields_filled,
    results,
  }))
}
