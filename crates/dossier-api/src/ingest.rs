//! Handler for `POST /ingest` — one batch of extracted candidates for a
//! single source document.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use dossier_core::{
  candidate::{DocumentRef, ExtractedCandidate, ExtractionMethod},
  resolve::{BatchOutcome, Resolver},
  store::FactStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// One candidate as submitted by the extraction pipeline.
#[derive(Debug, Deserialize)]
pub struct CandidateBody {
  pub field_name:   String,
  pub value:        String,
  pub confidence:   f64,
  pub method:       ExtractionMethod,
  /// Defaults to the time of ingestion.
  pub observed_at:  Option<DateTime<Utc>>,
  /// Defaults to a fresh id.
  pub candidate_id: Option<Uuid>,
}

/// JSON body accepted by `POST /ingest`.
#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub source_document_id:   Uuid,
  pub source_document_name: Option<String>,
  pub candidates:           Vec<CandidateBody>,
}

/// `POST /ingest` — resolve the batch and return what happened per key.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<IngestBody>,
) -> Result<Json<BatchOutcome>, ApiError>
where
  S: FactStore,
{
  let document = DocumentRef {
    document_id:  body.source_document_id,
    display_name: body.source_document_name,
  };

  let candidates = body
    .candidates
    .into_iter()
    .map(|c| ExtractedCandidate {
      candidate_id:       c.candidate_id.unwrap_or_else(Uuid::new_v4),
      source_document_id: body.source_document_id,
      field_name:         c.field_name,
      value:              c.value,
      confidence:         c.confidence,
      method:             c.method,
      observed_at:        c.observed_at.unwrap_or_else(Utc::now),
    })
    .collect();

  let outcome = Resolver::new(state.store.as_ref())
    .ingest_batch(&document, candidates)
    .await
    .map_err(ApiError::from_store)?;

  Ok(Json(outcome))
}
