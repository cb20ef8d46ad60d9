//! JSON REST API for Dossier.
//!
//! Exposes an axum [`Router`] backed by any [`dossier_core::store::FactStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", dossier_api::api_router(store.clone(), matcher.clone()))
//! ```

pub mod error;
pub mod facts;
pub mod fill;
pub mod ingest;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use dossier_core::{matcher::FieldMatcher, store::FactStore};

pub use error::ApiError;

/// Shared handler state: the fact store plus the label matcher.
pub struct AppState<S> {
  pub store:   Arc<S>,
  pub matcher: Arc<FieldMatcher>,
}

// Manual impl: `Arc` clones regardless of whether `S` does.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      matcher: Arc::clone(&self.matcher),
    }
  }
}

/// Build a fully-materialised API router for `store` and `matcher`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, matcher: Arc<FieldMatcher>) -> Router<()>
where
  S: FactStore + 'static,
{
  Router::new()
    // Ingestion
    .route("/ingest", post(ingest::handler::<S>))
    // Facts
    .route("/facts", get(facts::list::<S>))
    .route("/facts/{key}", get(facts::get_one::<S>).put(facts::edit_one::<S>))
    .route("/facts/{key}/history", get(facts::history_one::<S>))
    .route("/facts/{key}/deprecate", post(facts::deprecate_one::<S>))
    // Form fill
    .route("/fill", post(fill::handler::<S>))
    .with_state(AppState { store, matcher })
}
