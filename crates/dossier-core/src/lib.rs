//! Core types and decision logic for the Dossier company-fact engine.
//!
//! This crate owns the reconciliation policy: how conflicting extracted
//! candidate values converge into one canonical fact per attribute key, how
//! every ingestion attempt lands in the append-only ledger, and how external
//! form labels map onto canonical attribute keys. It is deliberately free of
//! HTTP and database dependencies; storage backends implement
//! [`store::FactStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alias;
pub mod candidate;
pub mod error;
pub mod explain;
pub mod fact;
pub mod history;
pub mod matcher;
pub mod normalize;
pub mod resolve;
pub mod store;

pub use error::{Error, Result};
