//! SQLite backend for the Dossier fact store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Each write pairs the fact
//! mutation with its ledger entry in one transaction, and the ledger
//! table's append-only guarantee is enforced by RAISE(ABORT) triggers.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
