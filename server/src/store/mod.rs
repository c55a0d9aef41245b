//! The ticket ledger: a hierarchical path/value store.
//!
//! Every record the service owns lives under
//! `venues/{venue_id}/events/{dd-MM-yyyy}/{event_name}/...`. Backends persist
//! flattened leaves and reassemble subtrees on read, so a single `get` of a
//! day partition returns every event, ticket type and ticket filed under it.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod path;
pub mod postgres;
pub mod tree;

pub use memory::InMemoryLedger;
pub use path::{EventPath, LedgerPath};
pub use postgres::PgLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger database error")]
    Database(#[from] sqlx::Error),

    #[error("Malformed ledger record at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Ledger encoding error")]
    Encoding(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn malformed(path: &LedgerPath, reason: impl Into<String>) -> Self {
        LedgerError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Reads the subtree at `path`: a leaf, an assembled object, or `None`.
    async fn get(&self, path: &LedgerPath) -> Result<Option<Value>, LedgerError>;

    /// Replaces the subtree at `path`. `null` deletes it.
    async fn set(&self, path: &LedgerPath, value: Value) -> Result<(), LedgerError>;

    /// Immediate child names of `path`.
    async fn children(&self, path: &LedgerPath) -> Result<Vec<String>, LedgerError>;

    /// Replaces the subtree at `path` with `new` only if its current value
    /// equals `expected` (`None` meaning absent). Returns whether the write
    /// was applied.
    async fn compare_and_set(
        &self,
        path: &LedgerPath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool, LedgerError>;
}
