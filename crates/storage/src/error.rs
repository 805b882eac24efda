use thiserror::Error;

use crate::{Sku, Version};

/// Errors that can occur when interacting with the product store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another transaction wrote the product after this transaction read it.
    #[error(
        "Concurrency conflict for product {sku}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        sku: Sku,
        expected: Version,
        actual: Version,
    },

    /// The transaction was already committed or rolled back.
    #[error("Transaction is closed")]
    TransactionClosed,

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Returns true if this error is an optimistic-lock violation.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StorageError::ConcurrencyConflict { .. })
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
