//! Service error types.

use common::{BatchRef, Sku};
use domain::AllocationError;
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while handling commands and events.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No product exists for the sku.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    /// No product holds a batch with this reference.
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchRef),

    /// A domain rule rejected the operation.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The storage layer failed, including optimistic-lock violations.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No handler is registered for the message.
    #[error("No handler registered for {0}")]
    UnhandledMessageKind(&'static str),

    /// Sending a notification failed.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Publishing to the fan-out transport failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Updating the read model failed.
    #[error("Read model error: {0}")]
    ReadModel(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Returns true if a concurrent transaction won the write.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, ServiceError::Storage(e) if e.is_concurrency_conflict())
    }

    /// Returns the sku when the failure is an out-of-stock rejection.
    pub fn out_of_stock_sku(&self) -> Option<&Sku> {
        match self {
            ServiceError::Allocation(AllocationError::OutOfStock { sku }) => Some(sku),
            _ => None,
        }
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
