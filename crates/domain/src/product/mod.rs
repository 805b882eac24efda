//! Product aggregate and related types.

mod aggregate;
mod batch;
mod commands;
mod events;
mod value_objects;

use std::collections::BTreeSet;

pub use aggregate::Product;
pub use batch::Batch;
pub use commands::*;
pub use events::{AllocatedData, DeallocatedData, Event, EventKind, OutOfStockData};
pub use value_objects::{OrderId, OrderLine};

use common::{BatchRef, Sku};
use thiserror::Error;

/// Errors that can occur during allocation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// No batch of the product can take the line.
    #[error("Out of stock for sku {sku}")]
    OutOfStock { sku: Sku },

    /// No batch of the product holds the line being deallocated.
    #[error("No order line {order_id}:{sku} in batches {}", join_skus(.batch_skus))]
    NoOrderInBatch {
        order_id: OrderId,
        sku: Sku,
        batch_skus: BTreeSet<Sku>,
    },

    /// The product has no batch with this reference.
    #[error("Unknown batch {reference}")]
    UnknownBatch { reference: BatchRef },

    /// A batch was added to a product with a different sku.
    #[error("Batch sku {actual} does not match product sku {expected}")]
    SkuMismatch { expected: Sku, actual: Sku },

    /// The product already holds a batch with this reference.
    #[error("Batch {reference} already exists")]
    DuplicateBatch { reference: BatchRef },
}

fn join_skus(skus: &BTreeSet<Sku>) -> String {
    let names: Vec<&str> = skus.iter().map(Sku::as_str).collect();
    format!("[{}]", names.join(", "))
}
