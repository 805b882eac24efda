//! Domain layer for order-line allocation.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for entities that collect pending events
//! - DomainEvent trait for domain events
//! - Product aggregate owning batches and their allocations
//! - Command, Event and Message sum types routed by the message bus

pub mod aggregate;
pub mod message;
pub mod product;

pub use aggregate::{Aggregate, DomainEvent};
pub use common::{BatchRef, Sku};
pub use message::Message;
pub use product::{
    Allocate, AllocatedData, AllocationError, Batch, ChangeBatchQuantity, Command, CommandKind,
    CreateBatch, Deallocate, DeallocatedData, Event, EventKind, OrderId, OrderLine,
    OutOfStockData, Product,
};
pub use storage::Version;
