//! Service layer for order-line allocation.
//!
//! Wires the product aggregate to storage through a unit of work and routes
//! commands and events through a single message bus:
//! - `UnitOfWork` owns one transaction and harvests aggregate events on commit
//! - `MessageBus` drains commands and cascading events breadth-first
//! - handlers orchestrate one domain operation each
//! - adapters define the external collaborators (notifications, publishing, read model)

pub mod adapters;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod messagebus;
pub mod repository;
pub mod retry;
pub mod unit_of_work;

pub use bootstrap::{Collaborators, bootstrap};
pub use error::{Result, ServiceError};
pub use messagebus::{CommandHandler, CommandOutcome, EventHandler, MessageBus, MessageBusBuilder};
pub use repository::{Repository, StoreRepository};
pub use retry::RetryPolicy;
pub use unit_of_work::UnitOfWork;
