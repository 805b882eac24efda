//! Production routing table.

use std::sync::Arc;

use domain::{CommandKind, EventKind};
use storage::ProductStore;

use crate::adapters::{
    AllocationsReadModel, EventPublisher, InMemoryAllocationsView, LogNotifications,
    LogPublisher, Notifications,
};
use crate::handlers::{
    AddAllocationToReadModel, AddBatch, AllocateLine, ChangeBatchQuantityHandler, DeallocateLine,
    PublishAllocatedEvent, Reallocate, RemoveAllocationFromReadModel, SendOutOfStockNotification,
};
use crate::messagebus::MessageBus;
use crate::retry::RetryPolicy;

/// Who hears about exhausted stock.
pub const DEFAULT_OUT_OF_STOCK_RECIPIENT: &str = "stock@made.com";

/// Channel receiving `Allocated` events.
pub const DEFAULT_ALLOCATED_CHANNEL: &str = "line_allocated";

/// External collaborators injected into the handlers.
#[derive(Clone)]
pub struct Collaborators {
    pub notifications: Arc<dyn Notifications>,
    pub publisher: Arc<dyn EventPublisher>,
    pub read_model: Arc<dyn AllocationsReadModel>,
    pub retry: RetryPolicy,
    pub out_of_stock_recipient: String,
    pub allocated_channel: String,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            notifications: Arc::new(LogNotifications),
            publisher: Arc::new(LogPublisher),
            read_model: Arc::new(InMemoryAllocationsView::new()),
            retry: RetryPolicy::default(),
            out_of_stock_recipient: DEFAULT_OUT_OF_STOCK_RECIPIENT.to_string(),
            allocated_channel: DEFAULT_ALLOCATED_CHANNEL.to_string(),
        }
    }
}

/// Builds the bus with every command and event handler registered.
pub fn bootstrap<S: ProductStore + 'static>(store: S, collaborators: Collaborators) -> MessageBus<S> {
    let Collaborators {
        notifications,
        publisher,
        read_model,
        retry,
        out_of_stock_recipient,
        allocated_channel,
    } = collaborators;

    MessageBus::builder(store)
        .command(CommandKind::CreateBatch, AddBatch)
        .command(CommandKind::Allocate, AllocateLine)
        .command(CommandKind::Deallocate, DeallocateLine::new(Arc::clone(&read_model)))
        .command(CommandKind::ChangeBatchQuantity, ChangeBatchQuantityHandler)
        .event(
            EventKind::Allocated,
            PublishAllocatedEvent::new(publisher, allocated_channel),
        )
        .event(
            EventKind::Allocated,
            AddAllocationToReadModel::new(Arc::clone(&read_model)),
        )
        .event(
            EventKind::Deallocated,
            RemoveAllocationFromReadModel::new(read_model),
        )
        .event(EventKind::Deallocated, Reallocate)
        .event(
            EventKind::OutOfStock,
            SendOutOfStockNotification::new(notifications, out_of_stock_recipient),
        )
        .retry_policy(retry)
        .build()
}
