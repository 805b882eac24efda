//! Allocation domain events.

use common::{BatchRef, Sku};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderId, OrderLine};

/// Events raised by the product aggregate or submitted by entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// An order line was allocated to a batch.
    Allocated(AllocatedData),

    /// An order line was taken off a batch whose quantity shrank.
    Deallocated(DeallocatedData),

    /// No batch could take an order line.
    OutOfStock(OutOfStockData),
}

/// Fieldless tag of an [`Event`], used as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Allocated,
    Deallocated,
    OutOfStock,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Allocated => "Allocated",
            EventKind::Deallocated => "Deallocated",
            EventKind::OutOfStock => "OutOfStock",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl DomainEvent for Event {
    fn event_type(&self) -> &'static str {
        self.kind().name()
    }
}

impl Event {
    /// Returns the routing tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Allocated(_) => EventKind::Allocated,
            Event::Deallocated(_) => EventKind::Deallocated,
            Event::OutOfStock(_) => EventKind::OutOfStock,
        }
    }

    /// Returns the sku the event is about.
    pub fn sku(&self) -> &Sku {
        match self {
            Event::Allocated(data) => &data.sku,
            Event::Deallocated(data) => &data.sku,
            Event::OutOfStock(data) => &data.sku,
        }
    }
}

/// Data for Allocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedData {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,

    /// The batch that received the line.
    pub batch_ref: BatchRef,
}

impl AllocatedData {
    /// Rebuilds the allocated order line.
    pub fn line(&self) -> OrderLine {
        OrderLine::new(self.order_id.clone(), self.sku.clone(), self.qty)
    }
}

/// Data for Deallocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeallocatedData {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

impl DeallocatedData {
    /// Rebuilds the removed order line.
    pub fn line(&self) -> OrderLine {
        OrderLine::new(self.order_id.clone(), self.sku.clone(), self.qty)
    }
}

/// Data for OutOfStock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStockData {
    pub sku: Sku,
}

// Helper constructors
impl Event {
    pub fn allocated(line: &OrderLine, batch_ref: BatchRef) -> Self {
        Event::Allocated(AllocatedData {
            order_id: line.order_id.clone(),
            sku: line.sku.clone(),
            qty: line.qty,
            batch_ref,
        })
    }

    pub fn deallocated(line: &OrderLine) -> Self {
        Event::Deallocated(DeallocatedData {
            order_id: line.order_id.clone(),
            sku: line.sku.clone(),
            qty: line.qty,
        })
    }

    pub fn out_of_stock(sku: impl Into<Sku>) -> Self {
        Event::OutOfStock(OutOfStockData { sku: sku.into() })
    }
}
