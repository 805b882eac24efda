//! Product aggregate implementation.

use std::collections::BTreeSet;

use common::{BatchRef, Sku};
use serde::{Deserialize, Serialize};
use storage::Version;

use crate::aggregate::Aggregate;

use super::{AllocationError, Batch, Event, OrderLine};

/// Product aggregate root.
///
/// Owns every batch of one sku. All allocation changes go through its
/// methods, which keep the batches consistent and record events for the
/// unit of work to pick up after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    sku: Sku,

    batches: Vec<Batch>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    #[serde(skip)]
    pending_events: Vec<Event>,
}

impl Aggregate for Product {
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn pending_events(&self) -> &[Event] {
        &self.pending_events
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending_events)
    }
}

// Query methods
impl Product {
    /// Creates a product with no batches.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self {
            sku: sku.into(),
            batches: Vec::new(),
            version: Version::initial(),
            pending_events: Vec::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns the batches in the order they were added.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns a batch by reference.
    pub fn batch(&self, reference: &BatchRef) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Returns the references of every batch.
    pub fn batch_refs(&self) -> Vec<BatchRef> {
        self.batches.iter().map(|b| b.reference().clone()).collect()
    }

    /// Returns the distinct skus present in this product's batches.
    pub fn batch_skus(&self) -> BTreeSet<Sku> {
        self.batches.iter().map(|b| b.sku().clone()).collect()
    }

    /// Returns the batch currently holding the line, if any.
    pub fn allocation_of(&self, line: &OrderLine) -> Option<&BatchRef> {
        self.batches
            .iter()
            .find(|b| b.holds(line))
            .map(Batch::reference)
    }
}

// Command methods (mutate and record events)
impl Product {
    /// Adds a batch of this product's sku.
    pub fn add_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        if batch.sku() != &self.sku {
            return Err(AllocationError::SkuMismatch {
                expected: self.sku.clone(),
                actual: batch.sku().clone(),
            });
        }

        if self.batch(batch.reference()).is_some() {
            return Err(AllocationError::DuplicateBatch {
                reference: batch.reference().clone(),
            });
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Allocates the line to the earliest batch that can take it.
    ///
    /// Batches without an eta come first, then by eta ascending. Batches with
    /// the same eta keep the order they were added in. A line already held by
    /// a batch is reported against that batch without any change.
    pub fn allocate(&mut self, line: OrderLine) -> Result<BatchRef, AllocationError> {
        if let Some(reference) = self.allocation_of(&line) {
            tracing::debug!(order_id = %line.order_id, sku = %line.sku, batch_ref = %reference, "line already allocated");
            return Ok(reference.clone());
        }

        let mut candidates: Vec<usize> = (0..self.batches.len()).collect();
        candidates.sort_by_key(|&i| self.batches[i].eta());

        let Some(index) = candidates
            .into_iter()
            .find(|&i| self.batches[i].can_allocate(&line))
        else {
            return Err(AllocationError::OutOfStock { sku: line.sku });
        };

        let batch = &mut self.batches[index];
        let reference = batch.reference().clone();
        let event = Event::allocated(&line, reference.clone());
        batch.allocate(line);

        self.version = self.version.next();
        self.pending_events.push(event);
        Ok(reference)
    }

    /// Removes the line from whichever batch holds it.
    pub fn deallocate(&mut self, line: &OrderLine) -> Result<BatchRef, AllocationError> {
        let Some(index) = self.batches.iter().position(|b| b.holds(line)) else {
            return Err(AllocationError::NoOrderInBatch {
                order_id: line.order_id.clone(),
                sku: line.sku.clone(),
                batch_skus: self.batch_skus(),
            });
        };

        let batch = &mut self.batches[index];
        batch.deallocate(line);
        let reference = batch.reference().clone();
        self.version = self.version.previous();
        Ok(reference)
    }

    /// Sets a batch's purchased quantity, shedding lines until it is no longer over-allocated.
    ///
    /// Each shed line is recorded as a `Deallocated` event. Lines are shed in
    /// ascending order of order id.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchRef,
        qty: u32,
    ) -> Result<(), AllocationError> {
        let Some(index) = self.batches.iter().position(|b| b.reference() == reference) else {
            return Err(AllocationError::UnknownBatch {
                reference: reference.clone(),
            });
        };

        let batch = &mut self.batches[index];
        batch.set_purchased_quantity(qty);
        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_one() else {
                break;
            };
            tracing::debug!(order_id = %line.order_id, batch_ref = %reference, "shedding over-allocated line");
            self.pending_events.push(Event::deallocated(&line));
        }

        Ok(())
    }
}
