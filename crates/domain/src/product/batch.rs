//! Batch entity.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use common::{BatchRef, Sku};
use serde::{Deserialize, Serialize};

use super::OrderLine;

/// A lot of stock for one sku, optionally still in transit.
///
/// Two batches are the same entity when their references match, whatever
/// their quantities or allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    /// Arrival date; `None` means the stock is already in the warehouse.
    eta: Option<NaiveDate>,
    purchased_quantity: u32,
    /// Ordered so the serialized state is stable across reloads.
    allocations: BTreeSet<OrderLine>,
}

impl Batch {
    /// Creates a batch with no allocations.
    pub fn new(
        reference: impl Into<BatchRef>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            eta,
            purchased_quantity,
            allocations: BTreeSet::new(),
        }
    }

    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    /// Returns the lines currently allocated to this batch.
    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    /// Total quantity of every allocated line.
    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|line| i64::from(line.qty)).sum()
    }

    /// Purchased minus allocated. Negative only right after a quantity reduction.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    /// Returns true if the line matches this batch's sku and fits in what is left.
    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= i64::from(line.qty)
    }

    /// Returns true if the line is allocated to this batch.
    pub fn holds(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    /// Records the line against this batch.
    ///
    /// Returns false and changes nothing if the line does not fit or is already held.
    pub fn allocate(&mut self, line: OrderLine) -> bool {
        if self.holds(&line) || !self.can_allocate(&line) {
            return false;
        }
        self.allocations.insert(line)
    }

    /// Removes the line. Returns false if it was not held.
    pub fn deallocate(&mut self, line: &OrderLine) -> bool {
        self.allocations.remove(line)
    }

    /// Removes and returns the smallest allocated line.
    pub fn deallocate_one(&mut self) -> Option<OrderLine> {
        self.allocations.pop_first()
    }

    pub(crate) fn set_purchased_quantity(&mut self, qty: u32) {
        self.purchased_quantity = qty;
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}
