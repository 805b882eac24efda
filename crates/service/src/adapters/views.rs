//! Allocations read model.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{BatchRef, Sku};
use domain::OrderId;
use serde::{Deserialize, Serialize};

use crate::{Result, ServiceError};

/// One row of the allocations view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub order_id: OrderId,
    pub sku: Sku,
    pub batch_ref: BatchRef,
}

/// What a caller sees when asking where an order's lines went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub sku: Sku,
    pub batch_ref: BatchRef,
}

/// Denormalized view of current allocations, keyed by order.
///
/// Kept up to date by the `Allocated` and `Deallocated` event handlers.
/// Writes must be idempotent since those handlers are retried.
#[async_trait]
pub trait AllocationsReadModel: Send + Sync {
    /// Inserts a row unless an identical one exists.
    async fn add(&self, row: AllocationRow) -> Result<()>;

    /// Deletes every row for the order and sku.
    async fn remove(&self, order_id: &OrderId, sku: &Sku) -> Result<()>;

    /// Returns every row of an order.
    async fn allocations_for(&self, order_id: &OrderId) -> Result<Vec<AllocationRow>>;
}

/// Looks up where an order's lines are allocated.
pub async fn allocations(
    read_model: &dyn AllocationsReadModel,
    order_id: &OrderId,
) -> Result<Vec<AllocationSummary>> {
    Ok(read_model
        .allocations_for(order_id)
        .await?
        .into_iter()
        .map(|row| AllocationSummary {
            sku: row.sku,
            batch_ref: row.batch_ref,
        })
        .collect())
}

#[derive(Debug, Default)]
struct InMemoryViewState {
    rows: Vec<AllocationRow>,
    failures_left: u32,
}

/// In-memory allocations view.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAllocationsView {
    state: Arc<Mutex<InMemoryViewState>>,
}

impl InMemoryAllocationsView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` writes fail.
    pub fn fail_next(&self, count: u32) {
        self.state().failures_left = count;
    }

    /// Returns the total number of rows.
    pub fn row_count(&self) -> usize {
        self.state().rows.len()
    }

    fn check_failure(state: &mut InMemoryViewState) -> Result<()> {
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(ServiceError::ReadModel("view unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AllocationsReadModel for InMemoryAllocationsView {
    async fn add(&self, row: AllocationRow) -> Result<()> {
        let mut state = self.state();
        Self::check_failure(&mut state)?;

        if !state.rows.contains(&row) {
            state.rows.push(row);
        }
        Ok(())
    }

    async fn remove(&self, order_id: &OrderId, sku: &Sku) -> Result<()> {
        let mut state = self.state();
        Self::check_failure(&mut state)?;

        state
            .rows
            .retain(|row| !(&row.order_id == order_id && &row.sku == sku));
        Ok(())
    }

    async fn allocations_for(&self, order_id: &OrderId) -> Result<Vec<AllocationRow>> {
        Ok(self
            .state()
            .rows
            .iter()
            .filter(|row| &row.order_id == order_id)
            .cloned()
            .collect())
    }
}
