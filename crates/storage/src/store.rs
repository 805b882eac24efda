use async_trait::async_trait;

use crate::{BatchRef, ProductRecord, Result, Sku};

/// Source of transactions over persisted products.
///
/// All implementations must be thread-safe (Send + Sync); each unit of work
/// begins its own transaction.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// The transaction type handed out by this store.
    type Transaction: Transaction;

    /// Begins a fresh transaction.
    async fn begin(&self) -> Result<Self::Transaction>;
}

/// A single storage transaction.
///
/// Reads are repeatable: the first read of a product is cached and later
/// reads in the same transaction return the same row. Writes are staged and
/// only become visible to other transactions on `commit`.
#[async_trait]
pub trait Transaction: Send {
    /// Loads the product row for a sku.
    async fn get(&mut self, sku: &Sku) -> Result<Option<ProductRecord>>;

    /// Finds the sku of the product holding the given batch.
    async fn find_sku_by_batch_ref(&mut self, reference: &BatchRef) -> Result<Option<Sku>>;

    /// Stages a row to be written on commit. A later stage for the same sku
    /// replaces the earlier one.
    fn stage(&mut self, record: ProductRecord) -> Result<()>;

    /// Atomically applies every staged row.
    ///
    /// Fails with `ConcurrencyConflict` if any staged row was written by
    /// another transaction after this one read it; nothing is applied then.
    async fn commit(&mut self) -> Result<()>;

    /// Discards every staged row and closes the transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Returns true until the transaction is committed or rolled back.
    fn is_open(&self) -> bool;
}
