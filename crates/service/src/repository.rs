//! Repository over the product store.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{BatchRef, Sku};
use domain::{Aggregate, Product};
use storage::{ProductRecord, Transaction};

use crate::Result;

/// Loads and tracks products within one transaction.
///
/// Every product returned by a getter or passed to `add` is kept in the
/// seen collection so the unit of work can persist it and harvest its events.
#[async_trait]
pub trait Repository: Send {
    /// Loads a product by sku.
    async fn get_by_sku(&mut self, sku: &Sku) -> Result<Option<&mut Product>>;

    /// Loads the product holding the given batch.
    async fn get_by_batch_reference(&mut self, reference: &BatchRef) -> Result<Option<&mut Product>>;

    /// Starts tracking a new product.
    ///
    /// A product whose sku is already tracked replaces the tracked instance.
    fn add(&mut self, product: Product);

    /// Returns every product touched in this transaction, in first-touch order.
    fn seen(&self) -> &[Product];

    /// Mutable access to the touched products.
    fn seen_mut(&mut self) -> &mut [Product];
}

/// Repository backed by a storage transaction.
///
/// Acts as an identity map: loading the same sku twice returns the same
/// instance. Remembers the state each product was loaded with so only
/// changed products are written back.
pub struct StoreRepository<T: Transaction> {
    tx: T,
    seen: Vec<Product>,
    loaded: HashMap<Sku, serde_json::Value>,
}

impl<T: Transaction> StoreRepository<T> {
    /// Creates a repository over an open transaction.
    pub fn new(tx: T) -> Self {
        Self {
            tx,
            seen: Vec::new(),
            loaded: HashMap::new(),
        }
    }

    fn position(&self, sku: &Sku) -> Option<usize> {
        self.seen.iter().position(|p| p.sku() == sku)
    }

    /// Stages every seen product whose state differs from what was loaded.
    ///
    /// Returns the number of staged products.
    pub fn stage_changes(&mut self) -> Result<usize> {
        let mut staged = 0;
        for product in &self.seen {
            let state = serde_json::to_value(product)?;
            if self.loaded.get(product.sku()) == Some(&state) {
                continue;
            }

            self.tx.stage(ProductRecord::new(
                product.sku().clone(),
                product.version(),
                product.batch_refs(),
                state,
            ))?;
            staged += 1;
        }
        Ok(staged)
    }

    pub fn transaction_mut(&mut self) -> &mut T {
        &mut self.tx
    }

    pub fn transaction(&self) -> &T {
        &self.tx
    }
}

#[async_trait]
impl<T: Transaction> Repository for StoreRepository<T> {
    async fn get_by_sku(&mut self, sku: &Sku) -> Result<Option<&mut Product>> {
        if let Some(index) = self.position(sku) {
            return Ok(self.seen.get_mut(index));
        }

        let Some(record) = self.tx.get(sku).await? else {
            return Ok(None);
        };

        let product: Product = record.to_state()?;
        self.loaded.insert(sku.clone(), record.state);
        self.seen.push(product);
        Ok(self.seen.last_mut())
    }

    async fn get_by_batch_reference(&mut self, reference: &BatchRef) -> Result<Option<&mut Product>> {
        if let Some(index) = self
            .seen
            .iter()
            .position(|p| p.batch(reference).is_some())
        {
            return Ok(self.seen.get_mut(index));
        }

        let Some(sku) = self.tx.find_sku_by_batch_ref(reference).await? else {
            return Ok(None);
        };
        self.get_by_sku(&sku).await
    }

    fn add(&mut self, product: Product) {
        match self.position(product.sku()) {
            Some(index) => self.seen[index] = product,
            None => self.seen.push(product),
        }
    }

    fn seen(&self) -> &[Product] {
        &self.seen
    }

    fn seen_mut(&mut self) -> &mut [Product] {
        &mut self.seen
    }
}
