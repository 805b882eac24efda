use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    BatchRef, ProductRecord, Result, Sku, StorageError, Version,
    store::{ProductStore, Transaction},
};

/// A committed row plus the number of times it has been written.
///
/// The revision always grows, unlike the aggregate version, so a product
/// whose version drifted back to an earlier value is still seen as changed.
#[derive(Debug, Clone)]
struct StoredRow {
    record: ProductRecord,
    revision: u64,
}

type Rows = Arc<RwLock<HashMap<Sku, StoredRow>>>;

/// In-memory product store implementation.
///
/// Provides the same transactional semantics as a database running at
/// repeatable-read isolation with an optimistic version check on write.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    rows: Rows,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed products.
    pub async fn product_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns the committed row for a sku, bypassing any transaction.
    pub async fn get_committed(&self, sku: &Sku) -> Option<ProductRecord> {
        self.rows.read().await.get(sku).map(|row| row.record.clone())
    }

    /// Returns how many times a sku's row has been written.
    pub async fn revision(&self, sku: &Sku) -> Option<u64> {
        self.rows.read().await.get(sku).map(|row| row.revision)
    }

    /// Removes every committed product.
    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            rows: Arc::clone(&self.rows),
            reads: HashMap::new(),
            staged: Vec::new(),
            open: true,
        })
    }
}

/// Transaction over an [`InMemoryProductStore`].
pub struct InMemoryTransaction {
    rows: Rows,
    /// First-read snapshot per sku; `None` records that the product was absent.
    reads: HashMap<Sku, Option<StoredRow>>,
    staged: Vec<ProductRecord>,
    open: bool,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(StorageError::TransactionClosed)
        }
    }

    /// Returns the number of rows waiting to be written.
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn get(&mut self, sku: &Sku) -> Result<Option<ProductRecord>> {
        self.ensure_open()?;

        if let Some(snapshot) = self.reads.get(sku) {
            return Ok(snapshot.as_ref().map(|row| row.record.clone()));
        }

        let snapshot = self.rows.read().await.get(sku).cloned();
        let record = snapshot.as_ref().map(|row| row.record.clone());
        self.reads.insert(sku.clone(), snapshot);
        Ok(record)
    }

    async fn find_sku_by_batch_ref(&mut self, reference: &BatchRef) -> Result<Option<Sku>> {
        self.ensure_open()?;

        if let Some(record) = self.staged.iter().find(|r| r.holds_batch(reference)) {
            return Ok(Some(record.sku.clone()));
        }

        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|row| row.record.holds_batch(reference))
            .map(|row| row.record.sku.clone()))
    }

    fn stage(&mut self, record: ProductRecord) -> Result<()> {
        self.ensure_open()?;

        if let Some(existing) = self.staged.iter_mut().find(|r| r.sku == record.sku) {
            *existing = record;
        } else {
            self.staged.push(record);
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;

        let mut rows = self.rows.write().await;

        // Validate every staged row before applying any of them
        for record in &self.staged {
            let current = rows.get(&record.sku);
            let read = self.reads.get(&record.sku).and_then(Option::as_ref);

            let conflict = match (read, current) {
                (Some(read), Some(current)) => read.revision != current.revision,
                (Some(_), None) => true,
                (None, Some(_)) => true,
                (None, None) => false,
            };

            if conflict {
                let expected = read.map(|r| r.record.version).unwrap_or(Version::initial());
                let actual = current
                    .map(|c| c.record.version)
                    .unwrap_or(Version::initial());

                metrics::counter!("storage_conflicts_total").increment(1);
                tracing::warn!(sku = %record.sku, %expected, %actual, "optimistic lock violation");

                return Err(StorageError::ConcurrencyConflict {
                    sku: record.sku.clone(),
                    expected,
                    actual,
                });
            }
        }

        let now = Utc::now();
        for mut record in self.staged.drain(..) {
            record.updated_at = now;
            let revision = rows.get(&record.sku).map_or(0, |row| row.revision) + 1;
            rows.insert(record.sku.clone(), StoredRow { record, revision });
        }

        self.open = false;
        metrics::counter!("storage_commits_total").increment(1);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;

        self.staged.clear();
        self.reads.clear();
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
