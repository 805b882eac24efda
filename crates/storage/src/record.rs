use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{BatchRef, Sku, Version};

/// The persisted row of one product aggregate.
///
/// The aggregate itself is stored as opaque JSON in `state`; `version` and
/// `batch_refs` are kept alongside it as indexed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// The product this row belongs to.
    pub sku: Sku,

    /// The optimistic-concurrency token of the aggregate.
    pub version: Version,

    /// References of every batch held by the product, used for lookup by batch.
    pub batch_refs: Vec<BatchRef>,

    /// The serialized aggregate state.
    pub state: serde_json::Value,

    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates a new record.
    pub fn new(
        sku: Sku,
        version: Version,
        batch_refs: Vec<BatchRef>,
        state: serde_json::Value,
    ) -> Self {
        Self {
            sku,
            version,
            batch_refs,
            state,
            updated_at: Utc::now(),
        }
    }

    /// Creates a record by serializing an aggregate.
    pub fn from_state<T: Serialize>(
        sku: Sku,
        version: Version,
        batch_refs: Vec<BatchRef>,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(sku, version, batch_refs, serde_json::to_value(state)?))
    }

    /// Deserializes the aggregate held by this record.
    pub fn to_state<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state.clone())
    }

    /// Returns true if the product holds a batch with the given reference.
    pub fn holds_batch(&self, reference: &BatchRef) -> bool {
        self.batch_refs.iter().any(|r| r == reference)
    }
}
