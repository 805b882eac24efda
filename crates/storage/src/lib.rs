pub mod error;
pub mod memory;
pub mod record;
pub mod store;
pub mod version;

pub use common::{BatchRef, Sku};
pub use error::{Result, StorageError};
pub use memory::{InMemoryProductStore, InMemoryTransaction};
pub use record::ProductRecord;
pub use store::{ProductStore, Transaction};
pub use version::Version;
