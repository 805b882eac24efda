//! Inbound consumer for the allocation service.
//!
//! Reads transport messages, translates them into commands and submits them
//! to the message bus built by [`service::bootstrap`].

pub mod config;
pub mod error;
pub mod inbound;

use std::sync::Arc;

use service::Collaborators;
use service::adapters::{InMemoryAllocationsView, LogNotifications, LogPublisher};

pub use config::{Config, LogFormat};
pub use error::{ConsumerError, Result};
pub use inbound::{
    CHANGE_BATCH_QUANTITY_CHANNEL, CREATE_BATCH_CHANNEL, ChangeBatchQuantityMessage,
    ConsumerStats, CreateBatchMessage, Envelope, LineOutcome, process_line, run, translate,
};

/// Builds the production collaborators described by `config`.
pub fn collaborators(config: &Config) -> Collaborators {
    Collaborators {
        notifications: Arc::new(LogNotifications),
        publisher: Arc::new(LogPublisher),
        read_model: Arc::new(InMemoryAllocationsView::new()),
        retry: config.retry_policy(),
        out_of_stock_recipient: config.stock_notification_recipient.clone(),
        allocated_channel: config.allocated_channel.clone(),
    }
}
