//! Fan-out transport trait and implementations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::{DomainEvent, Event};

use crate::{Result, ServiceError};

/// Publishes events to other processes. Delivery is best-effort.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()>;
}

/// Serializes events and writes them to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(channel, event_type = event.event_type(), %payload, "publishing event");
        Ok(())
    }
}

/// A message captured by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channel: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<PublishedMessage>,
    failures_left: u32,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` publishes fail.
    pub fn fail_next(&self, count: u32) {
        self.state().failures_left = count;
    }

    /// Returns every message published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    /// Returns the payloads published to one channel.
    pub fn published_to(&self, channel: &str) -> Vec<serde_json::Value> {
        self.state()
            .published
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.payload.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_value(event)?;
        let mut state = self.state();

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(ServiceError::Publish(format!("channel {channel} unavailable")));
        }

        state.published.push(PublishedMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }
}
