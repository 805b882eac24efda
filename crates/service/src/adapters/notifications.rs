//! Notification sender trait and implementations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{Result, ServiceError};

/// Sends human-readable notifications (email and the like).
#[async_trait]
pub trait Notifications: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifications;

#[async_trait]
impl Notifications for LogNotifications {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        tracing::info!(recipient, message, "sending notification");
        Ok(())
    }
}

/// A notification captured by [`InMemoryNotifications`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct InMemoryNotificationsState {
    sent: Vec<SentNotification>,
    failures_left: u32,
}

/// In-memory notification sender for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifications {
    state: Arc<Mutex<InMemoryNotificationsState>>,
}

impl InMemoryNotifications {
    /// Creates a new in-memory notification sender.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryNotificationsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next(&self, count: u32) {
        self.state().failures_left = count;
    }

    /// Returns every notification delivered so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.state().sent.clone()
    }
}

#[async_trait]
impl Notifications for InMemoryNotifications {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        let mut state = self.state();

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(ServiceError::Notification(format!(
                "mail server unavailable for {recipient}"
            )));
        }

        state.sent.push(SentNotification {
            recipient: recipient.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
