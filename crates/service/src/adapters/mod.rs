//! External collaborator traits and their in-process implementations.

pub mod notifications;
pub mod publisher;
pub mod views;

pub use notifications::{InMemoryNotifications, LogNotifications, Notifications, SentNotification};
pub use publisher::{EventPublisher, InMemoryPublisher, LogPublisher, PublishedMessage};
pub use views::{AllocationRow, AllocationSummary, AllocationsReadModel, InMemoryAllocationsView};
