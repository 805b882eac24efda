//! Message bus routing commands and events to their handlers.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use async_trait::async_trait;
use common::BatchRef;
use domain::{Command, CommandKind, Event, EventKind, Message};
use storage::ProductStore;
use uuid::Uuid;

use crate::retry::RetryPolicy;
use crate::unit_of_work::UnitOfWork;
use crate::{Result, ServiceError};

/// Result returned by a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    BatchCreated,
    Allocated(BatchRef),
    Deallocated(BatchRef),
    QuantityChanged,
}

impl CommandOutcome {
    /// Returns the batch reference carried by allocation outcomes.
    pub fn batch_ref(&self) -> Option<&BatchRef> {
        match self {
            CommandOutcome::Allocated(r) | CommandOutcome::Deallocated(r) => Some(r),
            _ => None,
        }
    }
}

/// Handles exactly one kind of command.
///
/// Errors propagate to the caller of [`MessageBus::handle`].
#[async_trait]
pub trait CommandHandler<S: ProductStore>: Send + Sync {
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome>;
}

/// Reacts to an event.
///
/// Handlers may be invoked more than once for the same event, each time
/// with a fresh unit of work, so they must be safe to re-run.
#[async_trait]
pub trait EventHandler<S: ProductStore>: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &Event, uow: &mut UnitOfWork<S>) -> Result<()>;
}

/// Assembles the routing table of a [`MessageBus`].
pub struct MessageBusBuilder<S: ProductStore> {
    store: S,
    command_handlers: HashMap<CommandKind, Box<dyn CommandHandler<S>>>,
    event_handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<S>>>>,
    retry: RetryPolicy,
}

impl<S: ProductStore + 'static> MessageBusBuilder<S> {
    /// Registers the handler for a command kind, replacing any earlier one.
    pub fn command(mut self, kind: CommandKind, handler: impl CommandHandler<S> + 'static) -> Self {
        if self
            .command_handlers
            .insert(kind, Box::new(handler))
            .is_some()
        {
            tracing::warn!(command = %kind, "replacing command handler");
        }
        self
    }

    /// Appends a handler for an event kind. Handlers run in registration order.
    pub fn event(mut self, kind: EventKind, handler: impl EventHandler<S> + 'static) -> Self {
        self.event_handlers
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> MessageBus<S> {
        MessageBus {
            store: self.store,
            command_handlers: self.command_handlers,
            event_handlers: self.event_handlers,
            retry: self.retry,
        }
    }
}

/// Routes messages through a single breadth-first processing loop.
///
/// The routing table is fixed at construction; `handle` takes `&self` and
/// the bus can be shared across tasks behind an `Arc`.
pub struct MessageBus<S: ProductStore> {
    store: S,
    command_handlers: HashMap<CommandKind, Box<dyn CommandHandler<S>>>,
    event_handlers: HashMap<EventKind, Vec<Box<dyn EventHandler<S>>>>,
    retry: RetryPolicy,
}

impl<S: ProductStore + 'static> MessageBus<S> {
    /// Starts a routing table over the given store.
    pub fn builder(store: S) -> MessageBusBuilder<S> {
        MessageBusBuilder {
            store,
            command_handlers: HashMap::new(),
            event_handlers: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Handles a message and everything it cascades into.
    ///
    /// Returns the outcome of every command processed, the submitted one
    /// first. Command failures abort processing and are returned; event
    /// handler failures are retried, then logged and skipped.
    pub async fn handle(&self, message: impl Into<Message>) -> Result<Vec<CommandOutcome>> {
        self.dispatch(message.into()).await
    }

    #[tracing::instrument(
        skip(self, message),
        fields(correlation_id = %Uuid::new_v4(), message = message.name())
    )]
    async fn dispatch(&self, message: Message) -> Result<Vec<CommandOutcome>> {
        let started = Instant::now();
        let mut queue = VecDeque::from([message]);
        let mut results = Vec::new();

        while let Some(message) = queue.pop_front() {
            metrics::counter!("messagebus_messages_total", "message" => message.name())
                .increment(1);

            match message {
                Message::Command(command) => {
                    let outcome = self.handle_command(command, &mut queue).await?;
                    results.push(outcome);
                }
                Message::Event(event) => self.handle_event(&event, &mut queue).await,
            }
        }

        metrics::histogram!("messagebus_handle_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(results)
    }

    async fn handle_command(
        &self,
        command: Command,
        queue: &mut VecDeque<Message>,
    ) -> Result<CommandOutcome> {
        let name = command.name();
        let handler = self
            .command_handlers
            .get(&command.kind())
            .ok_or(ServiceError::UnhandledMessageKind(name))?;

        tracing::debug!(command = name, "handling command");
        let mut uow = UnitOfWork::begin(&self.store).await?;
        let result = handler.handle(command, &mut uow).await;
        queue.extend(uow.collect_new_messages());

        if let Err(close_err) = uow.close().await {
            tracing::warn!(command = name, error = %close_err, "failed to close unit of work");
        }

        if let Err(err) = &result {
            tracing::info!(command = name, error = %err, "command failed");
        }
        result
    }

    async fn handle_event(&self, event: &Event, queue: &mut VecDeque<Message>) {
        let Some(handlers) = self.event_handlers.get(&event.kind()) else {
            tracing::debug!(event = %event.kind(), "no handlers for event");
            return;
        };

        for handler in handlers {
            let mut attempt = 1;
            loop {
                match self.run_event_handler(handler.as_ref(), event).await {
                    Ok(messages) => {
                        queue.extend(messages);
                        break;
                    }
                    Err(err) if self.retry.should_retry(attempt) => {
                        let delay = self.retry.delay_for_attempt(attempt);
                        metrics::counter!("messagebus_event_handler_retries_total", "handler" => handler.name())
                            .increment(1);
                        tracing::warn!(
                            handler = handler.name(),
                            event = %event.kind(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "event handler failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => {
                        metrics::counter!("messagebus_event_handler_failures_total", "handler" => handler.name())
                            .increment(1);
                        tracing::error!(
                            handler = handler.name(),
                            event = %event.kind(),
                            attempt,
                            error = %err,
                            "event handler failed, giving up"
                        );
                        break;
                    }
                }
            }
        }
    }

    async fn run_event_handler(
        &self,
        handler: &dyn EventHandler<S>,
        event: &Event,
    ) -> Result<Vec<Message>> {
        let mut uow = UnitOfWork::begin(&self.store).await?;
        let result = handler.handle(event, &mut uow).await;
        let messages = uow.collect_new_messages();
        uow.close().await?;
        result.map(|()| messages)
    }
}
