//! Command and event handlers.
//!
//! The bus hands every handler a fresh unit of work. A handler loads the
//! product, calls one domain operation and commits.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Allocate, AllocationError, Batch, Command, Event, Product};
use storage::ProductStore;

use crate::adapters::{AllocationRow, AllocationsReadModel, EventPublisher, Notifications};
use crate::messagebus::{CommandHandler, CommandOutcome, EventHandler};
use crate::repository::Repository;
use crate::unit_of_work::UnitOfWork;
use crate::{Result, ServiceError};

fn unexpected_command(command: &Command) -> ServiceError {
    ServiceError::UnhandledMessageKind(command.name())
}

fn unexpected_event(event: &Event) -> ServiceError {
    ServiceError::UnhandledMessageKind(event.kind().name())
}

/// Registers a batch, creating the product on first sight of its sku.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddBatch;

#[async_trait]
impl<S: ProductStore> CommandHandler<S> for AddBatch {
    #[tracing::instrument(skip(self, uow))]
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let cmd = match command {
            Command::CreateBatch(cmd) => cmd,
            other => return Err(unexpected_command(&other)),
        };

        let products = uow.products();
        if products
            .get_by_batch_reference(&cmd.reference)
            .await?
            .is_some()
        {
            return Err(AllocationError::DuplicateBatch {
                reference: cmd.reference,
            }
            .into());
        }

        if products.get_by_sku(&cmd.sku).await?.is_none() {
            tracing::info!(sku = %cmd.sku, "creating product");
            products.add(Product::new(cmd.sku.clone()));
        }

        let Some(product) = products.get_by_sku(&cmd.sku).await? else {
            return Err(ServiceError::InvalidSku(cmd.sku));
        };
        product.add_batch(Batch::new(cmd.reference, cmd.sku, cmd.qty, cmd.eta))?;

        uow.commit().await?;
        Ok(CommandOutcome::BatchCreated)
    }
}

/// Allocates an order line against the product's batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocateLine;

#[async_trait]
impl<S: ProductStore> CommandHandler<S> for AllocateLine {
    #[tracing::instrument(skip(self, uow))]
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let cmd = match command {
            Command::Allocate(cmd) => cmd,
            other => return Err(unexpected_command(&other)),
        };

        let line = cmd.line();
        let Some(product) = uow.products().get_by_sku(&line.sku).await? else {
            return Err(ServiceError::InvalidSku(line.sku));
        };
        let batch_ref = product.allocate(line)?;

        uow.commit().await?;
        metrics::counter!("allocations_total").increment(1);
        tracing::info!(order_id = %cmd.order_id, %batch_ref, "line allocated");
        Ok(CommandOutcome::Allocated(batch_ref))
    }
}

/// Takes an order line off its batch and drops it from the read model.
pub struct DeallocateLine {
    read_model: Arc<dyn AllocationsReadModel>,
}

impl DeallocateLine {
    pub fn new(read_model: Arc<dyn AllocationsReadModel>) -> Self {
        Self { read_model }
    }
}

#[async_trait]
impl<S: ProductStore> CommandHandler<S> for DeallocateLine {
    #[tracing::instrument(skip(self, uow))]
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let cmd = match command {
            Command::Deallocate(cmd) => cmd,
            other => return Err(unexpected_command(&other)),
        };

        let line = cmd.line();
        let Some(product) = uow.products().get_by_sku(&line.sku).await? else {
            return Err(ServiceError::InvalidSku(line.sku));
        };
        let batch_ref = product.deallocate(&line)?;
        uow.commit().await?;

        // The deallocation is committed; a stale view row is only logged
        if let Err(err) = self.read_model.remove(&line.order_id, &line.sku).await {
            tracing::warn!(order_id = %line.order_id, error = %err, "failed to update allocations view");
        }
        Ok(CommandOutcome::Deallocated(batch_ref))
    }
}

/// Changes a batch's purchased quantity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeBatchQuantityHandler;

#[async_trait]
impl<S: ProductStore> CommandHandler<S> for ChangeBatchQuantityHandler {
    #[tracing::instrument(skip(self, uow))]
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let cmd = match command {
            Command::ChangeBatchQuantity(cmd) => cmd,
            other => return Err(unexpected_command(&other)),
        };

        let Some(product) = uow.products().get_by_batch_reference(&cmd.reference).await? else {
            return Err(ServiceError::BatchNotFound(cmd.reference));
        };
        product.change_batch_quantity(&cmd.reference, cmd.qty)?;

        uow.commit().await?;
        Ok(CommandOutcome::QuantityChanged)
    }
}

/// Publishes `Allocated` events to the fan-out transport.
pub struct PublishAllocatedEvent {
    publisher: Arc<dyn EventPublisher>,
    channel: String,
}

impl PublishAllocatedEvent {
    pub fn new(publisher: Arc<dyn EventPublisher>, channel: impl Into<String>) -> Self {
        Self {
            publisher,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl<S: ProductStore> EventHandler<S> for PublishAllocatedEvent {
    fn name(&self) -> &'static str {
        "publish_allocated_event"
    }

    #[tracing::instrument(skip(self, _uow), fields(channel = %self.channel))]
    async fn handle(&self, event: &Event, _uow: &mut UnitOfWork<S>) -> Result<()> {
        if !matches!(event, Event::Allocated(_)) {
            return Err(unexpected_event(event));
        }
        self.publisher.publish(&self.channel, event).await
    }
}

/// Inserts a row into the allocations view for each `Allocated` event.
pub struct AddAllocationToReadModel {
    read_model: Arc<dyn AllocationsReadModel>,
}

impl AddAllocationToReadModel {
    pub fn new(read_model: Arc<dyn AllocationsReadModel>) -> Self {
        Self { read_model }
    }
}

#[async_trait]
impl<S: ProductStore> EventHandler<S> for AddAllocationToReadModel {
    fn name(&self) -> &'static str {
        "add_allocation_to_read_model"
    }

    #[tracing::instrument(skip(self, _uow))]
    async fn handle(&self, event: &Event, _uow: &mut UnitOfWork<S>) -> Result<()> {
        let Event::Allocated(data) = event else {
            return Err(unexpected_event(event));
        };

        self.read_model
            .add(AllocationRow {
                order_id: data.order_id.clone(),
                sku: data.sku.clone(),
                batch_ref: data.batch_ref.clone(),
            })
            .await
    }
}

/// Deletes the allocations view row for each `Deallocated` event.
pub struct RemoveAllocationFromReadModel {
    read_model: Arc<dyn AllocationsReadModel>,
}

impl RemoveAllocationFromReadModel {
    pub fn new(read_model: Arc<dyn AllocationsReadModel>) -> Self {
        Self { read_model }
    }
}

#[async_trait]
impl<S: ProductStore> EventHandler<S> for RemoveAllocationFromReadModel {
    fn name(&self) -> &'static str {
        "remove_allocation_from_read_model"
    }

    #[tracing::instrument(skip(self, _uow))]
    async fn handle(&self, event: &Event, _uow: &mut UnitOfWork<S>) -> Result<()> {
        let Event::Deallocated(data) = event else {
            return Err(unexpected_event(event));
        };

        self.read_model.remove(&data.order_id, &data.sku).await
    }
}

/// Issues a fresh `Allocate` command for every shed order line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reallocate;

#[async_trait]
impl<S: ProductStore> EventHandler<S> for Reallocate {
    fn name(&self) -> &'static str {
        "reallocate"
    }

    #[tracing::instrument(skip(self, uow))]
    async fn handle(&self, event: &Event, uow: &mut UnitOfWork<S>) -> Result<()> {
        let Event::Deallocated(data) = event else {
            return Err(unexpected_event(event));
        };

        uow.enqueue(Allocate::from(data.line()));
        uow.commit().await
    }
}

/// Tells the stock team that a sku ran out.
pub struct SendOutOfStockNotification {
    notifications: Arc<dyn Notifications>,
    recipient: String,
}

impl SendOutOfStockNotification {
    pub fn new(notifications: Arc<dyn Notifications>, recipient: impl Into<String>) -> Self {
        Self {
            notifications,
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl<S: ProductStore> EventHandler<S> for SendOutOfStockNotification {
    fn name(&self) -> &'static str {
        "send_out_of_stock_notification"
    }

    #[tracing::instrument(skip(self, _uow))]
    async fn handle(&self, event: &Event, _uow: &mut UnitOfWork<S>) -> Result<()> {
        let Event::OutOfStock(data) = event else {
            return Err(unexpected_event(event));
        };

        let message = format!("Article {} is out of stock", data.sku);
        self.notifications.send(&self.recipient, &message).await
    }
}
