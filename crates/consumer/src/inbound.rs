//! Inbound channel: translates transport messages into commands.
//!
//! The stream carries one JSON envelope per line:
//! `{"channel": "change_batch_quantity", "data": {"batchref": "b1", "qty": 5}}`.
//! Batches are registered on the `create_batch` channel:
//! `{"channel": "create_batch", "data": {"batchref": "b1", "sku": "LAMP", "qty": 20, "eta": null}}`.

use std::future::Future;

use chrono::NaiveDate;
use common::{BatchRef, Sku};
use domain::{ChangeBatchQuantity, Command, CreateBatch, Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service::{CommandOutcome, MessageBus};
use storage::ProductStore;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{ConsumerError, Result};

/// Channel carrying batch quantity changes.
pub const CHANGE_BATCH_QUANTITY_CHANNEL: &str = "change_batch_quantity";

/// Channel registering new batches.
pub const CREATE_BATCH_CHANNEL: &str = "create_batch";

/// One message as it arrives from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub data: Value,
}

/// Payload of the `change_batch_quantity` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantityMessage {
    pub batchref: BatchRef,
    pub qty: u32,
}

impl From<ChangeBatchQuantityMessage> for ChangeBatchQuantity {
    fn from(msg: ChangeBatchQuantityMessage) -> Self {
        ChangeBatchQuantity::new(msg.batchref, msg.qty)
    }
}

/// Payload of the `create_batch` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatchMessage {
    pub batchref: BatchRef,
    pub sku: Sku,
    pub qty: u32,
    #[serde(default)]
    pub eta: Option<NaiveDate>,
}

impl From<CreateBatchMessage> for CreateBatch {
    fn from(msg: CreateBatchMessage) -> Self {
        CreateBatch::new(msg.batchref, msg.sku, msg.qty, msg.eta)
    }
}

/// Turns an envelope into a command. Unknown channels yield `None`.
pub fn translate(envelope: Envelope) -> Result<Option<Command>> {
    match envelope.channel.as_str() {
        CHANGE_BATCH_QUANTITY_CHANNEL => {
            let msg: ChangeBatchQuantityMessage = serde_json::from_value(envelope.data)?;
            Ok(Some(ChangeBatchQuantity::from(msg).into()))
        }
        CREATE_BATCH_CHANNEL => {
            let msg: CreateBatchMessage = serde_json::from_value(envelope.data)?;
            Ok(Some(CreateBatch::from(msg).into()))
        }
        _ => Ok(None),
    }
}

/// What happened to one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Handled(Vec<CommandOutcome>),
    /// A re-allocation ran out of stock and the notification was triggered.
    OutOfStock,
    Ignored,
}

/// Counters reported when the stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub handled: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Parses, translates and submits one inbound line.
#[tracing::instrument(skip(bus, line))]
pub async fn process_line<S: ProductStore + 'static>(
    bus: &MessageBus<S>,
    line: &str,
) -> Result<LineOutcome> {
    let envelope: Envelope = serde_json::from_str(line)?;
    let channel = envelope.channel.clone();
    let Some(command) = translate(envelope)? else {
        tracing::warn!(%channel, "ignoring message on unknown channel");
        return Ok(LineOutcome::Ignored);
    };

    match bus.handle(command).await {
        Ok(outcomes) => Ok(LineOutcome::Handled(outcomes)),
        Err(err) => {
            let Some(sku) = err.out_of_stock_sku().cloned() else {
                return Err(err.into());
            };
            tracing::info!(%sku, "re-allocation out of stock");
            bus.handle(Event::out_of_stock(sku)).await?;
            Ok(LineOutcome::OutOfStock)
        }
    }
}

/// Consumes the stream until EOF or until `shutdown` resolves.
///
/// A bad message is logged and skipped; only read errors end the loop early.
pub async fn run<S, R, F>(bus: &MessageBus<S>, reader: R, shutdown: F) -> Result<ConsumerStats>
where
    S: ProductStore + 'static,
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut stats = ConsumerStats::default();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, stopping consumer");
                break;
            }
        };
        let Some(line) = line else {
            tracing::info!("inbound stream closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        stats.received += 1;
        metrics::counter!("consumer_messages_received_total").increment(1);

        match process_line(bus, &line).await {
            Ok(LineOutcome::Ignored) => stats.skipped += 1,
            Ok(_) => stats.handled += 1,
            Err(ConsumerError::Parse(err)) => {
                stats.skipped += 1;
                metrics::counter!("consumer_messages_malformed_total").increment(1);
                tracing::warn!(error = %err, "skipping malformed message");
            }
            Err(err) => {
                stats.failed += 1;
                metrics::counter!("consumer_messages_failed_total").increment(1);
                tracing::error!(error = %err, "failed to handle message");
            }
        }
    }

    Ok(stats)
}
