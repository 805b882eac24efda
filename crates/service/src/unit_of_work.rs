//! Unit of work: one transaction per handler invocation.

use domain::{Aggregate, Command, Message};
use storage::{ProductStore, StorageError, Transaction};

use crate::Result;
use crate::repository::{Repository, StoreRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Committed,
    RolledBack,
}

/// Transactional scope coordinating product loads, mutations and commit.
///
/// Begin one per handler call and always `close` it; closing rolls back
/// unless `commit` succeeded. Events recorded by the touched products are
/// only surfaced after a successful commit.
pub struct UnitOfWork<S: ProductStore> {
    products: StoreRepository<S::Transaction>,
    commands: Vec<Command>,
    new_messages: Vec<Message>,
    state: State,
}

impl<S: ProductStore> UnitOfWork<S> {
    /// Begins a fresh transaction on the store.
    pub async fn begin(store: &S) -> Result<Self> {
        let tx = store.begin().await?;
        Ok(Self {
            products: StoreRepository::new(tx),
            commands: Vec::new(),
            new_messages: Vec::new(),
            state: State::Open,
        })
    }

    /// Returns the repository bound to this transaction.
    pub fn products(&mut self) -> &mut StoreRepository<S::Transaction> {
        &mut self.products
    }

    /// Queues a follow-up command, surfaced together with the events after commit.
    pub fn enqueue(&mut self, command: impl Into<Command>) {
        self.commands.push(command.into());
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    pub fn is_committed(&self) -> bool {
        self.state == State::Committed
    }

    /// Persists every changed product, then harvests pending events.
    ///
    /// On failure nothing is surfaced and the transaction stays open so that
    /// `close` rolls it back.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(StorageError::TransactionClosed.into());
        }

        let staged = self.products.stage_changes()?;
        self.products.transaction_mut().commit().await?;
        self.state = State::Committed;

        for product in self.products.seen_mut() {
            self.new_messages
                .extend(product.take_events().into_iter().map(Message::Event));
        }
        self.new_messages
            .extend(self.commands.drain(..).map(Message::Command));

        tracing::debug!(staged, harvested = self.new_messages.len(), "unit of work committed");
        Ok(())
    }

    /// Discards every change made in this transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }

        let result = self.products.transaction_mut().rollback().await;
        self.state = State::RolledBack;
        for product in self.products.seen_mut() {
            product.take_events();
        }
        self.commands.clear();
        result.map_err(Into::into)
    }

    /// Takes the messages harvested by the last successful commit.
    pub fn collect_new_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.new_messages)
    }

    /// Ends the scope, rolling back if the transaction was not committed.
    pub async fn close(mut self) -> Result<()> {
        if self.is_open() {
            tracing::debug!("closing uncommitted unit of work");
            self.rollback().await?;
        }
        Ok(())
    }
}
