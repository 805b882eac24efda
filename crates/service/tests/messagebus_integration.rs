//! Integration tests for the message bus.
//!
//! These tests run commands through the production routing table against the
//! in-memory store and collaborators, covering the cascade of events, retries,
//! and optimistic concurrency.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::{
    Aggregate, Allocate, AllocationError, BatchRef, ChangeBatchQuantity, CommandKind, CreateBatch,
    Deallocate, Event, EventKind, OrderId, OrderLine, Product, Sku,
};
use service::adapters::views::allocations;
use service::adapters::{
    AllocationsReadModel, InMemoryAllocationsView, InMemoryNotifications, InMemoryPublisher,
};
use service::handlers::{AddBatch, AllocateLine, ChangeBatchQuantityHandler, Reallocate};
use service::{
    Collaborators, CommandHandler, CommandOutcome, EventHandler, MessageBus, Repository,
    RetryPolicy, ServiceError, UnitOfWork, bootstrap,
};
use storage::{InMemoryProductStore, Version};

struct Harness {
    bus: MessageBus<InMemoryProductStore>,
    store: InMemoryProductStore,
    notifications: InMemoryNotifications,
    publisher: InMemoryPublisher,
    view: InMemoryAllocationsView,
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::exponential(3, Duration::from_millis(1), Duration::from_millis(5))
}

fn harness() -> Harness {
    let store = InMemoryProductStore::new();
    let notifications = InMemoryNotifications::new();
    let publisher = InMemoryPublisher::new();
    let view = InMemoryAllocationsView::new();

    let bus = bootstrap(
        store.clone(),
        Collaborators {
            notifications: Arc::new(notifications.clone()),
            publisher: Arc::new(publisher.clone()),
            read_model: Arc::new(view.clone()),
            retry: fast_retry(),
            ..Default::default()
        },
    );

    Harness {
        bus,
        store,
        notifications,
        publisher,
        view,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

async fn committed_product(store: &InMemoryProductStore, sku: &str) -> Product {
    store
        .get_committed(&Sku::new(sku))
        .await
        .unwrap()
        .to_state()
        .unwrap()
}

fn available(product: &Product, reference: &str) -> i64 {
    product
        .batch(&BatchRef::new(reference))
        .unwrap()
        .available_quantity()
}

mod commands {
    use super::*;

    #[tokio::test]
    async fn allocate_returns_batch_and_updates_side_effects() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "CRUNCHY-ARMCHAIR", 100, None))
            .await
            .unwrap();

        let results = h
            .bus
            .handle(Allocate::new("o1", "CRUNCHY-ARMCHAIR", 10))
            .await
            .unwrap();

        assert_eq!(results, vec![CommandOutcome::Allocated(BatchRef::new("b1"))]);

        let published = h.publisher.published_to("line_allocated");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["data"]["order_id"], "o1");

        let rows = allocations(&h.view, &OrderId::new("o1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].batch_ref.as_str(), "b1");

        let product = committed_product(&h.store, "CRUNCHY-ARMCHAIR").await;
        assert_eq!(product.version(), Version::new(1));
        assert_eq!(available(&product, "b1"), 90);
    }

    #[tokio::test]
    async fn batches_for_existing_product_are_appended() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "GARISH-RUG", 100, None))
            .await
            .unwrap();
        h.bus
            .handle(CreateBatch::new("b2", "GARISH-RUG", 99, Some(today())))
            .await
            .unwrap();

        assert_eq!(h.store.product_count().await, 1);
        let product = committed_product(&h.store, "GARISH-RUG").await;
        assert_eq!(product.batch_refs().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_batch_reference_is_rejected() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "GARISH-RUG", 100, None))
            .await
            .unwrap();

        let err = h
            .bus
            .handle(CreateBatch::new("b1", "OTHER-RUG", 5, None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Allocation(AllocationError::DuplicateBatch { .. })
        ));
        assert_eq!(h.store.product_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_sku_has_no_side_effects() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "AREALSKU", 100, None))
            .await
            .unwrap();

        let err = h
            .bus
            .handle(Allocate::new("o1", "NONEXISTENTSKU", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidSku(ref sku) if sku.as_str() == "NONEXISTENTSKU"));
        assert_eq!(err.to_string(), "Invalid sku NONEXISTENTSKU");
        assert_eq!(h.store.product_count().await, 1);
        assert!(h.publisher.published().is_empty());
        assert_eq!(h.view.row_count(), 0);
    }

    #[tokio::test]
    async fn out_of_stock_reaches_the_caller() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "POPULAR-CURTAINS", 9, None))
            .await
            .unwrap();

        let err = h
            .bus
            .handle(Allocate::new("o1", "POPULAR-CURTAINS", 10))
            .await
            .unwrap_err();

        assert_eq!(err.out_of_stock_sku(), Some(&Sku::new("POPULAR-CURTAINS")));
        let product = committed_product(&h.store, "POPULAR-CURTAINS").await;
        assert_eq!(product.version(), Version::initial());
    }

    #[tokio::test]
    async fn deallocate_restores_stock_and_view() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "LAMP", 20, None))
            .await
            .unwrap();
        h.bus.handle(Allocate::new("o1", "LAMP", 5)).await.unwrap();

        let results = h
            .bus
            .handle(Deallocate::new("o1", "LAMP", 5))
            .await
            .unwrap();

        assert_eq!(results, vec![CommandOutcome::Deallocated(BatchRef::new("b1"))]);
        let product = committed_product(&h.store, "LAMP").await;
        assert_eq!(available(&product, "b1"), 20);
        assert_eq!(product.version(), Version::initial());
        assert_eq!(h.view.row_count(), 0);

        let err = h
            .bus
            .handle(Deallocate::new("o1", "LAMP", 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Allocation(AllocationError::NoOrderInBatch { .. })
        ));
    }

    #[tokio::test]
    async fn change_quantity_of_unknown_batch() {
        let h = harness();

        let err = h
            .bus
            .handle(ChangeBatchQuantity::new("missing", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::BatchNotFound(ref r) if r.as_str() == "missing"));
    }
}

mod reallocation {
    use super::*;

    #[tokio::test]
    async fn shrinking_a_batch_reallocates_shed_lines() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("batch1", "INDIFFERENT-TABLE", 50, None))
            .await
            .unwrap();
        h.bus
            .handle(CreateBatch::new("batch2", "INDIFFERENT-TABLE", 50, Some(today())))
            .await
            .unwrap();
        for order in ["order1", "order2"] {
            let results = h
                .bus
                .handle(Allocate::new(order, "INDIFFERENT-TABLE", 20))
                .await
                .unwrap();
            assert_eq!(results[0].batch_ref().unwrap().as_str(), "batch1");
        }

        let results = h
            .bus
            .handle(ChangeBatchQuantity::new("batch1", 25))
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                CommandOutcome::QuantityChanged,
                CommandOutcome::Allocated(BatchRef::new("batch2")),
            ]
        );

        let product = committed_product(&h.store, "INDIFFERENT-TABLE").await;
        assert_eq!(available(&product, "batch1"), 5);
        assert_eq!(available(&product, "batch2"), 30);

        let mut on_batch2 = 0;
        for order in ["order1", "order2"] {
            let rows = h.view.allocations_for(&OrderId::new(order)).await.unwrap();
            assert_eq!(rows.len(), 1);
            if rows[0].batch_ref.as_str() == "batch2" {
                on_batch2 += 1;
            }
        }
        assert_eq!(on_batch2, 1);
        assert_eq!(h.publisher.published_to("line_allocated").len(), 3);
    }

    #[tokio::test]
    async fn failed_reallocation_surfaces_out_of_stock() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("batch1", "LAMP", 10, None))
            .await
            .unwrap();
        h.bus.handle(Allocate::new("o1", "LAMP", 10)).await.unwrap();

        let err = h
            .bus
            .handle(ChangeBatchQuantity::new("batch1", 5))
            .await
            .unwrap_err();

        assert_eq!(err.out_of_stock_sku(), Some(&Sku::new("LAMP")));
        let product = committed_product(&h.store, "LAMP").await;
        assert_eq!(available(&product, "batch1"), 5);
        assert_eq!(h.view.row_count(), 0);
    }
}

mod events {
    use super::*;

    #[tokio::test]
    async fn out_of_stock_event_sends_notification() {
        let h = harness();

        let results = h.bus.handle(Event::out_of_stock("LAMP")).await.unwrap();

        assert!(results.is_empty());
        let sent = h.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "stock@made.com");
        assert_eq!(sent[0].message, "Article LAMP is out of stock");
    }

    #[tokio::test]
    async fn handler_failing_twice_then_succeeding_is_handled() {
        let h = harness();
        h.notifications.fail_next(2);

        let results = h.bus.handle(Event::out_of_stock("LAMP")).await;

        assert!(results.is_ok());
        assert_eq!(h.notifications.sent().len(), 1);
    }

    #[tokio::test]
    async fn flaky_publisher_does_not_fail_the_command() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "LAMP", 20, None))
            .await
            .unwrap();
        h.publisher.fail_next(2);

        let results = h.bus.handle(Allocate::new("o1", "LAMP", 5)).await.unwrap();

        assert_eq!(results, vec![CommandOutcome::Allocated(BatchRef::new("b1"))]);
        assert_eq!(h.publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_handler_is_swallowed_and_next_handler_runs() {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "LAMP", 20, None))
            .await
            .unwrap();
        h.publisher.fail_next(10);

        let results = h.bus.handle(Allocate::new("o1", "LAMP", 5)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(h.publisher.published().is_empty());
        assert_eq!(h.view.row_count(), 1);
    }
}

mod ordering {
    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    #[async_trait]
    impl EventHandler<InMemoryProductStore> for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(
            &self,
            event: &Event,
            _: &mut UnitOfWork<InMemoryProductStore>,
        ) -> service::Result<()> {
            let entry = match event {
                Event::Allocated(data) => format!("Allocated:{}", data.order_id),
                Event::Deallocated(data) => format!("Deallocated:{}", data.order_id),
                Event::OutOfStock(data) => format!("OutOfStock:{}", data.sku),
            };
            self.seen.lock().unwrap().push(entry);
            Ok(())
        }
    }

    #[tokio::test]
    async fn cascades_are_drained_breadth_first() {
        let recorder = Recorder::default();
        let bus = MessageBus::builder(InMemoryProductStore::new())
            .command(CommandKind::CreateBatch, AddBatch)
            .command(CommandKind::Allocate, AllocateLine)
            .command(CommandKind::ChangeBatchQuantity, ChangeBatchQuantityHandler)
            .event(EventKind::Allocated, recorder.clone())
            .event(EventKind::Deallocated, recorder.clone())
            .event(EventKind::Deallocated, Reallocate)
            .retry_policy(fast_retry())
            .build();

        bus.handle(CreateBatch::new("small", "LAMP", 20, None))
            .await
            .unwrap();
        bus.handle(CreateBatch::new("big", "LAMP", 100, Some(today())))
            .await
            .unwrap();
        bus.handle(Allocate::new("o1", "LAMP", 10)).await.unwrap();
        bus.handle(Allocate::new("o2", "LAMP", 10)).await.unwrap();
        assert_eq!(recorder.take(), ["Allocated:o1", "Allocated:o2"]);

        let results = bus
            .handle(ChangeBatchQuantity::new("small", 0))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        let kinds: Vec<String> = recorder
            .take()
            .into_iter()
            .map(|entry| entry.split(':').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            kinds,
            ["Deallocated", "Deallocated", "Allocated", "Allocated"]
        );
    }
}

mod concurrency {
    use super::*;

    async fn seeded(qty: u32) -> Harness {
        let h = harness();
        h.bus
            .handle(CreateBatch::new("b1", "LAMP", qty, None))
            .await
            .unwrap();
        h
    }

    #[tokio::test]
    async fn second_committer_gets_a_conflict() {
        let h = seeded(10).await;
        let sku = Sku::new("LAMP");

        let mut first = UnitOfWork::begin(&h.store).await.unwrap();
        let mut second = UnitOfWork::begin(&h.store).await.unwrap();
        first.products().get_by_sku(&sku).await.unwrap();
        second.products().get_by_sku(&sku).await.unwrap();

        let outcome = AllocateLine
            .handle(Allocate::new("o1", "LAMP", 10).into(), &mut first)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Allocated(BatchRef::new("b1")));

        let err = AllocateLine
            .handle(Allocate::new("o2", "LAMP", 10).into(), &mut second)
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());

        first.close().await.unwrap();
        second.close().await.unwrap();

        let product = committed_product(&h.store, "LAMP").await;
        assert_eq!(product.version(), Version::new(1));
        assert_eq!(product.batches()[0].allocations().count(), 1);
    }

    #[tokio::test]
    async fn duplicate_allocate_does_not_rewrite_the_product() {
        let h = seeded(20).await;
        let sku = Sku::new("LAMP");
        for n in 0..4 {
            h.bus
                .handle(Allocate::new(format!("o{n}"), "LAMP", 1))
                .await
                .unwrap();
        }
        let revision = h.store.revision(&sku).await;

        let mut held = UnitOfWork::begin(&h.store).await.unwrap();
        let product = held.products().get_by_sku(&sku).await.unwrap().unwrap();
        product.allocate(OrderLine::new("new", "LAMP", 1)).unwrap();

        let results = h.bus.handle(Allocate::new("o0", "LAMP", 1)).await.unwrap();
        assert_eq!(results, vec![CommandOutcome::Allocated(BatchRef::new("b1"))]);
        assert_eq!(h.store.revision(&sku).await, revision);

        held.commit().await.unwrap();
        held.close().await.unwrap();

        let product = committed_product(&h.store, "LAMP").await;
        assert_eq!(product.batches()[0].allocations().count(), 5);
    }

    #[tokio::test]
    async fn read_only_loads_stage_nothing() {
        let h = seeded(20).await;
        let sku = Sku::new("LAMP");
        for n in 0..6 {
            h.bus
                .handle(Allocate::new(format!("o{n}"), "LAMP", 2))
                .await
                .unwrap();
        }

        for _ in 0..10 {
            let mut uow = UnitOfWork::begin(&h.store).await.unwrap();
            uow.products().get_by_sku(&sku).await.unwrap();
            assert_eq!(uow.products().stage_changes().unwrap(), 0);
            uow.close().await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_allocations_never_oversell() {
        let h = seeded(10).await;
        let bus = Arc::new(h.bus);

        let tasks: Vec<_> = ["o1", "o2"]
            .into_iter()
            .map(|order| {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move { bus.handle(Allocate::new(order, "LAMP", 10)).await })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(
                    err.is_concurrency_conflict() || err.out_of_stock_sku().is_some(),
                    "unexpected error: {err}"
                ),
            }
        }

        assert_eq!(successes, 1);
        let product = committed_product(&h.store, "LAMP").await;
        assert_eq!(product.version(), Version::new(1));
        assert_eq!(product.batches()[0].allocations().count(), 1);
    }
}
