//! Integration tests for the Product aggregate.
//!
//! These tests exercise allocation across several batches, the quantity
//! change cascade, and persistence of the aggregate state as a product record.

use chrono::NaiveDate;
use domain::{
    Aggregate, AllocationError, Batch, BatchRef, DomainEvent, Event, EventKind, OrderLine,
    Product, Sku, Version,
};
use storage::ProductRecord;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn product(sku: &str, batches: &[(&str, u32, Option<NaiveDate>)]) -> Product {
    let mut product = Product::new(sku);
    for (reference, qty, eta) in batches {
        product
            .add_batch(Batch::new(*reference, sku, *qty, *eta))
            .unwrap();
    }
    product
}

fn available(product: &Product, reference: &str) -> i64 {
    product
        .batch(&BatchRef::new(reference))
        .unwrap()
        .available_quantity()
}

mod allocation {
    use super::*;

    #[test]
    fn earliest_batch_wins_and_others_are_untouched() {
        let mut product = product(
            "CHAIR",
            &[
                ("late", 100, Some(date(20))),
                ("now", 100, None),
                ("soon", 100, Some(date(2))),
            ],
        );

        let reference = product.allocate(OrderLine::new("o1", "CHAIR", 7)).unwrap();

        assert_eq!(reference.as_str(), "now");
        assert_eq!(available(&product, "now"), 93);
        assert_eq!(available(&product, "soon"), 100);
        assert_eq!(available(&product, "late"), 100);
    }

    #[test]
    fn falls_through_to_later_batch_when_earlier_is_full() {
        let mut product = product("CHAIR", &[("now", 10, None), ("soon", 100, Some(date(2)))]);

        product.allocate(OrderLine::new("o1", "CHAIR", 8)).unwrap();
        let reference = product.allocate(OrderLine::new("o2", "CHAIR", 8)).unwrap();

        assert_eq!(reference.as_str(), "soon");
        assert_eq!(available(&product, "now"), 2);
        assert_eq!(available(&product, "soon"), 92);
        assert_eq!(product.version(), Version::new(2));
    }

    #[test]
    fn events_are_recorded_in_order() {
        let mut product = product("CHAIR", &[("now", 100, None)]);

        product.allocate(OrderLine::new("o1", "CHAIR", 1)).unwrap();
        product.allocate(OrderLine::new("o2", "CHAIR", 2)).unwrap();

        let events = product.take_events();
        let orders: Vec<_> = events
            .iter()
            .map(|e| match e {
                Event::Allocated(data) => data.order_id.as_str().to_string(),
                other => panic!("unexpected event {}", other.event_type()),
            })
            .collect();
        assert_eq!(orders, ["o1", "o2"]);
    }

    #[test]
    fn out_of_stock_carries_sku() {
        let mut product = product("CHAIR", &[("now", 5, None)]);

        let err = product
            .allocate(OrderLine::new("o1", "CHAIR", 6))
            .unwrap_err();

        assert_eq!(
            err,
            AllocationError::OutOfStock {
                sku: Sku::new("CHAIR")
            }
        );
        assert_eq!(product.version(), Version::initial());
    }
}

mod quantity_change {
    use super::*;

    #[test]
    fn shed_lines_restore_non_negative_availability() {
        let mut product = product("TABLE", &[("b1", 50, None), ("b2", 50, Some(date(1)))]);
        for (order, qty) in [("o1", 10), ("o2", 15), ("o3", 20)] {
            product
                .allocate(OrderLine::new(order, "TABLE", qty))
                .unwrap();
        }
        product.take_events();
        assert_eq!(available(&product, "b1"), 5);

        product
            .change_batch_quantity(&BatchRef::new("b1"), 12)
            .unwrap();

        let events = product.take_events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.kind() == EventKind::Deallocated));

        let shed: i64 = events
            .iter()
            .map(|e| match e {
                Event::Deallocated(data) => i64::from(data.qty),
                _ => 0,
            })
            .sum();
        assert!(available(&product, "b1") >= 0);
        assert_eq!(available(&product, "b1"), 12 - (45 - shed));
        assert_eq!(available(&product, "b2"), 50);
    }

    #[test]
    fn shed_line_can_be_reallocated_elsewhere() {
        let mut product = product("TABLE", &[("b1", 50, None), ("b2", 50, Some(date(1)))]);
        product.allocate(OrderLine::new("o1", "TABLE", 20)).unwrap();
        product.allocate(OrderLine::new("o2", "TABLE", 20)).unwrap();
        product.take_events();

        product
            .change_batch_quantity(&BatchRef::new("b1"), 25)
            .unwrap();

        for event in product.take_events() {
            let Event::Deallocated(data) = event else {
                panic!("expected only Deallocated events");
            };
            let reference = product.allocate(data.line()).unwrap();
            assert_eq!(reference.as_str(), "b2");
        }

        assert_eq!(available(&product, "b1"), 5);
        assert_eq!(available(&product, "b2"), 30);
    }
}

mod persistence {
    use super::*;

    #[test]
    fn product_survives_record_roundtrip() {
        let mut product = product("LAMP", &[("b1", 20, None), ("b2", 20, Some(date(3)))]);
        product.allocate(OrderLine::new("o1", "LAMP", 4)).unwrap();

        let record = ProductRecord::from_state(
            product.sku().clone(),
            product.version(),
            product.batch_refs(),
            &product,
        )
        .unwrap();
        assert!(record.holds_batch(&BatchRef::new("b2")));

        let mut restored: Product = record.to_state().unwrap();
        assert_eq!(restored.version(), Version::new(1));
        assert!(restored.pending_events().is_empty());
        assert_eq!(available(&restored, "b1"), 16);

        let line = OrderLine::new("o1", "LAMP", 4);
        assert_eq!(restored.deallocate(&line).unwrap().as_str(), "b1");
        assert_eq!(restored.version(), Version::initial());
    }
}
