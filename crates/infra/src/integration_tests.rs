//! Integration tests for the fulfillment pipeline over the in-memory store.
//!
//! Tests: Orchestrator → UnitOfWork → Storage, then EventBus
//!
//! Verifies:
//! - Checkout is all-or-nothing and race-safe on stock
//! - A shipment exists iff the order is shipped or delivered
//! - Events are published only for committed changes

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agrosupply_auth::{DirectoryEntry, InMemoryUserDirectory, Role};
    use agrosupply_core::{DomainError, Entity, Money, OrderId, ProductId, UserId};
    use agrosupply_events::{EventBus, InMemoryEventBus};
    use agrosupply_inventory::NewProduct;
    use agrosupply_orders::{Cart, LineRequest, OrderStatus};
    use agrosupply_shipping::ShipmentStatus;

    use crate::fulfillment::{
        ErrorKind, Fulfillment, FulfillmentConfig, FulfillmentEnvelope, FulfillmentError,
    };
    use crate::store::{InMemoryStorage, InventoryLedger, Storage, UnitOfWork};

    type Bus = Arc<InMemoryEventBus<FulfillmentEnvelope>>;
    type TestFulfillment = Fulfillment<InMemoryStorage, Arc<InMemoryUserDirectory>, Bus>;

    const BUYER: UserId = UserId::new(7);
    const OTHER_BUYER: UserId = UserId::new(8);
    const CARRIER: UserId = UserId::new(9);
    const WAREHOUSE: UserId = UserId::new(3);

    fn directory() -> Arc<InMemoryUserDirectory> {
        Arc::new(InMemoryUserDirectory::with_entries([
            DirectoryEntry::new(BUYER, "Ana Quispe", Role::Buyer),
            DirectoryEntry::new(OTHER_BUYER, "Rosa Mamani", Role::Buyer),
            DirectoryEntry::new(CARRIER, "Luis Condori", Role::Carrier),
            DirectoryEntry::new(WAREHOUSE, "Depot", Role::Warehouse),
        ]))
    }

    fn setup_with(config: FulfillmentConfig) -> (Arc<TestFulfillment>, InMemoryStorage, Bus) {
        let storage = InMemoryStorage::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let fulfillment = Fulfillment::new(storage.clone(), directory(), bus.clone(), config);
        (Arc::new(fulfillment), storage, bus)
    }

    fn setup() -> (Arc<TestFulfillment>, InMemoryStorage, Bus) {
        setup_with(FulfillmentConfig::default())
    }

    async fn seed(f: &TestFulfillment, name: &str, cents: i64, qty: i64) -> ProductId {
        f.register_product(NewProduct::new(name, Money::from_minor_units(cents), qty))
            .await
            .unwrap()
            .id()
    }

    fn line(product: ProductId, qty: i64, cents: i64) -> LineRequest {
        LineRequest::new(product, qty, Money::from_minor_units(cents))
    }

    fn is_insufficient_stock(err: &FulfillmentError) -> bool {
        matches!(err.domain(), Some(DomainError::InsufficientStock { .. }))
    }

    fn is_invalid_transition(err: &FulfillmentError) -> bool {
        matches!(err.domain(), Some(DomainError::InvalidTransition { .. }))
    }

    /// A shipment exists iff the order is shipped/delivered, and the shipment
    /// is delivered iff the order is delivered.
    async fn assert_shipment_consistency(f: &TestFulfillment, order_id: OrderId) {
        let detail = f.get_order_detail(order_id).await.unwrap();
        let status = detail.order.status();
        assert_eq!(detail.shipment.is_some(), status.requires_shipment(), "status {status}");
        if let Some(shipment) = &detail.shipment {
            assert_eq!(shipment.is_delivered(), status == OrderStatus::Delivered);
        }
        detail.order.verify_total(&detail.lines).unwrap();
    }

    async fn processed_order(f: &TestFulfillment, product: ProductId) -> OrderId {
        let placed = f.place_order(BUYER, vec![line(product, 1, 4_500)]).await.unwrap();
        let id = placed.order.id();
        f.advance_status(id, OrderStatus::Processed).await.unwrap();
        id
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_carts_racing_for_the_last_feed_bags_exactly_one_wins() {
        let (f, _, _) = setup();

        for round in 0..25 {
            let feed = seed(&f, &format!("Feed 50kg #{round}"), 4_500, 5).await;

            let a = tokio::spawn({
                let f = f.clone();
                async move { f.place_order(BUYER, vec![line(feed, 3, 4_500)]).await }
            });
            let b = tokio::spawn({
                let f = f.clone();
                async move { f.place_order(OTHER_BUYER, vec![line(feed, 3, 4_500)]).await }
            });
            let results = [a.await.unwrap(), b.await.unwrap()];

            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "round {round}");
            let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
            assert!(matches!(loser, FulfillmentError::OrderPlacementFailed { .. }));
            assert!(is_insufficient_stock(loser));
            assert_eq!(f.available_quantity(feed).await.unwrap(), 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let (f, _, _) = setup();
        let salt = seed(&f, "Mineral salt", 500, 10).await;

        let mut handles = Vec::new();
        for i in 0..20i64 {
            let f = f.clone();
            let buyer = if i % 2 == 0 { BUYER } else { OTHER_BUYER };
            let qty = i % 4 + 1;
            handles.push(tokio::spawn(async move {
                f.place_order(buyer, vec![line(salt, qty, 500)])
                    .await
                    .map(|d| d.lines[0].quantity)
            }));
        }

        let mut sold = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(qty) => sold += qty,
                Err(e) => assert!(is_insufficient_stock(&e), "unexpected {e}"),
            }
        }
        let left = f.available_quantity(salt).await.unwrap();
        assert!(left >= 0);
        assert_eq!(left, 10 - sold);
    }

    #[tokio::test]
    async fn buyer_order_total_and_stock_decrements() {
        let (f, _, _) = setup();
        let p1 = seed(&f, "Feed 50kg", 1_000, 10).await;
        let p2 = seed(&f, "Mineral salt", 500, 10).await;

        let detail = f
            .place_order(BUYER, vec![line(p1, 2, 1_000), line(p2, 1, 500)])
            .await
            .unwrap();

        assert_eq!(detail.order.total(), Money::from_minor_units(2_500));
        assert_eq!(detail.order.total().to_string(), "25.00");
        assert_eq!(detail.order.status(), OrderStatus::Placed);
        assert_eq!(detail.order.buyer_id(), BUYER);
        assert_eq!(detail.lines.len(), 2);
        assert_eq!(f.available_quantity(p1).await.unwrap(), 8);
        assert_eq!(f.available_quantity(p2).await.unwrap(), 9);

        let stored = f.get_order_detail(detail.order.id()).await.unwrap();
        assert_eq!(stored.lines, detail.lines);
        assert!(stored.shipment.is_none());
    }

    #[tokio::test]
    async fn assigning_a_carrier_to_a_placed_order_is_rejected() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order = f.place_order(BUYER, vec![line(feed, 1, 4_500)]).await.unwrap().order;

        let err = f.assign_carrier(order.id(), CARRIER).await.unwrap_err();
        assert!(is_invalid_transition(&err));
        assert_eq!(err.kind(), ErrorKind::BusinessRule);

        let detail = f.get_order_detail(order.id()).await.unwrap();
        assert!(detail.shipment.is_none());
        assert_eq!(detail.order.status(), OrderStatus::Placed);
        assert!(f.shipments_for_carrier(CARRIER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_checkout_leaves_inventory_and_orders_untouched() {
        let (f, _, bus) = setup();
        let events = bus.subscribe();
        let p1 = seed(&f, "Feed 50kg", 1_000, 10).await;
        let p2 = seed(&f, "Wormer", 2_000, 1).await;
        let p3 = seed(&f, "Alfalfa", 300, 10).await;

        let err = f
            .place_order(BUYER, vec![line(p1, 2, 1_000), line(p2, 5, 2_000), line(p3, 1, 300)])
            .await
            .unwrap_err();
        assert!(is_insufficient_stock(&err));

        assert_eq!(f.available_quantity(p1).await.unwrap(), 10);
        assert_eq!(f.available_quantity(p2).await.unwrap(), 1);
        assert_eq!(f.available_quantity(p3).await.unwrap(), 10);
        assert!(f.orders_for_buyer(BUYER).await.unwrap().is_empty());
        assert!(events.drain().is_empty());
    }

    #[tokio::test]
    async fn lines_quoted_below_catalog_price_are_refused() {
        let (f, _, bus) = setup();
        let events = bus.subscribe();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let salt = seed(&f, "Mineral salt", 500, 5).await;

        let err = f
            .place_order(BUYER, vec![line(salt, 1, 500), line(feed, 2, 1)])
            .await
            .unwrap_err();

        assert!(matches!(
            err.domain(),
            Some(DomainError::PriceMismatch { product_id, .. }) if *product_id == feed
        ));
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
        assert_eq!(f.available_quantity(feed).await.unwrap(), 5);
        assert_eq!(f.available_quantity(salt).await.unwrap(), 5);
        assert!(f.orders_for_buyer(BUYER).await.unwrap().is_empty());
        assert!(events.drain().is_empty());
    }

    #[tokio::test]
    async fn combined_quantities_that_overflow_are_a_validation_error() {
        let (f, _, _) = setup();
        let free = seed(&f, "Sample sachet", 0, 5).await;

        let err = f
            .place_order(BUYER, vec![line(free, i64::MAX, 0), line(free, i64::MAX, 0)])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "validation_error");
        assert_eq!(f.available_quantity(free).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn aborted_reservation_rolls_back_earlier_lines() {
        let (f, storage, _) = setup();
        let p1 = seed(&f, "Feed 50kg", 1_000, 10).await;
        let p2 = seed(&f, "Wormer", 2_000, 1).await;

        let mut uow = storage.begin().await.unwrap();
        uow.reserve(p1, 4).await.unwrap();
        assert!(uow.reserve(p2, 2).await.is_err());
        uow.rollback().await.unwrap();

        assert_eq!(f.available_quantity(p1).await.unwrap(), 10);
        assert_eq!(f.available_quantity(p2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_product_lines_are_checked_against_combined_stock() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 1_000, 5).await;

        let err = f
            .place_order(BUYER, vec![line(feed, 3, 1_000), line(feed, 3, 1_000)])
            .await
            .unwrap_err();
        assert!(is_insufficient_stock(&err));
        assert_eq!(f.available_quantity(feed).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn full_lifecycle_keeps_order_and_shipment_consistent() {
        let (f, _, bus) = setup();
        let events = bus.subscribe();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;

        let order_id = f
            .place_order(BUYER, vec![line(feed, 2, 4_500)])
            .await
            .unwrap()
            .order
            .id();
        assert_shipment_consistency(&f, order_id).await;

        f.advance_status(order_id, OrderStatus::Processed).await.unwrap();
        assert_shipment_consistency(&f, order_id).await;
        assert_eq!(f.orders_by_status(OrderStatus::Processed).await.unwrap().len(), 1);

        let shipment = f.assign_carrier(order_id, CARRIER).await.unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Preparing);
        assert_eq!(f.get_order(order_id).await.unwrap().status(), OrderStatus::Shipped);
        assert_shipment_consistency(&f, order_id).await;

        let update = f
            .update_shipment_status(shipment.id(), ShipmentStatus::EnRoute)
            .await
            .unwrap();
        assert_eq!(update.order_status, OrderStatus::Shipped);
        assert_shipment_consistency(&f, order_id).await;

        let update = f
            .update_shipment_status(shipment.id(), ShipmentStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(update.order_status, OrderStatus::Delivered);
        assert!(update.shipment.delivered_at().is_some());
        assert_shipment_consistency(&f, order_id).await;

        let types: Vec<String> = events
            .drain()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "order.placed",
                "order.status_changed",
                "shipment.assigned",
                "order.status_changed",
                "shipment.status_changed",
                "shipment.status_changed",
                "order.status_changed",
            ]
        );
    }

    #[tokio::test]
    async fn advance_status_only_performs_status_only_transitions() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order_id = f
            .place_order(BUYER, vec![line(feed, 1, 4_500)])
            .await
            .unwrap()
            .order
            .id();

        for target in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Placed] {
            let err = f.advance_status(order_id, target).await.unwrap_err();
            assert!(is_invalid_transition(&err), "target {target}");
        }
        assert_shipment_consistency(&f, order_id).await;

        f.advance_status(order_id, OrderStatus::Processed).await.unwrap();
        let err = f.advance_status(order_id, OrderStatus::Processed).await.unwrap_err();
        assert!(is_invalid_transition(&err));
    }

    #[tokio::test]
    async fn shipped_and_delivered_orders_cannot_be_cancelled() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order_id = processed_order(&f, feed).await;
        let shipment = f.assign_carrier(order_id, CARRIER).await.unwrap();

        assert!(is_invalid_transition(&f.cancel(order_id).await.unwrap_err()));

        f.update_shipment_status(shipment.id(), ShipmentStatus::EnRoute).await.unwrap();
        f.update_shipment_status(shipment.id(), ShipmentStatus::Delivered).await.unwrap();
        let err = f
            .advance_status(order_id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(is_invalid_transition(&err));
        assert_shipment_consistency(&f, order_id).await;
    }

    #[tokio::test]
    async fn cancellation_keeps_stock_unless_restock_is_enabled() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order_id = f
            .place_order(BUYER, vec![line(feed, 2, 4_500)])
            .await
            .unwrap()
            .order
            .id();
        let cancelled = f.cancel(order_id).await.unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(f.available_quantity(feed).await.unwrap(), 3);

        let (f, _, bus) = setup_with(FulfillmentConfig {
            restock_on_cancel: true,
        });
        let events = bus.subscribe();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order_id = processed_order(&f, feed).await;
        f.advance_status(order_id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(f.available_quantity(feed).await.unwrap(), 5);
        assert!(
            events
                .drain()
                .iter()
                .any(|e| e.event_type() == "inventory.stock_released")
        );
    }

    #[tokio::test]
    async fn checkout_validation_happens_before_any_side_effect() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;

        let err = f.place_order(BUYER, vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.domain(), Some(&DomainError::EmptyCart));

        let err = f.place_order(BUYER, vec![line(feed, 0, 4_500)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = f.place_order(CARRIER, vec![line(feed, 1, 4_500)]).await.unwrap_err();
        assert_eq!(err.code(), "unauthorized");

        let err = f
            .place_order(UserId::new(404), vec![line(feed, 1, 4_500)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");

        assert_eq!(f.available_quantity(feed).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn only_carriers_can_take_shipments() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order_id = processed_order(&f, feed).await;

        for not_a_carrier in [BUYER, WAREHOUSE, UserId::new(404)] {
            let err = f.assign_carrier(order_id, not_a_carrier).await.unwrap_err();
            assert_eq!(err.code(), "unauthorized");
        }
        assert_eq!(f.get_order(order_id).await.unwrap().status(), OrderStatus::Processed);
        assert_shipment_consistency(&f, order_id).await;

        f.assign_carrier(order_id, CARRIER).await.unwrap();
        let err = f.assign_carrier(order_id, CARRIER).await.unwrap_err();
        assert!(is_invalid_transition(&err));
        assert_eq!(f.shipments_for_carrier(CARRIER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn shipment_cannot_skip_en_route() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let order_id = processed_order(&f, feed).await;
        let shipment = f.assign_carrier(order_id, CARRIER).await.unwrap();

        let err = f
            .update_shipment_status(shipment.id(), ShipmentStatus::Delivered)
            .await
            .unwrap_err();
        assert!(is_invalid_transition(&err));
        assert_eq!(f.get_order(order_id).await.unwrap().status(), OrderStatus::Shipped);
        assert_shipment_consistency(&f, order_id).await;
    }

    #[tokio::test]
    async fn storage_outage_is_a_retryable_infrastructure_error() {
        let (f, storage, bus) = setup();
        let events = bus.subscribe();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;

        storage.set_unavailable(true);
        let err = f.place_order(BUYER, vec![line(feed, 1, 4_500)]).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::OrderPlacementFailed { .. }));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.is_retryable());
        assert!(f.health().await.is_err());

        storage.set_unavailable(false);
        assert_eq!(f.available_quantity(feed).await.unwrap(), 5);
        assert!(events.drain().is_empty());
    }

    #[tokio::test]
    async fn cart_snapshots_price_and_checks_out() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 5).await;
        let salt = seed(&f, "Mineral salt", 500, 2).await;

        let mut cart = Cart::new();
        f.add_to_cart(&mut cart, feed, 2).await.unwrap();
        f.add_to_cart(&mut cart, feed, 1).await.unwrap();
        f.add_to_cart(&mut cart, salt, 2).await.unwrap();
        let err = f.add_to_cart(&mut cart, salt, 1).await.unwrap_err();
        assert!(is_insufficient_stock(&err));
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total().unwrap(), Money::from_minor_units(3 * 4_500 + 2 * 500));

        let detail = f.place_cart(BUYER, &cart).await.unwrap();
        assert_eq!(detail.order.total(), cart.total().unwrap());
        cart.clear();
        assert_eq!(f.available_quantity(salt).await.unwrap(), 0);

        let listing = f.list_products(true).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name(), "Feed 50kg");
        assert_eq!(f.list_products(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restock_increments_and_rejects_non_positive_quantities() {
        let (f, _, bus) = setup();
        let events = bus.subscribe();
        let salt = seed(&f, "Mineral salt", 500, 0).await;

        let product = f.restock(salt, 12).await.unwrap();
        assert_eq!(product.available_quantity(), 12);
        assert_eq!(events.drain().len(), 1);

        let err = f.restock(salt, 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = f.restock(ProductId::new(999), 1).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn buyer_history_is_newest_first() {
        let (f, _, _) = setup();
        let feed = seed(&f, "Feed 50kg", 4_500, 10).await;
        let first = f.place_order(BUYER, vec![line(feed, 1, 4_500)]).await.unwrap();
        let second = f.place_order(BUYER, vec![line(feed, 2, 4_500)]).await.unwrap();
        f.place_order(OTHER_BUYER, vec![line(feed, 1, 4_500)]).await.unwrap();

        let history = f.orders_for_buyer(BUYER).await.unwrap();
        let ids: Vec<_> = history.iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec![second.order.id(), first.order.id()]);
    }
}
