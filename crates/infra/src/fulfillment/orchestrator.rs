use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use agrosupply_auth::{Role, UserDirectory, require_role};
use agrosupply_core::{DomainError, Entity, OrderId, ProductId, ShipmentId, UserId};
use agrosupply_events::EventBus;
use agrosupply_inventory::{NewProduct, Product};
use agrosupply_orders::{Cart, LineRequest, Order, OrderDraft, OrderLine, OrderStatus};
use agrosupply_shipping::{Shipment, ShipmentStatus};

use crate::external::Catalog;
use crate::store::{Storage, UnitOfWork};

use super::error::{FulfillmentError, FulfillmentResult};
use super::events::{FulfillmentEnvelope, FulfillmentEvent};

/// Behavior switches for the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    /// Return every line's quantity to inventory when an order is cancelled.
    pub restock_on_cancel: bool,
}

/// `GetOrderDetail` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub shipment: Option<Shipment>,
}

/// Result of a shipment status update, including the order status after any
/// delivery cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentUpdate {
    pub shipment: Shipment,
    pub order_status: OrderStatus,
}

/// Fulfillment orchestrator.
///
/// Coordinates the inventory ledger, order store and shipment registry. Every
/// multi-step operation runs inside one [`UnitOfWork`]: either all of its
/// writes commit or none do. Notifications go to the bus only after commit.
///
/// ## Generic Parameters
///
/// - `S`: storage (pool or in-process state)
/// - `D`: user/role directory
/// - `B`: event bus for committed-change notifications
pub struct Fulfillment<S, D, B> {
    storage: S,
    directory: D,
    bus: B,
    config: FulfillmentConfig,
}

impl<S, D, B> Fulfillment<S, D, B>
where
    S: Storage,
    D: UserDirectory,
    B: EventBus<FulfillmentEnvelope>,
{
    pub fn new(storage: S, directory: D, bus: B, config: FulfillmentConfig) -> Self {
        Self {
            storage,
            directory,
            bus,
            config,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> FulfillmentConfig {
        self.config
    }

    /// Place an order for `buyer_id`: reserve every line and create the order,
    /// all-or-nothing.
    ///
    /// Each line must quote the current catalog price.
    ///
    /// Any failure is reported as [`FulfillmentError::OrderPlacementFailed`]
    /// and leaves inventory and orders exactly as they were.
    #[instrument(skip(self, lines), fields(buyer_id = %buyer_id, lines = lines.len()), err)]
    pub async fn place_order(
        &self,
        buyer_id: UserId,
        lines: Vec<LineRequest>,
    ) -> FulfillmentResult<OrderDetail> {
        let detail = self
            .try_place_order(buyer_id, lines)
            .await
            .map_err(FulfillmentError::placement_failed)?;

        info!(
            order_id = %detail.order.id(),
            total = %detail.order.total(),
            "order placed"
        );
        self.publish(FulfillmentEvent::OrderPlaced {
            order_id: detail.order.id(),
            buyer_id,
            total: detail.order.total(),
            line_count: detail.lines.len(),
            occurred_at: detail.order.created_at(),
        });
        Ok(detail)
    }

    /// Check out a buyer's cart. The cart itself is left untouched; callers
    /// clear it once the order is placed.
    pub async fn place_cart(&self, buyer_id: UserId, cart: &Cart) -> FulfillmentResult<OrderDetail> {
        self.place_order(buyer_id, cart.to_requests()).await
    }

    async fn try_place_order(
        &self,
        buyer_id: UserId,
        lines: Vec<LineRequest>,
    ) -> FulfillmentResult<OrderDetail> {
        let draft = OrderDraft::new(buyer_id, lines)?;
        require_role(buyer_id, self.directory.lookup(buyer_id).as_ref(), Role::Buyer)?;

        let mut uow = self.storage.begin().await?;
        let outcome = reserve_and_create(uow.as_mut(), draft).await;
        finish(uow, outcome, "place_order").await
    }

    /// Status-only transitions: `Processed` or `Cancelled`.
    ///
    /// `Shipped` and `Delivered` are reachable only through
    /// [`Fulfillment::assign_carrier`] and the delivery cascade.
    #[instrument(skip(self), fields(order_id = %order_id, target = %target), err)]
    pub async fn advance_status(&self, order_id: OrderId, target: OrderStatus) -> FulfillmentResult<Order> {
        match target {
            OrderStatus::Cancelled => return self.cancel(order_id).await,
            OrderStatus::Processed => {}
            _ => {
                let current = self.get_order(order_id).await?.status();
                return Err(DomainError::invalid_transition(
                    "order",
                    current.as_str(),
                    target.as_str(),
                )
                .into());
            }
        }

        let mut uow = self.storage.begin().await?;
        let outcome = set_status(uow.as_mut(), order_id, target).await;
        let (from, order) = finish(uow, outcome, "advance_status").await?;

        info!(from = %from, to = %target, "order status advanced");
        self.publish_status_change(order_id, from, target);
        Ok(order)
    }

    /// Cancel from `Placed` or `Processed`, optionally restocking the lines in
    /// the same unit of work.
    #[instrument(skip(self), fields(order_id = %order_id, restock = self.config.restock_on_cancel), err)]
    pub async fn cancel(&self, order_id: OrderId) -> FulfillmentResult<Order> {
        let restock = self.config.restock_on_cancel;
        let mut uow = self.storage.begin().await?;
        let outcome = cancel_in(uow.as_mut(), order_id, restock).await;
        let (from, order, released) = finish(uow, outcome, "cancel").await?;

        info!(from = %from, restocked_lines = released.len(), "order cancelled");
        self.publish_status_change(order_id, from, OrderStatus::Cancelled);
        let now = Utc::now();
        for (product, quantity) in released {
            self.publish(FulfillmentEvent::StockReleased {
                product_id: product.id(),
                quantity,
                available: product.available_quantity(),
                occurred_at: now,
            });
        }
        Ok(order)
    }

    /// Hand a processed order to a carrier: create the shipment and mark the
    /// order shipped, atomically.
    #[instrument(skip(self), fields(order_id = %order_id, carrier_id = %carrier_id), err)]
    pub async fn assign_carrier(&self, order_id: OrderId, carrier_id: UserId) -> FulfillmentResult<Shipment> {
        let mut uow = self.storage.begin().await?;
        let outcome = self.assign_in(uow.as_mut(), order_id, carrier_id).await;
        let shipment = finish(uow, outcome, "assign_carrier").await?;

        info!(shipment_id = %shipment.id(), "carrier assigned");
        self.publish(FulfillmentEvent::ShipmentAssigned {
            shipment_id: shipment.id(),
            order_id,
            carrier_id,
            occurred_at: shipment.assigned_at(),
        });
        self.publish_status_change(order_id, OrderStatus::Processed, OrderStatus::Shipped);
        Ok(shipment)
    }

    async fn assign_in(
        &self,
        uow: &mut dyn UnitOfWork,
        order_id: OrderId,
        carrier_id: UserId,
    ) -> FulfillmentResult<Shipment> {
        let order = uow.get_order(order_id).await?;
        if order.status() != OrderStatus::Processed {
            return Err(DomainError::invalid_transition(
                "order",
                order.status().as_str(),
                OrderStatus::Shipped.as_str(),
            )
            .into());
        }
        require_role(carrier_id, self.directory.lookup(carrier_id).as_ref(), Role::Carrier)?;

        let shipment = uow.create_shipment(order_id, carrier_id, Utc::now()).await?;
        uow.set_status(order_id, OrderStatus::Shipped).await?;
        Ok(shipment)
    }

    /// Advance a shipment's sub-status. `Delivered` also moves the order to
    /// `Delivered` in the same unit of work.
    #[instrument(skip(self), fields(shipment_id = %shipment_id, target = %target), err)]
    pub async fn update_shipment_status(
        &self,
        shipment_id: ShipmentId,
        target: ShipmentStatus,
    ) -> FulfillmentResult<ShipmentUpdate> {
        let mut uow = self.storage.begin().await?;
        let outcome = update_shipment_in(uow.as_mut(), shipment_id, target).await;
        let (from, update, order_from) = finish(uow, outcome, "update_shipment_status").await?;

        info!(from = %from, to = %target, "shipment status updated");
        self.publish(FulfillmentEvent::ShipmentStatusChanged {
            shipment_id,
            order_id: update.shipment.order_id(),
            from,
            to: target,
            occurred_at: update.shipment.delivered_at().unwrap_or_else(Utc::now),
        });
        if let Some(order_from) = order_from {
            self.publish_status_change(update.shipment.order_id(), order_from, update.order_status);
        }
        Ok(update)
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn get_order_detail(&self, order_id: OrderId) -> FulfillmentResult<OrderDetail> {
        let mut uow = self.storage.begin().await?;
        let outcome = load_detail(uow.as_mut(), order_id).await;
        close_read(uow, outcome).await
    }

    pub async fn get_order(&self, order_id: OrderId) -> FulfillmentResult<Order> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.get_order(order_id).await.map_err(Into::into);
        close_read(uow, outcome).await
    }

    pub async fn get_shipment(&self, shipment_id: ShipmentId) -> FulfillmentResult<Shipment> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.get_shipment(shipment_id).await.map_err(Into::into);
        close_read(uow, outcome).await
    }

    pub async fn orders_for_buyer(&self, buyer_id: UserId) -> FulfillmentResult<Vec<Order>> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.orders_for_buyer(buyer_id).await.map_err(Into::into);
        close_read(uow, outcome).await
    }

    /// `orders_by_status(Processed)` is the warehouse dispatch queue.
    pub async fn orders_by_status(&self, status: OrderStatus) -> FulfillmentResult<Vec<Order>> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.orders_by_status(status).await.map_err(Into::into);
        close_read(uow, outcome).await
    }

    pub async fn shipments_for_carrier(&self, carrier_id: UserId) -> FulfillmentResult<Vec<Shipment>> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.shipments_for_carrier(carrier_id).await.map_err(Into::into);
        close_read(uow, outcome).await
    }

    /// Snapshot read; may be stale by the time the caller acts on it.
    pub async fn available_quantity(&self, product_id: ProductId) -> FulfillmentResult<i64> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.available_quantity(product_id).await.map_err(Into::into);
        close_read(uow, outcome).await
    }

    pub async fn list_products(&self, in_stock_only: bool) -> FulfillmentResult<Vec<Product>> {
        Ok(self.storage.listing(in_stock_only).await?)
    }

    /// Look the product up in the catalog and add it to `cart` with its
    /// current price.
    pub async fn add_to_cart(&self, cart: &mut Cart, product_id: ProductId, qty: i64) -> FulfillmentResult<()> {
        let product = self.storage.entry(product_id).await?;
        cart.add(&product, qty)?;
        debug!(product_id = %product_id, qty, "added to cart");
        Ok(())
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    pub async fn register_product(&self, new: NewProduct) -> FulfillmentResult<Product> {
        new.validate()?;
        let mut uow = self.storage.begin().await?;
        let outcome = uow.register_product(new).await.map_err(Into::into);
        let product = finish(uow, outcome, "register_product").await?;
        info!(product_id = %product.id(), "product registered");
        Ok(product)
    }

    /// Warehouse stock intake.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn restock(&self, product_id: ProductId, qty: i64) -> FulfillmentResult<Product> {
        let mut uow = self.storage.begin().await?;
        let outcome = uow.release(product_id, qty).await.map_err(Into::into);
        let product = finish(uow, outcome, "restock").await?;

        info!(available = product.available_quantity(), "stock received");
        self.publish(FulfillmentEvent::StockReleased {
            product_id,
            quantity: qty,
            available: product.available_quantity(),
            occurred_at: Utc::now(),
        });
        Ok(product)
    }

    pub async fn health(&self) -> FulfillmentResult<()> {
        Ok(self.storage.ping().await?)
    }

    fn publish_status_change(&self, order_id: OrderId, from: OrderStatus, to: OrderStatus) {
        self.publish(FulfillmentEvent::OrderStatusChanged {
            order_id,
            from,
            to,
            occurred_at: Utc::now(),
        });
    }

    /// Publish a committed change. Failures are logged, never propagated: the
    /// change is already durable.
    fn publish(&self, event: FulfillmentEvent) {
        let envelope = event.into_envelope();
        let event_type = envelope.event_type().to_string();
        if let Err(err) = self.bus.publish(envelope) {
            warn!(event_type = %event_type, error = ?err, "failed to publish fulfillment event");
        }
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    uow: Box<dyn UnitOfWork>,
    outcome: FulfillmentResult<T>,
    operation: &'static str,
) -> FulfillmentResult<T> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            match uow.rollback().await {
                Ok(()) => warn!(operation, error = %err, "unit of work rolled back"),
                Err(rb) => warn!(operation, error = %err, rollback_error = %rb, "rollback failed"),
            }
            Err(err)
        }
    }
}

/// End a read-only unit. Nothing was written, so the unit is always rolled back.
async fn close_read<T>(uow: Box<dyn UnitOfWork>, outcome: FulfillmentResult<T>) -> FulfillmentResult<T> {
    if let Err(rb) = uow.rollback().await {
        debug!(error = %rb, "read-only rollback failed");
    }
    outcome
}

async fn reserve_and_create(uow: &mut dyn UnitOfWork, draft: OrderDraft) -> FulfillmentResult<OrderDetail> {
    // Fast-fail against visible stock, summing repeated products.
    let mut wanted: BTreeMap<ProductId, i64> = BTreeMap::new();
    for line in draft.lines() {
        let total = wanted.entry(line.product_id).or_default();
        *total = total
            .checked_add(line.quantity)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
    }
    for (product_id, qty) in &wanted {
        let available = uow.available_quantity(*product_id).await?;
        if *qty > available {
            return Err(DomainError::InsufficientStock {
                product_id: *product_id,
                requested: *qty,
                available,
            }
            .into());
        }
    }

    // Lines are charged at the catalog price; a quote that differs is refused.
    for line in draft.lines() {
        let product = uow.reserve(line.product_id, line.quantity).await?;
        if product.unit_price() != line.unit_price {
            return Err(DomainError::PriceMismatch {
                product_id: line.product_id,
                quoted: line.unit_price,
                current: product.unit_price(),
            }
            .into());
        }
    }
    let (order, lines) = uow.create_order(draft, Utc::now()).await?;
    Ok(OrderDetail {
        order,
        lines,
        shipment: None,
    })
}

async fn set_status(
    uow: &mut dyn UnitOfWork,
    order_id: OrderId,
    target: OrderStatus,
) -> FulfillmentResult<(OrderStatus, Order)> {
    let from = uow.set_status(order_id, target).await?;
    let order = uow.get_order(order_id).await?;
    Ok((from, order))
}

async fn cancel_in(
    uow: &mut dyn UnitOfWork,
    order_id: OrderId,
    restock: bool,
) -> FulfillmentResult<(OrderStatus, Order, Vec<(Product, i64)>)> {
    let (from, order) = set_status(uow, order_id, OrderStatus::Cancelled).await?;
    let mut released = Vec::new();
    if restock {
        for line in uow.order_lines(order_id).await? {
            let product = uow.release(line.product_id, line.quantity).await?;
            released.push((product, line.quantity));
        }
    }
    Ok((from, order, released))
}

async fn update_shipment_in(
    uow: &mut dyn UnitOfWork,
    shipment_id: ShipmentId,
    target: ShipmentStatus,
) -> FulfillmentResult<(ShipmentStatus, ShipmentUpdate, Option<OrderStatus>)> {
    let (from, shipment) = uow
        .update_shipment_status(shipment_id, target, Utc::now())
        .await?;
    let (order_status, order_from) = if shipment.is_delivered() {
        let from = uow.set_status(shipment.order_id(), OrderStatus::Delivered).await?;
        (OrderStatus::Delivered, Some(from))
    } else {
        (uow.get_order(shipment.order_id()).await?.status(), None)
    };
    Ok((
        from,
        ShipmentUpdate {
            shipment,
            order_status,
        },
        order_from,
    ))
}

async fn load_detail(uow: &mut dyn UnitOfWork, order_id: OrderId) -> FulfillmentResult<OrderDetail> {
    let order = uow.get_order(order_id).await?;
    let lines = uow.order_lines(order_id).await?;
    let shipment = uow.shipment_for_order(order_id).await?;
    Ok(OrderDetail {
        order,
        lines,
        shipment,
    })
}
