use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use agrosupply_core::{DomainError, Entity, OrderId, ProductId, ShipmentId, UserId};
use agrosupply_inventory::{NewProduct, Product};
use agrosupply_orders::{Order, OrderDraft, OrderLine, OrderStatus};
use agrosupply_shipping::{Shipment, ShipmentStatus};

use super::r#trait::{
    InventoryLedger, OrderStore, ShipmentRegistry, Storage, StoreError, StoreResult, UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    lines: BTreeMap<OrderId, Vec<OrderLine>>,
    shipments: BTreeMap<ShipmentId, Shipment>,
    last_product_id: i64,
    last_order_id: i64,
    last_shipment_id: i64,
}

/// In-process storage.
///
/// Intended for tests/dev and single-node demos. Units of work are fully
/// serialized: `begin` takes the store lock and holds it until the unit is
/// committed or dropped, and writes go to a private copy that replaces the
/// shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<State>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `begin`/`ping` fail with `Unavailable` (outage simulation).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        self.check_available()?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnit { guard, working }))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

struct InMemoryUnit {
    guard: OwnedMutexGuard<State>,
    working: State,
}

impl InMemoryUnit {
    fn product_mut(&mut self, product_id: ProductId) -> StoreResult<&mut Product> {
        self.working
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found("product", product_id).into())
    }

    fn order_mut(&mut self, order_id: OrderId) -> StoreResult<&mut Order> {
        self.working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| DomainError::not_found("order", order_id).into())
    }
}

#[async_trait::async_trait]
impl InventoryLedger for InMemoryUnit {
    async fn reserve(&mut self, product_id: ProductId, qty: i64) -> StoreResult<Product> {
        let product = self.product_mut(product_id)?;
        product.reserve(qty)?;
        Ok(product.clone())
    }

    async fn release(&mut self, product_id: ProductId, qty: i64) -> StoreResult<Product> {
        let product = self.product_mut(product_id)?;
        product.release(qty)?;
        Ok(product.clone())
    }

    async fn available_quantity(&mut self, product_id: ProductId) -> StoreResult<i64> {
        Ok(self.product_mut(product_id)?.available_quantity())
    }

    async fn product(&mut self, product_id: ProductId) -> StoreResult<Product> {
        Ok(self.product_mut(product_id)?.clone())
    }

    async fn register_product(&mut self, new: NewProduct) -> StoreResult<Product> {
        let id = ProductId::new(self.working.last_product_id + 1);
        let product = Product::register(id, new)?;
        self.working.last_product_id = id.get();
        self.working.products.insert(id, product.clone());
        Ok(product)
    }

    async fn list_products(&mut self, in_stock_only: bool) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .working
            .products
            .values()
            .filter(|p| !in_stock_only || p.is_in_stock())
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        Ok(products)
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryUnit {
    async fn create_order(
        &mut self,
        draft: OrderDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<(Order, Vec<OrderLine>)> {
        for line in draft.lines() {
            if !self.working.products.contains_key(&line.product_id) {
                return Err(DomainError::not_found("product", line.product_id).into());
            }
        }
        let id = OrderId::new(self.working.last_order_id + 1);
        let (order, lines) = draft.into_order(id, created_at);
        self.working.last_order_id = id.get();
        self.working.orders.insert(id, order.clone());
        self.working.lines.insert(id, lines.clone());
        Ok((order, lines))
    }

    async fn set_status(&mut self, order_id: OrderId, status: OrderStatus) -> StoreResult<OrderStatus> {
        let order = self.order_mut(order_id)?;
        Ok(order.transition_to(status)?)
    }

    async fn get_order(&mut self, order_id: OrderId) -> StoreResult<Order> {
        Ok(self.order_mut(order_id)?.clone())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> StoreResult<Vec<OrderLine>> {
        self.order_mut(order_id)?;
        Ok(self.working.lines.get(&order_id).cloned().unwrap_or_default())
    }

    async fn orders_for_buyer(&mut self, buyer_id: UserId) -> StoreResult<Vec<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .rev()
            .filter(|o| o.buyer_id() == buyer_id)
            .cloned()
            .collect())
    }

    async fn orders_by_status(&mut self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .filter(|o| o.status() == status)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ShipmentRegistry for InMemoryUnit {
    async fn create_shipment(
        &mut self,
        order_id: OrderId,
        carrier_id: UserId,
        assigned_at: DateTime<Utc>,
    ) -> StoreResult<Shipment> {
        self.order_mut(order_id)?;
        if self.working.shipments.values().any(|s| s.order_id() == order_id) {
            return Err(DomainError::AlreadyShipped(order_id).into());
        }
        let id = ShipmentId::new(self.working.last_shipment_id + 1);
        let shipment = Shipment::assign(id, order_id, carrier_id, assigned_at);
        self.working.last_shipment_id = id.get();
        self.working.shipments.insert(id, shipment.clone());
        Ok(shipment)
    }

    async fn update_shipment_status(
        &mut self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<(ShipmentStatus, Shipment)> {
        let shipment = self
            .working
            .shipments
            .get_mut(&shipment_id)
            .ok_or_else(|| DomainError::not_found("shipment", shipment_id))?;
        let from = shipment.advance(status, at)?;
        Ok((from, shipment.clone()))
    }

    async fn get_shipment(&mut self, shipment_id: ShipmentId) -> StoreResult<Shipment> {
        self.working
            .shipments
            .get(&shipment_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("shipment", shipment_id).into())
    }

    async fn shipment_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Shipment>> {
        Ok(self
            .working
            .shipments
            .values()
            .find(|s| s.order_id() == order_id)
            .cloned())
    }

    async fn shipments_for_carrier(&mut self, carrier_id: UserId) -> StoreResult<Vec<Shipment>> {
        Ok(self
            .working
            .shipments
            .values()
            .filter(|s| s.carrier_id() == carrier_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryUnit { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
