use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use agrosupply_core::{DomainError, OrderId, ProductId, ShipmentId, UserId};
use agrosupply_inventory::{NewProduct, Product};
use agrosupply_orders::{Order, OrderDraft, OrderLine, OrderStatus};
use agrosupply_shipping::{Shipment, ShipmentStatus};

/// Storage operation error.
///
/// `Unavailable` and `Conflict` are **infrastructure** failures: the operation
/// did not happen and may be retried. `Domain` carries a business-rule
/// rejection raised while applying a write (insufficient stock, invalid
/// transition, duplicate shipment, unknown record).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Serialization failure, deadlock, or lost race on a unique key.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// A persisted row could not be decoded into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-product available quantity with a non-negativity guarantee.
#[async_trait::async_trait]
pub trait InventoryLedger: Send {
    /// Decrement availability; fails with `InsufficientStock` and changes
    /// nothing when `qty` exceeds what is available.
    async fn reserve(&mut self, product_id: ProductId, qty: i64) -> StoreResult<Product>;

    /// Increment availability.
    async fn release(&mut self, product_id: ProductId, qty: i64) -> StoreResult<Product>;

    async fn available_quantity(&mut self, product_id: ProductId) -> StoreResult<i64>;

    async fn product(&mut self, product_id: ProductId) -> StoreResult<Product>;

    async fn register_product(&mut self, new: NewProduct) -> StoreResult<Product>;

    /// Products sorted by name; `in_stock_only` hides zero-stock rows.
    async fn list_products(&mut self, in_stock_only: bool) -> StoreResult<Vec<Product>>;
}

/// Order headers and their immutable lines.
#[async_trait::async_trait]
pub trait OrderStore: Send {
    /// Persist the order (status `Placed`) and all of its lines in one write.
    async fn create_order(
        &mut self,
        draft: OrderDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<(Order, Vec<OrderLine>)>;

    /// Returns the previous status.
    async fn set_status(&mut self, order_id: OrderId, status: OrderStatus) -> StoreResult<OrderStatus>;

    async fn get_order(&mut self, order_id: OrderId) -> StoreResult<Order>;

    async fn order_lines(&mut self, order_id: OrderId) -> StoreResult<Vec<OrderLine>>;

    /// Newest first.
    async fn orders_for_buyer(&mut self, buyer_id: UserId) -> StoreResult<Vec<Order>>;

    /// Oldest first (work-queue order).
    async fn orders_by_status(&mut self, status: OrderStatus) -> StoreResult<Vec<Order>>;
}

/// Shipments, at most one per order.
#[async_trait::async_trait]
pub trait ShipmentRegistry: Send {
    /// Fails with `AlreadyShipped` when the order already has a shipment.
    async fn create_shipment(
        &mut self,
        order_id: OrderId,
        carrier_id: UserId,
        assigned_at: DateTime<Utc>,
    ) -> StoreResult<Shipment>;

    /// Returns the previous status alongside the updated shipment.
    async fn update_shipment_status(
        &mut self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<(ShipmentStatus, Shipment)>;

    async fn get_shipment(&mut self, shipment_id: ShipmentId) -> StoreResult<Shipment>;

    async fn shipment_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Shipment>>;

    async fn shipments_for_carrier(&mut self, carrier_id: UserId) -> StoreResult<Vec<Shipment>>;
}

/// One atomic unit of work over every store.
///
/// Writes become visible to other units only after [`UnitOfWork::commit`].
/// Dropping the unit without committing discards every write.
#[async_trait::async_trait]
pub trait UnitOfWork: InventoryLedger + OrderStore + ShipmentRegistry + Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Injected storage handle (connection pool or in-process state).
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    /// Cheap liveness probe.
    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait::async_trait]
impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        (**self).begin().await
    }

    async fn ping(&self) -> StoreResult<()> {
        (**self).ping().await
    }
}
