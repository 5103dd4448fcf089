//! Postgres-backed storage.
//!
//! Each unit of work is one SQL transaction. Rows that a unit is about to
//! modify are read with `SELECT ... FOR UPDATE`, so two concurrent
//! reservations against the same product are serialized by the row lock and
//! the second one sees the first one's decrement.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (unique violation) | `23505` | `Conflict` (or `AlreadyShipped` on `shipments.order_id`) |
//! | Database (check violation) | `23514` | `Domain(InvariantViolation)` |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` |
//! | ColumnDecode / Decode / RowNotFound | N/A | `Corrupt` |

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use agrosupply_core::{DomainError, Entity, Money, OrderId, ProductId, ShipmentId, UserId};
use agrosupply_inventory::{NewProduct, Product};
use agrosupply_orders::{Order, OrderDraft, OrderLine, OrderStatus};
use agrosupply_shipping::{Shipment, ShipmentStatus};

use super::r#trait::{
    InventoryLedger, OrderStore, ShipmentRegistry, Storage, StoreError, StoreResult, UnitOfWork,
};

/// Postgres storage handle. Cheap to clone (the pool is reference-counted).
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to `database_url` and apply pending migrations.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let storage = Self::new(pool);
        storage.migrate().await?;
        Ok(storage)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Storage for PostgresStorage {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgUnit { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

const PRODUCT_COLUMNS: &str = "id, name, unit_price_cents, available_quantity";
const ORDER_COLUMNS: &str = "id, buyer_id, created_at, status, total_cents";
const SHIPMENT_COLUMNS: &str = "id, order_id, carrier_id, status, assigned_at, delivered_at";

impl PgUnit {
    async fn lock_product(&mut self, product_id: ProductId) -> StoreResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;
        product_from_row(&row)
    }

    async fn write_quantity(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query("UPDATE products SET available_quantity = $2 WHERE id = $1")
            .bind(product.id().get())
            .bind(product.available_quantity())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("write_quantity", e))?;
        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Order> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(order_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e))?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        order_from_row(&row)
    }

    async fn lock_shipment(&mut self, shipment_id: ShipmentId) -> StoreResult<Shipment> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(shipment_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_shipment", e))?
            .ok_or_else(|| DomainError::not_found("shipment", shipment_id))?;
        shipment_from_row(&row)
    }
}

#[async_trait::async_trait]
impl InventoryLedger for PgUnit {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn reserve(&mut self, product_id: ProductId, qty: i64) -> StoreResult<Product> {
        let mut product = self.lock_product(product_id).await?;
        product.reserve(qty)?;
        self.write_quantity(&product).await?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn release(&mut self, product_id: ProductId, qty: i64) -> StoreResult<Product> {
        let mut product = self.lock_product(product_id).await?;
        product.release(qty)?;
        self.write_quantity(&product).await?;
        Ok(product)
    }

    async fn available_quantity(&mut self, product_id: ProductId) -> StoreResult<i64> {
        let qty: Option<i64> =
            sqlx::query_scalar("SELECT available_quantity FROM products WHERE id = $1")
                .bind(product_id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("available_quantity", e))?;
        qty.ok_or_else(|| DomainError::not_found("product", product_id).into())
    }

    async fn product(&mut self, product_id: ProductId) -> StoreResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product", e))?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;
        product_from_row(&row)
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    async fn register_product(&mut self, new: NewProduct) -> StoreResult<Product> {
        new.validate()?;
        let sql = format!(
            "INSERT INTO products (name, unit_price_cents, available_quantity) \
             VALUES ($1, $2, $3) RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.name.trim())
            .bind(new.unit_price.minor_units())
            .bind(new.initial_quantity)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("register_product", e))?;
        product_from_row(&row)
    }

    async fn list_products(&mut self, in_stock_only: bool) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1 = FALSE OR available_quantity > 0) ORDER BY name, id"
        );
        let rows = sqlx::query(&sql)
            .bind(in_stock_only)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait::async_trait]
impl OrderStore for PgUnit {
    #[instrument(skip(self, draft), fields(buyer_id = %draft.buyer_id(), lines = draft.lines().len()), err)]
    async fn create_order(
        &mut self,
        draft: OrderDraft,
        created_at: DateTime<Utc>,
    ) -> StoreResult<(Order, Vec<OrderLine>)> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (buyer_id, created_at, status, total_cents) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(draft.buyer_id().get())
        .bind(created_at)
        .bind(OrderStatus::Placed.as_str())
        .bind(draft.total().minor_units())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let (order, lines) = draft.into_order(OrderId::new(id), created_at);
        for line in &lines {
            sqlx::query(
                "INSERT INTO order_lines (order_id, line_no, product_id, quantity, unit_price_cents) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(line.line_no as i32)
            .bind(line.product_id.get())
            .bind(line.quantity)
            .bind(line.unit_price.minor_units())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }
        Ok((order, lines))
    }

    #[instrument(skip(self), fields(order_id = %order_id, status = %status), err)]
    async fn set_status(&mut self, order_id: OrderId, status: OrderStatus) -> StoreResult<OrderStatus> {
        let mut order = self.lock_order(order_id).await?;
        let from = order.transition_to(status)?;
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.get())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_status", e))?;
        Ok(from)
    }

    async fn get_order(&mut self, order_id: OrderId) -> StoreResult<Order> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        order_from_row(&row)
    }

    async fn order_lines(&mut self, order_id: OrderId) -> StoreResult<Vec<OrderLine>> {
        self.get_order(order_id).await?;
        let rows = sqlx::query(
            "SELECT order_id, line_no, product_id, quantity, unit_price_cents \
             FROM order_lines WHERE order_id = $1 ORDER BY line_no",
        )
        .bind(order_id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("order_lines", e))?;
        rows.iter().map(line_from_row).collect()
    }

    async fn orders_for_buyer(&mut self, buyer_id: UserId) -> StoreResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY id DESC");
        let rows = sqlx::query(&sql)
            .bind(buyer_id.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("orders_for_buyer", e))?;
        rows.iter().map(order_from_row).collect()
    }

    async fn orders_by_status(&mut self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("orders_by_status", e))?;
        rows.iter().map(order_from_row).collect()
    }
}

#[async_trait::async_trait]
impl ShipmentRegistry for PgUnit {
    #[instrument(skip(self), fields(order_id = %order_id, carrier_id = %carrier_id), err)]
    async fn create_shipment(
        &mut self,
        order_id: OrderId,
        carrier_id: UserId,
        assigned_at: DateTime<Utc>,
    ) -> StoreResult<Shipment> {
        self.lock_order(order_id).await?;
        if self.shipment_for_order(order_id).await?.is_some() {
            return Err(DomainError::AlreadyShipped(order_id).into());
        }
        let sql = format!(
            "INSERT INTO shipments (order_id, carrier_id, status, assigned_at) \
             VALUES ($1, $2, $3, $4) RETURNING {SHIPMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order_id.get())
            .bind(carrier_id.get())
            .bind(ShipmentStatus::Preparing.as_str())
            .bind(assigned_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Domain(DomainError::AlreadyShipped(order_id))
                } else {
                    map_sqlx_error("insert_shipment", e)
                }
            })?;
        shipment_from_row(&row)
    }

    #[instrument(skip(self), fields(shipment_id = %shipment_id, status = %status), err)]
    async fn update_shipment_status(
        &mut self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<(ShipmentStatus, Shipment)> {
        let mut shipment = self.lock_shipment(shipment_id).await?;
        let from = shipment.advance(status, at)?;
        sqlx::query("UPDATE shipments SET status = $2, delivered_at = $3 WHERE id = $1")
            .bind(shipment_id.get())
            .bind(status.as_str())
            .bind(shipment.delivered_at())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_shipment_status", e))?;
        Ok((from, shipment))
    }

    async fn get_shipment(&mut self, shipment_id: ShipmentId) -> StoreResult<Shipment> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(shipment_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_shipment", e))?
            .ok_or_else(|| DomainError::not_found("shipment", shipment_id))?;
        shipment_from_row(&row)
    }

    async fn shipment_for_order(&mut self, order_id: OrderId) -> StoreResult<Option<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE order_id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("shipment_for_order", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    async fn shipments_for_carrier(&mut self, carrier_id: UserId) -> StoreResult<Vec<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE carrier_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(carrier_id.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("shipments_for_carrier", e))?;
        rows.iter().map(shipment_from_row).collect()
    }
}

#[async_trait::async_trait]
impl UnitOfWork for PgUnit {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

// Row decoding

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column '{name}': {e}")))
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product::from_parts(
        ProductId::new(column(row, "id")?),
        column(row, "name")?,
        Money::from_minor_units(column(row, "unit_price_cents")?),
        column(row, "available_quantity")?,
    )?)
}

fn order_from_row(row: &PgRow) -> StoreResult<Order> {
    let status: String = column(row, "status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(Order::from_parts(
        OrderId::new(column(row, "id")?),
        UserId::new(column(row, "buyer_id")?),
        column(row, "created_at")?,
        status,
        Money::from_minor_units(column(row, "total_cents")?),
    ))
}

fn line_from_row(row: &PgRow) -> StoreResult<OrderLine> {
    let line_no: i32 = column(row, "line_no")?;
    Ok(OrderLine {
        order_id: OrderId::new(column(row, "order_id")?),
        line_no: u32::try_from(line_no)
            .map_err(|_| StoreError::Corrupt(format!("negative line_no {line_no}")))?,
        product_id: ProductId::new(column(row, "product_id")?),
        quantity: column(row, "quantity")?,
        unit_price: Money::from_minor_units(column(row, "unit_price_cents")?),
    })
}

fn shipment_from_row(row: &PgRow) -> StoreResult<Shipment> {
    let status: String = column(row, "status")?;
    let status = status
        .parse::<ShipmentStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(Shipment::from_parts(
        ShipmentId::new(column(row, "id")?),
        OrderId::new(column(row, "order_id")?),
        UserId::new(column(row, "carrier_id")?),
        status,
        column(row, "assigned_at")?,
        column(row, "delivered_at")?,
    )?)
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Conflict(msg),
                Some("23514") => StoreError::Domain(DomainError::invariant(msg)),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::RowNotFound => {
            StoreError::Corrupt(format!("unexpected row not found in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

/// Run against a scratch database with
/// `DATABASE_URL=postgres://... cargo test -p agrosupply-infra -- --ignored`.
/// Rows are never cleaned up, so every test works on products it registers itself.
#[cfg(test)]
mod tests {
    use super::*;
    use agrosupply_orders::LineRequest;

    async fn storage() -> Option<PostgresStorage> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(PostgresStorage::connect(&url, 4).await.expect("failed to connect"))
    }

    async fn seed(storage: &PostgresStorage, name: &str, cents: i64, qty: i64) -> Product {
        let mut uow = storage.begin().await.unwrap();
        let product = uow
            .register_product(NewProduct::new(name, Money::from_minor_units(cents), qty))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        product
    }

    async fn reserve_and_commit(storage: PostgresStorage, product_id: ProductId, qty: i64) -> StoreResult<()> {
        let mut uow = storage.begin().await?;
        match uow.reserve(product_id, qty).await {
            Ok(_) => uow.commit().await,
            Err(err) => {
                uow.rollback().await?;
                Err(err)
            }
        }
    }

    async fn ship_and_commit(
        storage: PostgresStorage,
        order_id: OrderId,
        carrier_id: UserId,
    ) -> StoreResult<Shipment> {
        let mut uow = storage.begin().await?;
        match uow.create_shipment(order_id, carrier_id, Utc::now()).await {
            Ok(shipment) => {
                uow.commit().await?;
                Ok(shipment)
            }
            Err(err) => {
                uow.rollback().await?;
                Err(err)
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "needs DATABASE_URL"]
    async fn row_lock_serializes_competing_reservations() {
        let Some(storage) = storage().await else { return };
        let feed = seed(&storage, "Feed 50kg", 4_500, 5).await.id();

        let a = tokio::spawn(reserve_and_commit(storage.clone(), feed, 3));
        let b = tokio::spawn(reserve_and_commit(storage.clone(), feed, 3));
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StoreError::Domain(DomainError::InsufficientStock { available: 2, .. }))
        )));
        let mut uow = storage.begin().await.unwrap();
        assert_eq!(uow.available_quantity(feed).await.unwrap(), 2);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn rolled_back_checkout_leaves_stock_and_orders_untouched() {
        let Some(storage) = storage().await else { return };
        let feed = seed(&storage, "Feed 50kg", 1_000, 10).await;
        let wormer = seed(&storage, "Wormer", 2_000, 1).await;
        let buyer = UserId::new(feed.id().get());

        let mut uow = storage.begin().await.unwrap();
        uow.reserve(feed.id(), 4).await.unwrap();
        let draft = OrderDraft::new(
            buyer,
            vec![LineRequest::new(feed.id(), 4, feed.unit_price())],
        )
        .unwrap();
        uow.create_order(draft, Utc::now()).await.unwrap();
        let err = uow.reserve(wormer.id(), 2).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::InsufficientStock { .. })));
        uow.rollback().await.unwrap();

        let mut uow = storage.begin().await.unwrap();
        assert_eq!(uow.available_quantity(feed.id()).await.unwrap(), 10);
        assert_eq!(uow.available_quantity(wormer.id()).await.unwrap(), 1);
        assert!(uow.orders_for_buyer(buyer).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ignore = "needs DATABASE_URL"]
    async fn concurrent_carriers_cannot_both_take_an_order() {
        let Some(storage) = storage().await else { return };
        let salt = seed(&storage, "Mineral salt", 500, 3).await;

        let mut uow = storage.begin().await.unwrap();
        let draft = OrderDraft::new(
            UserId::new(7),
            vec![LineRequest::new(salt.id(), 1, salt.unit_price())],
        )
        .unwrap();
        let (order, _) = uow.create_order(draft, Utc::now()).await.unwrap();
        uow.commit().await.unwrap();
        let order_id = order.id();

        let a = tokio::spawn(ship_and_commit(storage.clone(), order_id, UserId::new(9)));
        let b = tokio::spawn(ship_and_commit(storage.clone(), order_id, UserId::new(10)));
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StoreError::Domain(DomainError::AlreadyShipped(id))) if *id == order_id
        )));
        let mut uow = storage.begin().await.unwrap();
        assert!(uow.shipment_for_order(order_id).await.unwrap().is_some());
    }
}
