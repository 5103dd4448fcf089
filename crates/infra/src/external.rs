//! Catalog collaborator: current product name, price and visible stock.
//!
//! Catalog CRUD lives outside the fulfillment core. The core only needs to look
//! entries up when a buyer adds them to a cart, and to list what can be sold.
//! Any [`Storage`] can serve as a catalog by reading the product rows.

use agrosupply_core::ProductId;
use agrosupply_inventory::Product;

use crate::store::{Storage, StoreResult};

#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn entry(&self, product_id: ProductId) -> StoreResult<Product>;

    /// Entries sorted by name; `in_stock_only` hides zero-stock products.
    async fn listing(&self, in_stock_only: bool) -> StoreResult<Vec<Product>>;
}

#[async_trait::async_trait]
impl<S> Catalog for S
where
    S: Storage + ?Sized,
{
    async fn entry(&self, product_id: ProductId) -> StoreResult<Product> {
        let mut uow = self.begin().await?;
        let product = uow.product(product_id).await;
        uow.rollback().await?;
        product
    }

    async fn listing(&self, in_stock_only: bool) -> StoreResult<Vec<Product>> {
        let mut uow = self.begin().await?;
        let products = uow.list_products(in_stock_only).await;
        uow.rollback().await?;
        products
    }
}
