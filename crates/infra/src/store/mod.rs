//! Storage boundary: inventory ledger, order store and shipment registry
//! behind one unit-of-work abstraction.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use r#trait::{
    InventoryLedger, OrderStore, ShipmentRegistry, Storage, StoreError, StoreResult, UnitOfWork,
};
