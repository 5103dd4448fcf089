//! Orders domain module.
//!
//! This crate contains business rules for orders and the buyer cart,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod cart;
pub mod order;

pub use cart::{Cart, CartLine};
pub use order::{LineRequest, Order, OrderDraft, OrderLine, OrderStatus};
