//! Inventory domain module.
//!
//! This crate contains the stock rules for products, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). The ledger in
//! `agrosupply-infra` applies these rules inside a unit of work.

pub mod product;

pub use product::{NewProduct, Product};
