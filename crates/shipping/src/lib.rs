//! Shipping domain module.
//!
//! Shipment lifecycle rules (no IO, no HTTP, no storage).

pub mod shipment;

pub use shipment::{Shipment, ShipmentStatus};
