//! Fulfillment orchestrator: checkout, order lifecycle, carrier assignment
//! and the delivery cascade.

pub mod error;
pub mod events;
pub mod orchestrator;

pub use error::{ErrorKind, FulfillmentError, FulfillmentResult};
pub use events::{FulfillmentEnvelope, FulfillmentEvent};
pub use orchestrator::{Fulfillment, FulfillmentConfig, OrderDetail, ShipmentUpdate};
