//! `agrosupply-events`: fulfillment notifications.
//!
//! Events describe state changes that have already been committed. They are an
//! audit/notification stream layered on top of the relational store, which
//! remains the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
