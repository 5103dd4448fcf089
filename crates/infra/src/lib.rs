//! Infrastructure layer: storage backends, the fulfillment orchestrator,
//! configuration, and external collaborators.

pub mod config;
pub mod external;
pub mod fulfillment;
pub mod store;

mod integration_tests;
