//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/directory/bus wiring and the audit subscriber
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let identity = middleware::IdentityState {
        directory: services.directory(),
    };

    // Protected routes: require a caller known to the directory.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        identity,
        middleware::identity_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
