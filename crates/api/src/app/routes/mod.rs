use axum::{Router, routing::get};

pub mod inventory;
pub mod orders;
pub mod shipments;
pub mod system;

/// Router for every endpoint that needs a caller identity.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/events/stream", get(system::stream))
        .nest("/orders", orders::router())
        .nest("/shipments", shipments::router())
        .nest("/inventory", inventory::router())
}
