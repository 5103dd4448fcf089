use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, sse::Event as SseEvent},
};

use crate::app::errors;
use crate::app::services::{self, AppServices};
use crate::context::PrincipalContext;

/// Liveness plus a storage round-trip.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.fulfillment().health().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id().get(),
        "name": principal.name(),
        "role": principal.role().as_str(),
        "permissions": principal.role().grants().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}

/// Committed fulfillment events as server-sent events. Admin only.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<
    axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>>,
    axum::response::Response,
> {
    if !principal.principal().is_admin() {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "the event stream is limited to admins",
        ));
    }
    Ok(services::event_stream(&services))
}
