use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrosupply_auth::{Permission, Role};
use agrosupply_core::{ShipmentId, UserId};
use agrosupply_shipping::{Shipment, ShipmentStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_shipments))
        .route("/:id", get(get_shipment))
        .route("/:id/status", post(update_shipment_status))
}

/// Carriers get their worklist; staff pass `carrier_id`.
pub async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ShipmentsQuery>,
) -> axum::response::Response {
    let carrier_id = match (principal.role(), query.carrier_id) {
        (Role::Carrier, _) => principal.user_id(),
        (Role::Warehouse | Role::Admin, Some(id)) => UserId::new(id),
        (Role::Warehouse | Role::Admin, None) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "carrier_id query parameter is required",
            );
        }
        (Role::Buyer, _) => {
            return errors::json_error(
                StatusCode::FORBIDDEN,
                "forbidden",
                "buyers follow shipments through their orders",
            );
        }
    };

    match services.fulfillment().shipments_for_carrier(carrier_id).await {
        Ok(shipments) => {
            let items = shipments.iter().map(dto::shipment_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shipment_id = match id.parse::<ShipmentId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    match services.fulfillment().get_shipment(shipment_id).await {
        Ok(shipment) if can_see(&principal, &shipment) => {
            (StatusCode::OK, Json(dto::shipment_to_json(&shipment))).into_response()
        }
        Ok(_) => not_found(shipment_id),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

/// Carriers may only move their own shipments.
pub async fn update_shipment_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ShipmentStatusRequest>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::UpdateShipment) {
        return errors::forbidden(e);
    }
    let shipment_id = match id.parse::<ShipmentId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };
    let target = match body.status.parse::<ShipmentStatus>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    let fulfillment = services.fulfillment();
    match fulfillment.get_shipment(shipment_id).await {
        Ok(shipment) if can_see(&principal, &shipment) => {}
        Ok(_) => return not_found(shipment_id),
        Err(e) => return errors::fulfillment_error_to_response(e),
    }

    match fulfillment.update_shipment_status(shipment_id, target).await {
        Ok(update) => (StatusCode::OK, Json(dto::shipment_update_to_json(&update))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

fn can_see(principal: &PrincipalContext, shipment: &Shipment) -> bool {
    match principal.role() {
        Role::Carrier => shipment.carrier_id() == principal.user_id(),
        Role::Warehouse | Role::Admin => true,
        Role::Buyer => false,
    }
}

fn not_found(shipment_id: ShipmentId) -> axum::response::Response {
    errors::json_error(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("shipment {shipment_id} not found"),
    )
}
