use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrosupply_auth::{Permission, Role};
use agrosupply_core::{OrderId, UserId};
use agrosupply_infra::fulfillment::OrderDetail;
use agrosupply_orders::{Cart, Order, OrderStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/advance", post(advance_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/shipment", post(assign_carrier))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::PlaceOrder) {
        return errors::forbidden(e);
    }

    // The cart snapshots each price from the catalog.
    let fulfillment = services.fulfillment();
    let mut cart = Cart::new();
    for line in &body.lines {
        if let Err(e) = fulfillment.add_to_cart(&mut cart, line.product_id(), line.quantity).await {
            return errors::fulfillment_error_to_response(e);
        }
    }

    match fulfillment.place_cart(principal.user_id(), &cart).await {
        Ok(detail) => (StatusCode::CREATED, Json(dto::detail_to_json(&detail))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

/// Buyers see their own history, carriers the orders they deliver. Staff
/// filter by `buyer_id` or `status`, defaulting to the dispatch queue.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::OrdersQuery>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::ViewOrders) {
        return errors::forbidden(e);
    }
    let fulfillment = services.fulfillment();

    let result = match principal.role() {
        Role::Buyer => fulfillment.orders_for_buyer(principal.user_id()).await,
        Role::Carrier => carrier_orders(&services, principal.user_id()).await,
        Role::Warehouse | Role::Admin => match (query.buyer_id, query.status.as_deref()) {
            (Some(buyer), _) => fulfillment.orders_for_buyer(UserId::new(buyer)).await,
            (None, Some(raw)) => match raw.parse::<OrderStatus>() {
                Ok(status) => fulfillment.orders_by_status(status).await,
                Err(e) => return errors::bad_request(e),
            },
            (None, None) => fulfillment.orders_by_status(OrderStatus::Processed).await,
        },
    };

    match result {
        Ok(orders) => {
            let items = orders.iter().map(dto::order_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

async fn carrier_orders(
    services: &AppServices,
    carrier_id: UserId,
) -> agrosupply_infra::fulfillment::FulfillmentResult<Vec<Order>> {
    let fulfillment = services.fulfillment();
    let mut orders = Vec::new();
    for shipment in fulfillment.shipments_for_carrier(carrier_id).await? {
        orders.push(fulfillment.get_order(shipment.order_id()).await?);
    }
    Ok(orders)
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::ViewOrders) {
        return errors::forbidden(e);
    }
    let order_id = match id.parse::<OrderId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    match services.fulfillment().get_order_detail(order_id).await {
        Ok(detail) if can_see(&principal, &detail) => {
            (StatusCode::OK, Json(dto::detail_to_json(&detail))).into_response()
        }
        // Someone else's order looks exactly like a missing one.
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("order {order_id} not found")),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

fn can_see(principal: &PrincipalContext, detail: &OrderDetail) -> bool {
    match principal.role() {
        Role::Buyer => detail.order.buyer_id() == principal.user_id(),
        Role::Carrier => detail
            .shipment
            .as_ref()
            .is_some_and(|s| s.carrier_id() == principal.user_id()),
        Role::Warehouse | Role::Admin => true,
    }
}

pub async fn advance_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdvanceStatusRequest>,
) -> axum::response::Response {
    let order_id = match id.parse::<OrderId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };
    let target = match body.status.parse::<OrderStatus>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    let required = if target == OrderStatus::Cancelled {
        Permission::CancelOrder
    } else {
        Permission::AdvanceOrder
    };
    if let Err(e) = principal.require(required) {
        return errors::forbidden(e);
    }

    match services.fulfillment().advance_status(order_id, target).await {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::CancelOrder) {
        return errors::forbidden(e);
    }
    let order_id = match id.parse::<OrderId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    match services.fulfillment().cancel(order_id).await {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn assign_carrier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignCarrierRequest>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::AssignCarrier) {
        return errors::forbidden(e);
    }
    let order_id = match id.parse::<OrderId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    match services
        .fulfillment()
        .assign_carrier(order_id, UserId::new(body.carrier_id))
        .await
    {
        Ok(shipment) => (StatusCode::CREATED, Json(dto::shipment_to_json(&shipment))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
