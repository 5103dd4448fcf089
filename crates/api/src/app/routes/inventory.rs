use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrosupply_auth::{Permission, Role};
use agrosupply_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products).post(register_product))
        .route("/products/:id/restock", post(restock_product))
}

/// Buyers only ever see what is in stock.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ProductsQuery>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::ViewCatalog) {
        return errors::forbidden(e);
    }
    let in_stock_only = principal.role() == Role::Buyer || query.in_stock.unwrap_or(false);

    match services.fulfillment().list_products(in_stock_only).await {
        Ok(products) => {
            let items = products.iter().map(dto::product_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::ManageInventory) {
        return errors::forbidden(e);
    }

    match services.fulfillment().register_product(body.into_new_product()).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn restock_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RestockRequest>,
) -> axum::response::Response {
    if let Err(e) = principal.require(Permission::ManageInventory) {
        return errors::forbidden(e);
    }
    let product_id = match id.parse::<ProductId>() {
        Ok(v) => v,
        Err(e) => return errors::bad_request(e),
    };

    match services.fulfillment().restock(product_id, body.quantity).await {
        Ok(product) => (StatusCode::OK, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
