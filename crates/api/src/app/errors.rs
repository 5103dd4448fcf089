use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use agrosupply_auth::AuthzError;
use agrosupply_core::DomainError;
use agrosupply_infra::fulfillment::{ErrorKind, FulfillmentError};
use agrosupply_infra::store::StoreError;

pub fn fulfillment_error_to_response(err: FulfillmentError) -> axum::response::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "request failed");
    }
    json_error_with_retry(status, err.code(), err.to_string(), err.is_retryable())
}

fn status_for(err: &FulfillmentError) -> StatusCode {
    if let FulfillmentError::OrderPlacementFailed { reason } = err {
        return status_for(reason);
    }
    if let FulfillmentError::Infrastructure(store) = err {
        return match store {
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
    }

    match (err.kind(), err.domain()) {
        (ErrorKind::Validation, _) => StatusCode::BAD_REQUEST,
        (_, Some(DomainError::NotFound { .. })) => StatusCode::NOT_FOUND,
        (_, Some(DomainError::Unauthorized(_))) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, Some(DomainError::InvariantViolation(_))) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::CONFLICT,
    }
}

/// The caller's own role is insufficient.
pub fn forbidden(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn bad_request(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with_retry(status, code, message, false)
}

fn json_error_with_retry(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    retryable: bool,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "retryable": retryable,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use agrosupply_core::{OrderId, ProductId};

    use super::*;

    #[test]
    fn maps_failure_classes_to_status_codes() {
        let stock: FulfillmentError = DomainError::InsufficientStock {
            product_id: ProductId::new(1),
            requested: 3,
            available: 2,
        }
        .into();
        assert_eq!(status_for(&stock), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&FulfillmentError::placement_failed(stock)),
            StatusCode::CONFLICT
        );

        let empty: FulfillmentError = DomainError::EmptyCart.into();
        assert_eq!(status_for(&empty), StatusCode::BAD_REQUEST);

        let missing: FulfillmentError = DomainError::not_found("order", OrderId::new(4)).into();
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);

        let down: FulfillmentError = StoreError::Unavailable("pool closed".into()).into();
        assert_eq!(status_for(&down), StatusCode::SERVICE_UNAVAILABLE);

        let race: FulfillmentError = StoreError::Conflict("40001".into()).into();
        assert_eq!(status_for(&race), StatusCode::CONFLICT);
    }
}
