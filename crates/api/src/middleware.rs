use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use agrosupply_auth::UserDirectory;
use agrosupply_core::UserId;

use crate::context::PrincipalContext;

/// Header carrying the caller's user id. Authentication happens upstream
/// (reverse proxy / gateway); this service only resolves the id to a role.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct IdentityState {
    pub directory: Arc<dyn UserDirectory>,
}

pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = extract_user_id(req.headers())?;

    let entry = state.directory.lookup(user_id).ok_or_else(|| {
        tracing::debug!(user_id = %user_id, "unknown caller");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(PrincipalContext::from_entry(&entry));

    Ok(next.run(req).await)
}

fn extract_user_id(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    let header = headers.get(USER_ID_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
    let raw = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
    raw.trim().parse::<UserId>().map_err(|_| StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn user_id_header_must_be_a_positive_integer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_id(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" 7 "));
        assert_eq!(extract_user_id(&headers), Ok(UserId::new(7)));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("seven"));
        assert_eq!(extract_user_id(&headers), Err(StatusCode::UNAUTHORIZED));
    }
}
