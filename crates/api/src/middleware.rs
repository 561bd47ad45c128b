use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use storefront_infra::AuthService;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
}

/// Require a valid bearer access token.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())?.ok_or_else(unauthorized)?;
    let principal = authenticate(&state, token)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Accept anonymous requests, but reject a bearer token that is present and
/// invalid instead of silently treating the caller as anonymous.
pub async fn optional_auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    if let Some(token) = extract_bearer(req.headers())? {
        let principal = authenticate(&state, token)?;
        req.extensions_mut().insert(principal);
    }
    Ok(next.run(req).await)
}

fn authenticate(state: &AuthState, token: &str) -> Result<PrincipalContext, Response> {
    state
        .auth
        .verify_access_token(token)
        .map(PrincipalContext::from)
        .map_err(|_e| unauthorized())
}

fn unauthorized() -> Response {
    json_error(
        StatusCode::UNAUTHORIZED,
        "invalid_or_expired_token",
        "a valid bearer access token is required",
    )
}

/// `Ok(None)` when no `Authorization` header was sent.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, Response> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| unauthorized())?;

    let header = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(unauthorized());
    }

    Ok(Some(token))
}
