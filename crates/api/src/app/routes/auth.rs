use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use storefront_auth::Registration;

use crate::app::errors::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<Registration>,
) -> axum::response::Response {
    match services.auth.register(body).await {
        Ok(tokens) => (StatusCode::CREATED, Json(tokens)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::LoginRequest>,
) -> axum::response::Response {
    match services.auth.login(&body.login, &body.password).await {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::RefreshTokenRequest>,
) -> axum::response::Response {
    match services.auth.refresh(&body.refresh_token).await {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn revoke(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::RefreshTokenRequest>,
) -> axum::response::Response {
    match services.auth.revoke(&body.refresh_token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.auth.logout(principal.user_id()).await {
        Ok(revoked) => Json(dto::LogoutResponse { revoked }).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> axum::response::Response {
    Json(dto::MeResponse::from(&principal)).into_response()
}
