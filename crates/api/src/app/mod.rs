//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the orchestrators
//! - `routes/`: HTTP handlers, one file per area
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        auth: services.auth.clone(),
    };

    let carts = routes::cart_router().layer(axum::middleware::from_fn_with_state(
        auth_state.clone(),
        middleware::optional_auth_middleware,
    ));

    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(carts)
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
