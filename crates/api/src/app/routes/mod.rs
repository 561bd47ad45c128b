use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod system;

/// Endpoints that need no identity.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/revoke", post(auth::revoke))
}

/// Cart endpoints: a bearer token is optional, a session id stands in for it.
pub fn cart_router() -> Router {
    Router::new()
        .route("/cart", get(cart::get_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:variant_id", delete(cart::remove_item))
}

/// Endpoints that require an authenticated user.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/admin/orders/:id/status", put(admin::set_order_status))
}
