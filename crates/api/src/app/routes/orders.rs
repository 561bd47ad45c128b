use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use storefront_core::OrderId;

use crate::app::errors::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let delivery = match body.into_delivery() {
        Ok(d) => d,
        Err(msg) => return errors::bad_request(msg),
    };

    match services.checkout.create_order(principal.user_id(), delivery).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::OrderResponse::from(&order))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.orders.list_orders(principal.user_id()).await {
        Ok(orders) => {
            let body: Vec<dto::OrderResponse> = orders.iter().map(dto::OrderResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order id") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orders.get_order(principal.user_id(), order_id).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
