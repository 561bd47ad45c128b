use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use storefront_auth::Permission;
use storefront_core::OrderId;
use storefront_sales::OrderStatus;

use crate::app::errors::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::authorize_request;
use crate::context::PrincipalContext;

pub async fn set_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<dto::SetOrderStatusRequest>,
) -> axum::response::Response {
    if let Err(e) = authorize_request(&principal, &[Permission::ORDERS_STATUS_UPDATE]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let order_id: OrderId = match errors::parse_id(&id, "order id") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let status: OrderStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::bad_request(format!("{e}")),
    };

    match services.orders.set_order_status(order_id, status).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
