use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    Json,
};

use storefront_core::VariantId;
use storefront_infra::ServiceError;
use storefront_sales::{Cart, CartOwner};

use crate::app::errors::ApiJson;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

/// The signed-in user owns the cart; otherwise `session_id` must be given.
fn owner(
    principal: Option<&PrincipalContext>,
    query: &dto::CartQuery,
) -> Result<CartOwner, axum::response::Response> {
    CartOwner::resolve(principal.map(|p| p.user_id()), query.session_id.as_deref())
        .map_err(|e| errors::service_error_to_response(ServiceError::from(e)))
}

fn cart_response(services: &AppServices, owner: &CartOwner, cart: Option<&Cart>) -> axum::response::Response {
    let price = services.carts.quote(cart);
    Json(dto::CartResponse::new(owner, cart, &price)).into_response()
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Query(query): Query<dto::CartQuery>,
) -> axum::response::Response {
    let owner = match owner(principal.as_ref().map(|p| &p.0), &query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    match services.carts.cart(&owner).await {
        Ok(cart) => cart_response(&services, &owner, cart.as_ref()),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Query(query): Query<dto::CartQuery>,
    ApiJson(body): ApiJson<dto::AddCartItemRequest>,
) -> axum::response::Response {
    let owner = match owner(principal.as_ref().map(|p| &p.0), &query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let variant_id: VariantId = match errors::parse_id(&body.variant_id, "variant_id") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.carts.add_item(&owner, variant_id, body.quantity).await {
        Ok(cart) => cart_response(&services, &owner, Some(&cart)),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Query(query): Query<dto::CartQuery>,
    Path(variant_id): Path<String>,
) -> axum::response::Response {
    let owner = match owner(principal.as_ref().map(|p| &p.0), &query) {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let variant_id: VariantId = match errors::parse_id(&variant_id, "variant_id") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.carts.remove_item(&owner, variant_id).await {
        Ok(cart) => cart_response(&services, &owner, Some(&cart)),
        Err(e) => errors::service_error_to_response(e),
    }
}
