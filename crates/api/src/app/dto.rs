use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_auth::Role;
use storefront_core::{Entity, Money, OrderId, UserId, VariantId};
use storefront_sales::{Cart, CartOwner, DeliveryDetails, Order, OrderLine, PaymentMethod, PriceBreakdown};

use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

/// `login` is matched case-insensitively against both username and email.
/// Any other key, including `username` or `email`, is ignored.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub variant_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub payment_method: Option<String>,
    pub phone: String,
    pub shipping_address: String,
}

impl CreateOrderRequest {
    pub fn into_delivery(self) -> Result<DeliveryDetails, String> {
        let payment_method = match self.payment_method.as_deref() {
            Some(raw) => raw.parse::<PaymentMethod>().map_err(|e| e.to_string())?,
            None => PaymentMethod::default(),
        };
        Ok(DeliveryDetails {
            payment_method,
            phone: self.phone,
            shipping_address: self.shipping_address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SetOrderStatusRequest {
    pub status: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl From<&PriceBreakdown> for TotalsResponse {
    fn from(price: &PriceBreakdown) -> Self {
        Self {
            subtotal: price.subtotal,
            shipping: price.shipping,
            tax: price.tax,
            total: price.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub user_id: Option<UserId>,
    pub session_id: Option<String>,
    pub lines: Vec<CartLineResponse>,
    #[serde(flatten)]
    pub totals: TotalsResponse,
}

impl CartResponse {
    /// A cart that was never created reads as empty.
    pub fn new(owner: &CartOwner, cart: Option<&Cart>, price: &PriceBreakdown) -> Self {
        let lines = cart
            .map(|c| {
                c.lines()
                    .iter()
                    .map(|l| CartLineResponse {
                        variant_id: l.variant_id,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                        line_total: l.unit_price.times(l.quantity),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            user_id: owner.user_id(),
            session_id: owner.session_id().map(str::to_string),
            lines,
            totals: price.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub variant_id: VariantId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: &'static str,
    pub payment_method: &'static str,
    pub phone: String,
    pub shipping_address: String,
    #[serde(flatten)]
    pub totals: TotalsResponse,
    pub lines: Vec<OrderLineResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let delivery = order.delivery();
        Self {
            id: order.id(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id(),
            status: order.status().as_str(),
            payment_method: delivery.payment_method.as_str(),
            phone: delivery.phone.clone(),
            shipping_address: delivery.shipping_address.clone(),
            totals: order.price().into(),
            lines: order.lines().iter().map(OrderLineResponse::from).collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: u64,
}

/// Identity carried by the presented access token.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl From<&PrincipalContext> for MeResponse {
    fn from(principal: &PrincipalContext) -> Self {
        Self {
            user_id: principal.user_id(),
            email: principal.email().to_string(),
            role: principal.role().clone(),
        }
    }
}
