use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{DomainError, DomainResult, Entity, Money, OrderId, UserId, VariantId};

use crate::order_number::OrderNumber;
use crate::pricing::PriceBreakdown;

/// Display name snapshotted for a line whose product could not be resolved.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// Order status lifecycle.
///
/// `Pending -> Processing -> Shipped -> Delivered`, and `Pending | Processing ->
/// Cancelled`. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Payment method recorded on the order. Not processed, only stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    Qr,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Qr => "qr",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "qr" => Ok(PaymentMethod::Qr),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(DomainError::validation(format!("unknown payment method '{other}'"))),
        }
    }
}

/// Delivery details supplied at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub phone: String,
    pub shipping_address: String,
}

impl DeliveryDetails {
    /// Trim and check that phone and address are present.
    pub fn normalized(self) -> DomainResult<Self> {
        let phone = self.phone.trim().to_string();
        let shipping_address = self.shipping_address.trim().to_string();

        if phone.is_empty() {
            return Err(DomainError::validation("phone is required"));
        }
        if shipping_address.is_empty() {
            return Err(DomainError::validation("shipping address is required"));
        }

        Ok(Self {
            payment_method: self.payment_method,
            phone,
            shipping_address,
        })
    }
}

/// One order line with its catalog snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub variant_id: VariantId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderLine {
    pub fn new(
        variant_id: VariantId,
        product_name: Option<String>,
        image_url: Option<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            variant_id,
            product_name: product_name.unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
            image_url,
            quantity,
            unit_price,
            line_total: unit_price.times(quantity),
        }
    }
}

/// Everything an order is made of; used to place new orders and to rebuild
/// stored ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParts {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub delivery: DeliveryDetails,
    pub price: PriceBreakdown,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate root: a placed order.
///
/// Amounts are fixed at placement and never recomputed. After placement the
/// only mutation is a status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    order_number: OrderNumber,
    status: OrderStatus,
    delivery: DeliveryDetails,
    price: PriceBreakdown,
    lines: Vec<OrderLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}

impl Order {
    /// Create a new `Pending` order.
    pub fn place(
        id: OrderId,
        user_id: UserId,
        order_number: OrderNumber,
        delivery: DeliveryDetails,
        price: PriceBreakdown,
        lines: Vec<OrderLine>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }

        Self::from_parts(OrderParts {
            id,
            user_id,
            order_number,
            status: OrderStatus::Pending,
            delivery: delivery.normalized()?,
            price,
            lines,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild an order, checking the amount invariants.
    pub fn from_parts(parts: OrderParts) -> DomainResult<Self> {
        if !parts.price.is_consistent() {
            return Err(DomainError::invariant(
                "order total must equal subtotal + shipping + tax",
            ));
        }
        if let Some(line) = parts
            .lines
            .iter()
            .find(|l| l.quantity == 0 || l.line_total != l.unit_price.times(l.quantity))
        {
            return Err(DomainError::invariant(format!(
                "order line for variant {} has an inconsistent total",
                line.variant_id
            )));
        }

        Ok(Self {
            id: parts.id,
            user_id: parts.user_id,
            order_number: parts.order_number,
            status: parts.status,
            delivery: parts.delivery,
            price: parts.price,
            lines: parts.lines,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn delivery(&self) -> &DeliveryDetails {
        &self.delivery
    }

    pub fn price(&self) -> &PriceBreakdown {
        &self.price
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply an administrator status change.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
