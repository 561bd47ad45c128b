//! Sales domain module.
//!
//! Carts, pricing and orders, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod cart;
pub mod order;
pub mod order_number;
pub mod pricing;

pub use cart::{Cart, CartLine, CartOwner};
pub use order::{
    DeliveryDetails, Order, OrderLine, OrderParts, OrderStatus, PaymentMethod, TransitionError,
    UNKNOWN_PRODUCT,
};
pub use order_number::OrderNumber;
pub use pricing::{PriceBreakdown, PricingPolicy};
