//! Cart-to-order checkout.

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info, instrument};

use storefront_core::{Clock, Entity, OrderId, UserId};
use storefront_inventory::ReservationLine;
use storefront_sales::{
    Cart, CartOwner, DeliveryDetails, Order, OrderLine, OrderNumber, PricingPolicy,
};

use crate::error::{ServiceError, ServiceResult};
use crate::inventory_guard::reserve_in;
use crate::store::{CatalogRepository, Store};

/// Attempts at finding an unused order number before giving up.
pub const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Source of the random part of an order number.
pub trait OrderNumberSuffix: Send + Sync {
    fn next_suffix(&self) -> u32;
}

/// OS-randomness suffixes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl OrderNumberSuffix for RandomSuffix {
    fn next_suffix(&self) -> u32 {
        OsRng.next_u32()
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    pricing: PricingPolicy,
    suffixes: Arc<dyn OrderNumberSuffix>,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, pricing: PricingPolicy) -> Self {
        Self {
            store,
            clock,
            pricing,
            suffixes: Arc::new(RandomSuffix),
        }
    }

    pub fn with_suffixes(mut self, suffixes: Arc<dyn OrderNumberSuffix>) -> Self {
        self.suffixes = suffixes;
        self
    }

    /// Turn the user's cart into a `Pending` order.
    ///
    /// Load, price, reserve, materialize and clear run in one unit of work.
    /// Any failure drops it, so the cart, the stock and the order tables are
    /// left exactly as they were.
    #[instrument(skip(self, delivery), fields(user_id = %user_id), err)]
    pub async fn create_order(
        &self,
        user_id: UserId,
        delivery: DeliveryDetails,
    ) -> ServiceResult<Order> {
        let delivery = delivery.normalized()?;
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let mut cart = uow
            .load_cart(&CartOwner::User(user_id))
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(ServiceError::EmptyCart)?;

        let price = self.pricing.price(cart.priced_lines());

        let reservation: Vec<ReservationLine> = cart
            .lines()
            .iter()
            .map(|line| ReservationLine {
                variant_id: line.variant_id,
                quantity: line.quantity,
            })
            .collect();
        reserve_in(uow.as_mut(), &reservation).await?;

        let lines = snapshot_lines(uow.as_mut(), &cart).await?;

        let mut placed = None;
        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let number = OrderNumber::compose(now, self.suffixes.next_suffix());
            let order = Order::place(
                OrderId::new(),
                user_id,
                number,
                delivery.clone(),
                price,
                lines.clone(),
                now,
            )?;

            if uow.insert_order(&order).await? {
                placed = Some(order);
                break;
            }
            debug!(attempt, order_number = %order.order_number(), "order number taken, retrying");
        }
        let order = placed.ok_or(ServiceError::OrderNumberExhausted)?;

        cart.clear(now);
        uow.save_cart(&cart).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            total = %order.price().total,
            "order placed"
        );
        Ok(order)
    }
}

/// Order lines with product name and primary image as they are right now.
async fn snapshot_lines<R>(catalog: &mut R, cart: &Cart) -> ServiceResult<Vec<OrderLine>>
where
    R: CatalogRepository + ?Sized,
{
    let mut lines = Vec::with_capacity(cart.lines().len());
    for line in cart.lines() {
        let product = match catalog.variant(line.variant_id).await? {
            Some(variant) => catalog.product(variant.product_id).await?,
            None => None,
        };
        let (name, image) = match product {
            Some(product) => (Some(product.name), product.images.into_iter().next()),
            None => (None, None),
        };
        lines.push(OrderLine::new(
            line.variant_id,
            name,
            image,
            line.quantity,
            line.unit_price,
        ));
    }
    Ok(lines)
}
