//! Cart reads and edits for users and anonymous sessions.

use std::sync::Arc;

use tracing::{debug, instrument};

use storefront_core::{CartId, Clock, Money, VariantId};
use storefront_sales::{Cart, CartOwner, PriceBreakdown, PricingPolicy};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{StoreError, Store};

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    pricing: PricingPolicy,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, pricing: PricingPolicy) -> Self {
        Self {
            store,
            clock,
            pricing,
        }
    }

    /// What the cart would cost if checked out now. A missing or empty cart
    /// costs nothing, shipping included.
    pub fn quote(&self, cart: Option<&Cart>) -> PriceBreakdown {
        match cart.filter(|c| !c.is_empty()) {
            Some(cart) => self.pricing.price(cart.priced_lines()),
            None => PriceBreakdown {
                subtotal: Money::ZERO,
                shipping: Money::ZERO,
                tax: Money::ZERO,
                total: Money::ZERO,
            },
        }
    }

    /// The owner's cart, if one was ever created. Reading never creates one.
    #[instrument(skip(self), err)]
    pub async fn cart(&self, owner: &CartOwner) -> ServiceResult<Option<Cart>> {
        let mut uow = self.store.begin().await?;
        let cart = uow.load_cart(owner).await?;
        uow.commit().await?;
        Ok(cart)
    }

    /// Add a variant at its current catalog price, creating the cart on first
    /// use. An existing line keeps the price it was first added at.
    #[instrument(skip(self), err)]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        variant_id: VariantId,
        quantity: u32,
    ) -> ServiceResult<Cart> {
        if let Some(cart) = self.try_add(owner, variant_id, quantity).await? {
            return Ok(cart);
        }
        // Another request created this owner's cart concurrently; it exists now.
        debug!("cart created concurrently, retrying add");
        self.try_add(owner, variant_id, quantity)
            .await?
            .ok_or_else(|| ServiceError::Conflict("cart was created concurrently".into()))
    }

    /// `Ok(None)` when a fresh cart lost the race to be created.
    async fn try_add(
        &self,
        owner: &CartOwner,
        variant_id: VariantId,
        quantity: u32,
    ) -> ServiceResult<Option<Cart>> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let variant = uow
            .variant(variant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("variant {variant_id}")))?;
        if !variant.active {
            return Err(ServiceError::VariantUnavailable(variant_id));
        }

        let existing = uow.load_cart(owner).await?;
        let is_new = existing.is_none();
        let mut cart = existing.unwrap_or_else(|| Cart::new(CartId::new(), owner.clone(), now));
        cart.add(variant_id, quantity, variant.price, now)?;

        match uow.save_cart(&cart).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) if is_new => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        uow.commit().await?;
        Ok(Some(cart))
    }

    #[instrument(skip(self), err)]
    pub async fn remove_item(&self, owner: &CartOwner, variant_id: VariantId) -> ServiceResult<Cart> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let mut cart = uow
            .load_cart(owner)
            .await?
            .ok_or_else(|| ServiceError::not_found("cart"))?;
        if !cart.remove(variant_id, now) {
            return Err(ServiceError::not_found(format!("cart item {variant_id}")));
        }

        uow.save_cart(&cart).await?;
        uow.commit().await?;
        Ok(cart)
    }
}
