//! Order queries and administrator status changes.

use std::sync::Arc;

use tracing::{info, instrument};

use storefront_core::{Clock, OrderId, UserId};
use storefront_sales::{Order, OrderStatus};

use crate::error::{ServiceError, ServiceResult};
use crate::store::Store;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The user's orders, newest first.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn list_orders(&self, user_id: UserId) -> ServiceResult<Vec<Order>> {
        let mut uow = self.store.begin().await?;
        let orders = uow.orders_for_user(user_id).await?;
        uow.commit().await?;
        Ok(orders)
    }

    /// One of the user's orders. Someone else's order is reported as missing.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id), err)]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> ServiceResult<Order> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .order(order_id)
            .await?
            .filter(|order| order.user_id() == user_id)
            .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))?;
        uow.commit().await?;
        Ok(order)
    }

    /// Move an order along its lifecycle. Callers check permissions first.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status), err)]
    pub async fn set_order_status(&self, order_id: OrderId, status: OrderStatus) -> ServiceResult<Order> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let mut order = uow
            .order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("order {order_id}")))?;
        let from = order.status();
        order.transition_to(status, now)?;

        uow.update_order_status(&order).await?;
        uow.commit().await?;

        info!(from = %from, to = %status, "order status changed");
        Ok(order)
    }
}
