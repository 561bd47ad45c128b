//! Atomic, all-or-nothing stock reservation.

use std::sync::Arc;

use tracing::instrument;

use storefront_inventory::{ReservationLine, StockDecrement, lock_order, plan_reservation};

use crate::error::ServiceResult;
use crate::store::{StockRepository, Store};

/// Reserve `lines` inside an open unit of work.
///
/// Locks the stock rows in ascending variant order, checks every line and only
/// then writes the decrements. On error nothing has been written.
pub async fn reserve_in<R>(repo: &mut R, lines: &[ReservationLine]) -> ServiceResult<Vec<StockDecrement>>
where
    R: StockRepository + ?Sized,
{
    let ids = lock_order(lines);
    let levels = repo.lock_stock(&ids).await?;
    let plan = plan_reservation(lines, &levels)?;

    for decrement in &plan {
        repo.set_stock(decrement.variant_id, decrement.remaining).await?;
    }
    Ok(plan)
}

/// Stand-alone reservation that owns its unit of work.
#[derive(Clone)]
pub struct InventoryGuard {
    store: Arc<dyn Store>,
}

impl InventoryGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()), err)]
    pub async fn reserve(&self, lines: &[ReservationLine]) -> ServiceResult<Vec<StockDecrement>> {
        let mut uow = self.store.begin().await?;
        let plan = reserve_in(uow.as_mut(), lines).await?;
        uow.commit().await?;
        Ok(plan)
    }
}
