use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::VariantId;

/// Current stock of one variant, as read under lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub variant_id: VariantId,
    pub available: u32,
    pub active: bool,
}

/// One requested quantity (a cart line, from the inventory's point of view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// A decrement the caller must write back, with the resulting stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub remaining: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("insufficient stock for variant {variant_id} (requested {requested}, available {available})")]
    InsufficientStock {
        variant_id: VariantId,
        requested: u64,
        available: u32,
    },

    #[error("variant {0} is not available for sale")]
    VariantUnavailable(VariantId),

    #[error("quantity for variant {0} must be at least 1")]
    InvalidQuantity(VariantId),
}

impl InventoryError {
    pub fn variant_id(&self) -> VariantId {
        match self {
            InventoryError::InsufficientStock { variant_id, .. } => *variant_id,
            InventoryError::VariantUnavailable(id) | InventoryError::InvalidQuantity(id) => *id,
        }
    }
}

/// Sum requested quantities per variant, ordered by variant id.
fn consolidate(lines: &[ReservationLine]) -> Result<BTreeMap<VariantId, u64>, InventoryError> {
    let mut wanted: BTreeMap<VariantId, u64> = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(InventoryError::InvalidQuantity(line.variant_id));
        }
        *wanted.entry(line.variant_id).or_default() += u64::from(line.quantity);
    }
    Ok(wanted)
}

/// Variant ids in the order their stock rows must be locked.
///
/// Every reservation locks rows in ascending id order, so two reservations over
/// overlapping variants queue behind each other instead of deadlocking.
pub fn lock_order(lines: &[ReservationLine]) -> Vec<VariantId> {
    let mut ids: Vec<VariantId> = lines.iter().map(|l| l.variant_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Decide a reservation against stock that the caller holds locked.
///
/// All-or-nothing: either every line fits (and one decrement per variant is
/// returned) or the first failing variant, in lock order, is reported and
/// nothing is to be written.
pub fn plan_reservation(
    lines: &[ReservationLine],
    levels: &[StockLevel],
) -> Result<Vec<StockDecrement>, InventoryError> {
    let wanted = consolidate(lines)?;
    let by_id: HashMap<VariantId, &StockLevel> = levels.iter().map(|l| (l.variant_id, l)).collect();

    let mut plan = Vec::with_capacity(wanted.len());
    for (variant_id, requested) in wanted {
        let level = by_id
            .get(&variant_id)
            .filter(|l| l.active)
            .ok_or(InventoryError::VariantUnavailable(variant_id))?;

        if requested > u64::from(level.available) {
            return Err(InventoryError::InsufficientStock {
                variant_id,
                requested,
                available: level.available,
            });
        }

        // requested <= available <= u32::MAX here
        let quantity = requested as u32;
        plan.push(StockDecrement {
            variant_id,
            quantity,
            remaining: level.available - quantity,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(variant_id: VariantId, available: u32) -> StockLevel {
        StockLevel {
            variant_id,
            available,
            active: true,
        }
    }

    fn line(variant_id: VariantId, quantity: u32) -> ReservationLine {
        ReservationLine { variant_id, quantity }
    }

    #[test]
    fn plans_one_decrement_per_line() {
        let a = VariantId::new();
        let b = VariantId::new();

        let plan = plan_reservation(&[line(a, 2), line(b, 1)], &[level(a, 10), level(b, 1)]).unwrap();

        assert_eq!(plan.len(), 2);
        let a_dec = plan.iter().find(|d| d.variant_id == a).unwrap();
        assert_eq!(a_dec.quantity, 2);
        assert_eq!(a_dec.remaining, 8);
        let b_dec = plan.iter().find(|d| d.variant_id == b).unwrap();
        assert_eq!(b_dec.remaining, 0);
    }

    #[test]
    fn one_short_line_fails_the_whole_reservation() {
        let a = VariantId::new();
        let b = VariantId::new();

        let err = plan_reservation(&[line(a, 2), line(b, 3)], &[level(a, 10), level(b, 2)]).unwrap_err();

        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                variant_id: b,
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn duplicate_lines_are_summed_before_the_check() {
        let a = VariantId::new();

        let err = plan_reservation(&[line(a, 2), line(a, 2)], &[level(a, 3)]).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { requested: 4, .. }));

        let plan = plan_reservation(&[line(a, 1), line(a, 2)], &[level(a, 3)]).unwrap();
        assert_eq!(plan, vec![StockDecrement { variant_id: a, quantity: 3, remaining: 0 }]);
    }

    #[test]
    fn inactive_or_unknown_variants_are_unavailable() {
        let a = VariantId::new();
        let b = VariantId::new();
        let inactive = StockLevel {
            variant_id: a,
            available: 5,
            active: false,
        };

        assert_eq!(
            plan_reservation(&[line(a, 1)], &[inactive]).unwrap_err(),
            InventoryError::VariantUnavailable(a)
        );
        assert_eq!(
            plan_reservation(&[line(b, 1)], &[]).unwrap_err(),
            InventoryError::VariantUnavailable(b)
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let a = VariantId::new();
        assert_eq!(
            plan_reservation(&[line(a, 0)], &[level(a, 5)]).unwrap_err(),
            InventoryError::InvalidQuantity(a)
        );
    }

    #[test]
    fn lock_order_is_sorted_and_unique() {
        let ids: Vec<VariantId> = (0..5).map(|_| VariantId::new()).collect();
        let lines: Vec<ReservationLine> = ids.iter().rev().chain(ids.iter()).map(|id| line(*id, 1)).collect();

        let order = lock_order(&lines);
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(order, expected);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn remaining_stock_never_negative(
                stock in proptest::collection::vec(0u32..50, 1..6),
                wanted in proptest::collection::vec(1u32..20, 1..6),
            ) {
                let ids: Vec<VariantId> = stock.iter().map(|_| VariantId::new()).collect();
                let levels: Vec<StockLevel> = ids.iter().zip(&stock).map(|(id, s)| level(*id, *s)).collect();
                let lines: Vec<ReservationLine> = wanted
                    .iter()
                    .enumerate()
                    .map(|(i, q)| line(ids[i % ids.len()], *q))
                    .collect();

                match plan_reservation(&lines, &levels) {
                    Ok(plan) => {
                        for dec in &plan {
                            let before = levels.iter().find(|l| l.variant_id == dec.variant_id).unwrap().available;
                            prop_assert_eq!(dec.remaining + dec.quantity, before);
                        }
                        let planned: u64 = plan.iter().map(|d| u64::from(d.quantity)).sum();
                        let requested: u64 = lines.iter().map(|l| u64::from(l.quantity)).sum();
                        prop_assert_eq!(planned, requested);
                    }
                    Err(InventoryError::InsufficientStock { requested, available, .. }) => {
                        prop_assert!(requested > u64::from(available));
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            }
        }
    }
}
