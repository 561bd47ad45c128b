//! Inventory domain module.
//!
//! Pure stock rules for the checkout path: which variants must be locked, and
//! whether a set of requested quantities fits the locked stock. The atomic
//! read-check-decrement itself is performed by the infrastructure layer inside
//! a unit of work.

pub mod stock;

pub use stock::{
    InventoryError, ReservationLine, StockDecrement, StockLevel, lock_order, plan_reservation,
};
