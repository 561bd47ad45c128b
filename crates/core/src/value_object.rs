//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances with the same attribute
/// values are interchangeable. `Money` and the frozen price snapshot on a cart
/// line are value objects; an `Order` is an entity even if two orders happen to
/// carry identical totals.
///
/// Value objects are immutable. To "change" one, build a new one:
///
/// ```ignore
/// let subtotal = Money::from_cents(10_500);
/// let with_shipping = subtotal + Money::from_units(15); // new value, `subtotal` untouched
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
