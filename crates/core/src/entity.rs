//! Entity trait: identity + continuity across state changes.

/// Anything persisted under its own identifier (users, carts, orders, sessions).
///
/// Stores key their tables by `Entity::id`, so ids must be cheap to copy.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
