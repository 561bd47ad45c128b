//! Cart aggregate: pending lines of one user or one anonymous session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{CartId, DomainError, DomainResult, Entity, Money, UserId, VariantId};

/// Who a cart belongs to. Exactly one identity owns a cart at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    User(UserId),
    Session(String),
}

impl CartOwner {
    /// Pick the owning identity from what a caller presented.
    ///
    /// An authenticated user wins over a session identifier. A blank session
    /// identifier counts as absent.
    pub fn resolve(user_id: Option<UserId>, session_id: Option<&str>) -> DomainResult<Self> {
        if let Some(user_id) = user_id {
            return Ok(CartOwner::User(user_id));
        }

        match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(session) => Ok(CartOwner::Session(session.to_string())),
            None => Err(DomainError::validation(
                "cart requires an authenticated user or a session id",
            )),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Session(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Session(s) => Some(s),
        }
    }
}

/// A pending line. `unit_price` is the catalog price captured when the variant
/// was first added and is never re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    owner: CartOwner,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entity for Cart {
    type Id = CartId;

    fn id(&self) -> CartId {
        self.id
    }
}

impl Cart {
    pub fn new(id: CartId, owner: CartOwner, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a cart loaded from storage.
    pub fn from_parts(
        id: CartId,
        owner: CartOwner,
        lines: Vec<CartLine>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if let Some(bad) = lines.iter().find(|l| l.quantity == 0) {
            return Err(DomainError::invariant(format!(
                "stored cart line for variant {} has zero quantity",
                bad.variant_id
            )));
        }
        Ok(Self {
            id,
            owner,
            lines,
            created_at,
            updated_at,
        })
    }

    pub fn owner(&self) -> &CartOwner {
        &self.owner
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, variant_id: VariantId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.variant_id == variant_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// `(quantity, frozen unit price)` pairs for pricing.
    pub fn priced_lines(&self) -> impl Iterator<Item = (u32, Money)> + '_ {
        self.lines.iter().map(|l| (l.quantity, l.unit_price))
    }

    /// Add `quantity` of a variant.
    ///
    /// If the variant is already in the cart its quantity grows and the price
    /// captured on the first add is kept; `unit_price` is ignored.
    pub fn add(
        &mut self,
        variant_id: VariantId,
        quantity: u32,
        unit_price: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<&CartLine> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if unit_price.is_negative() {
            return Err(DomainError::validation("unit price must not be negative"));
        }

        let idx = match self.lines.iter().position(|l| l.variant_id == variant_id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::validation("quantity is too large"))?;
                idx
            }
            None => {
                self.lines.push(CartLine {
                    variant_id,
                    quantity,
                    unit_price,
                });
                self.lines.len() - 1
            }
        };

        self.updated_at = now;
        Ok(&self.lines[idx])
    }

    /// Drop the line for a variant. Returns whether a line was removed.
    pub fn remove(&mut self, variant_id: VariantId, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.variant_id != variant_id);
        let removed = self.lines.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn user_cart() -> Cart {
        Cart::new(CartId::new(), CartOwner::User(UserId::new()), test_time())
    }

    #[test]
    fn user_identity_wins_over_session() {
        let user = UserId::new();
        assert_eq!(
            CartOwner::resolve(Some(user), Some("abc")).unwrap(),
            CartOwner::User(user)
        );
        assert_eq!(
            CartOwner::resolve(None, Some("  abc ")).unwrap(),
            CartOwner::Session("abc".into())
        );
    }

    #[test]
    fn missing_or_blank_identity_is_rejected() {
        assert!(matches!(
            CartOwner::resolve(None, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            CartOwner::resolve(None, Some("   ")),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn adding_same_variant_merges_and_keeps_first_price() {
        let mut cart = user_cart();
        let variant = VariantId::new();
        let later = test_time() + Duration::minutes(5);

        cart.add(variant, 1, Money::from_cents(1000), test_time()).unwrap();
        let line = cart.add(variant, 2, Money::from_cents(1200), later).unwrap();

        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, Money::from_cents(1000));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.updated_at(), later);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut cart = user_cart();
        let err = cart.add(VariantId::new(), 0, Money::from_cents(100), test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn quantity_overflow_is_a_validation_error() {
        let mut cart = user_cart();
        let variant = VariantId::new();
        cart.add(variant, u32::MAX, Money::from_cents(1), test_time()).unwrap();
        assert!(cart.add(variant, 1, Money::from_cents(1), test_time()).is_err());
        assert_eq!(cart.line(variant).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn remove_and_clear() {
        let mut cart = user_cart();
        let a = VariantId::new();
        let b = VariantId::new();
        cart.add(a, 1, Money::from_cents(100), test_time()).unwrap();
        cart.add(b, 1, Money::from_cents(200), test_time()).unwrap();

        assert!(cart.remove(a, test_time()));
        assert!(!cart.remove(a, test_time()));
        assert_eq!(cart.lines().len(), 1);

        cart.clear(test_time());
        assert!(cart.is_empty());
    }

    #[test]
    fn rehydration_rejects_zero_quantity_lines() {
        let line = CartLine {
            variant_id: VariantId::new(),
            quantity: 0,
            unit_price: Money::from_cents(100),
        };
        let res = Cart::from_parts(
            CartId::new(),
            CartOwner::Session("s".into()),
            vec![line],
            test_time(),
            test_time(),
        );
        assert!(matches!(res, Err(DomainError::InvariantViolation(_))));
    }
}
