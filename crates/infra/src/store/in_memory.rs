use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use storefront_auth::{AuthSession, Role, User, UserProfile};
use storefront_core::{CartId, Entity, Money, OrderId, ProductId, SessionId, UserId, VariantId};
use storefront_inventory::StockLevel;
use storefront_sales::{Cart, CartOwner, Order};

use super::{
    CartRepository, CatalogRepository, OrderRepository, ProductRecord, SessionRepository,
    StockRepository, Store, StoreError, UnitOfWork, UserRepository, VariantRecord,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, ProductRecord>,
    variants: HashMap<VariantId, VariantRecord>,
    carts: HashMap<CartId, Cart>,
    orders: HashMap<OrderId, Order>,
    users: HashMap<UserId, User>,
    profiles: HashMap<UserId, UserProfile>,
    roles: BTreeSet<String>,
    sessions: HashMap<SessionId, AuthSession>,
}

impl Tables {
    fn cart_id_for(&self, owner: &CartOwner) -> Option<CartId> {
        self.carts
            .values()
            .find(|c| c.owner() == owner)
            .map(|c| c.id())
    }
}

/// In-memory store for dev and tests.
///
/// A unit of work holds the single table lock for its whole lifetime and
/// writes to a staged copy; commit swaps the copy in, drop discards it. All
/// units of work are therefore serialized, which gives every locking guarantee
/// the Postgres store provides.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store with the `customer` and `admin` roles.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        tables.roles.insert(Role::CUSTOMER.to_string());
        tables.roles.insert(Role::ADMIN.to_string());
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    pub async fn seed_product(&self, product: ProductRecord) {
        self.tables.lock().await.products.insert(product.id, product);
    }

    pub async fn seed_variant(&self, variant: VariantRecord) {
        self.tables.lock().await.variants.insert(variant.id, variant);
    }

    pub async fn seed_role(&self, role: &Role) {
        self.tables.lock().await.roles.insert(role.as_str().to_string());
    }

    /// Change a catalog price (carts keep the price they captured).
    pub async fn set_price(&self, id: VariantId, price: Money) -> bool {
        match self.tables.lock().await.variants.get_mut(&id) {
            Some(v) => {
                v.price = price;
                true
            }
            None => false,
        }
    }

    pub async fn stock_of(&self, id: VariantId) -> Option<u32> {
        self.tables.lock().await.variants.get(&id).map(|v| v.stock)
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn cart_of(&self, owner: &CartOwner) -> Option<Cart> {
        let tables = self.tables.lock().await;
        tables
            .cart_id_for(owner)
            .and_then(|id| tables.carts.get(&id).cloned())
    }

    pub async fn sessions_of(&self, user_id: UserId) -> Vec<AuthSession> {
        self.tables
            .lock()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn set_user_status(&self, id: UserId, status: storefront_auth::UserStatus) -> bool {
        match self.tables.lock().await.users.get_mut(&id) {
            Some(u) => {
                u.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn set_user_role(&self, id: UserId, role: Role) -> bool {
        match self.tables.lock().await.users.get_mut(&id) {
            Some(u) => {
                u.role = role;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, staged }))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryUnitOfWork {
    async fn variant(&mut self, id: VariantId) -> Result<Option<VariantRecord>, StoreError> {
        Ok(self.staged.variants.get(&id).cloned())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>, StoreError> {
        Ok(self.staged.products.get(&id).cloned())
    }
}

#[async_trait]
impl StockRepository for InMemoryUnitOfWork {
    async fn lock_stock(&mut self, ids: &[VariantId]) -> Result<Vec<StockLevel>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.variants.get(id))
            .map(VariantRecord::stock_level)
            .collect())
    }

    async fn set_stock(&mut self, id: VariantId, available: u32) -> Result<(), StoreError> {
        let variant = self
            .staged
            .variants
            .get_mut(&id)
            .ok_or_else(|| StoreError::backend("set_stock", format!("variant {id} does not exist")))?;
        variant.stock = available;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryUnitOfWork {
    async fn load_cart(&mut self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        Ok(self
            .staged
            .cart_id_for(owner)
            .and_then(|id| self.staged.carts.get(&id).cloned()))
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError> {
        if let Some(existing) = self.staged.cart_id_for(cart.owner()) {
            if existing != cart.id() {
                return Err(StoreError::Duplicate("cart owner".into()));
            }
        }
        self.staged.carts.insert(cart.id(), cart.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryUnitOfWork {
    async fn insert_order(&mut self, order: &Order) -> Result<bool, StoreError> {
        let taken = self
            .staged
            .orders
            .values()
            .any(|o| o.order_number() == order.order_number());
        if taken {
            return Ok(false);
        }
        if self.staged.orders.contains_key(&order.id()) {
            return Err(StoreError::Duplicate("order id".into()));
        }
        self.staged.orders.insert(order.id(), order.clone());
        Ok(true)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .staged
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        // ids are v7, so they break ties between equal timestamps in creation order
        orders.sort_by(|a, b| (b.created_at(), b.id()).cmp(&(a.created_at(), a.id())));
        Ok(orders)
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<(), StoreError> {
        match self.staged.orders.get_mut(&order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StoreError::backend(
                "update_order_status",
                format!("order {} does not exist", order.id()),
            )),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUnitOfWork {
    async fn find_user_by_login(&mut self, login: &str) -> Result<Option<User>, StoreError> {
        let login = login.trim().to_lowercase();
        Ok(self
            .staged
            .users
            .values()
            .find(|u| u.username.to_lowercase() == login || u.email == login)
            .cloned())
    }

    async fn user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn identity_taken(&mut self, username: &str, email: &str) -> Result<bool, StoreError> {
        let username = username.to_lowercase();
        let email = email.to_lowercase();
        Ok(self
            .staged
            .users
            .values()
            .any(|u| u.username.to_lowercase() == username || u.email == email))
    }

    async fn role_exists(&mut self, role: &Role) -> Result<bool, StoreError> {
        Ok(self.staged.roles.contains(role.as_str()))
    }

    async fn insert_user(&mut self, user: &User, profile: &UserProfile) -> Result<(), StoreError> {
        if self.identity_taken(&user.username, &user.email).await? {
            return Err(StoreError::Duplicate("username or email".into()));
        }
        self.staged.users.insert(user.id, user.clone());
        self.staged.profiles.insert(user.id, profile.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        match self.staged.users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(StoreError::backend(
                "update_user",
                format!("user {} does not exist", user.id),
            )),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemoryUnitOfWork {
    async fn insert_session(&mut self, session: &AuthSession) -> Result<(), StoreError> {
        let clash = self
            .staged
            .sessions
            .values()
            .any(|s| s.token_digest == session.token_digest);
        if clash || self.staged.sessions.contains_key(&session.id) {
            return Err(StoreError::Duplicate("session".into()));
        }
        self.staged.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn lock_session_by_digest(&mut self, digest: &str) -> Result<Option<AuthSession>, StoreError> {
        Ok(self
            .staged
            .sessions
            .values()
            .find(|s| s.token_digest == digest)
            .cloned())
    }

    async fn lock_session(&mut self, id: SessionId) -> Result<Option<AuthSession>, StoreError> {
        Ok(self.staged.sessions.get(&id).cloned())
    }

    async fn update_session(&mut self, session: &AuthSession) -> Result<(), StoreError> {
        match self.staged.sessions.get_mut(&session.id) {
            Some(stored) => {
                stored.revoked = session.revoked;
                stored.revoked_at = session.revoked_at;
                stored.replaced_by = session.replaced_by;
                Ok(())
            }
            None => Err(StoreError::backend(
                "update_session",
                format!("session {} does not exist", session.id),
            )),
        }
    }

    async fn revoke_user_sessions(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut revoked = 0;
        for session in self.staged.sessions.values_mut() {
            if session.user_id == user_id && session.is_active(now) {
                session.revoke(now, None);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(stock: u32) -> VariantRecord {
        VariantRecord {
            id: VariantId::new(),
            product_id: ProductId::new(),
            price: Money::from_cents(1000),
            stock,
            active: true,
        }
    }

    #[tokio::test]
    async fn dropped_unit_of_work_rolls_back() {
        let store = InMemoryStore::new();
        let v = variant(5);
        store.seed_variant(v.clone()).await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.set_stock(v.id, 1).await.unwrap();
        }
        assert_eq!(store.stock_of(v.id).await, Some(5));

        let mut uow = store.begin().await.unwrap();
        uow.set_stock(v.id, 1).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.stock_of(v.id).await, Some(1));
    }

    #[tokio::test]
    async fn writes_are_visible_inside_the_unit_of_work() {
        let store = InMemoryStore::new();
        let v = variant(5);
        store.seed_variant(v.clone()).await;

        let mut uow = store.begin().await.unwrap();
        uow.set_stock(v.id, 2).await.unwrap();
        let levels = uow.lock_stock(&[v.id, VariantId::new()]).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].available, 2);
    }

    #[tokio::test]
    async fn duplicate_order_number_is_reported_not_written() {
        use storefront_sales::{DeliveryDetails, OrderLine, OrderNumber, PricingPolicy};

        let store = InMemoryStore::new();
        let now = Utc::now();
        let number = OrderNumber::compose(now, 7);
        let make = || {
            let lines = vec![OrderLine::new(VariantId::new(), None, None, 1, Money::from_cents(100))];
            Order::place(
                OrderId::new(),
                UserId::new(),
                number.clone(),
                DeliveryDetails {
                    payment_method: Default::default(),
                    phone: "1".into(),
                    shipping_address: "x".into(),
                },
                PricingPolicy::default().price([(1, Money::from_cents(100))]),
                lines,
                now,
            )
            .unwrap()
        };

        let mut uow = store.begin().await.unwrap();
        assert!(uow.insert_order(&make()).await.unwrap());
        assert!(!uow.insert_order(&make()).await.unwrap());
        uow.commit().await.unwrap();
        assert_eq!(store.order_count().await, 1);
    }
}
