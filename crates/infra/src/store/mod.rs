//! Unit-of-work persistence boundary.
//!
//! Every service call opens one unit of work with [`Store::begin`], performs
//! all reads and writes through it, and either calls
//! [`UnitOfWork::commit`] or drops it. Dropping without committing rolls back
//! and releases every lock taken inside.
//!
//! Locking contract (both backends):
//! - `load_cart` locks the cart until the unit of work ends.
//! - `lock_stock` locks the given stock rows; callers pass ids in ascending
//!   order.
//! - `lock_session_by_digest` locks the session row.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_auth::{AuthSession, Role, User, UserProfile};
use storefront_core::{Money, OrderId, ProductId, SessionId, UserId, VariantId};
use storefront_inventory::StockLevel;
use storefront_sales::{Cart, CartOwner, Order};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was hit (e.g. username, email, cart owner).
    #[error("duplicate {0}")]
    Duplicate(String),

    /// A stored row could not be turned back into a domain value.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    #[error("storage error in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

/// Catalog data for one sellable variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: VariantId,
    pub product_id: ProductId,
    pub price: Money,
    pub stock: u32,
    pub active: bool,
}

impl VariantRecord {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel {
            variant_id: self.id,
            available: self.stock,
            active: self.active,
        }
    }
}

/// Catalog display data for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// Ordered; the first image is the primary one.
    pub images: Vec<String>,
}

#[async_trait]
pub trait CatalogRepository: Send {
    async fn variant(&mut self, id: VariantId) -> Result<Option<VariantRecord>, StoreError>;

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>, StoreError>;
}

#[async_trait]
pub trait StockRepository: Send {
    /// Lock and read the stock of `ids`. Unknown ids are absent from the result.
    async fn lock_stock(&mut self, ids: &[VariantId]) -> Result<Vec<StockLevel>, StoreError>;

    async fn set_stock(&mut self, id: VariantId, available: u32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CartRepository: Send {
    async fn load_cart(&mut self, owner: &CartOwner) -> Result<Option<Cart>, StoreError>;

    /// Insert or replace a cart and all of its lines.
    async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send {
    /// Insert an order with its lines. Returns `false`, writing nothing, when
    /// the order number is already taken.
    async fn insert_order(&mut self, order: &Order) -> Result<bool, StoreError>;

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Newest first.
    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    async fn update_order_status(&mut self, order: &Order) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepository: Send {
    /// Case-insensitive match on username or email.
    async fn find_user_by_login(&mut self, login: &str) -> Result<Option<User>, StoreError>;

    async fn user(&mut self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Case-insensitive check of both identities.
    async fn identity_taken(&mut self, username: &str, email: &str) -> Result<bool, StoreError>;

    async fn role_exists(&mut self, role: &Role) -> Result<bool, StoreError>;

    async fn insert_user(&mut self, user: &User, profile: &UserProfile) -> Result<(), StoreError>;

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionRepository: Send {
    async fn insert_session(&mut self, session: &AuthSession) -> Result<(), StoreError>;

    async fn lock_session_by_digest(&mut self, digest: &str) -> Result<Option<AuthSession>, StoreError>;

    async fn lock_session(&mut self, id: SessionId) -> Result<Option<AuthSession>, StoreError>;

    /// Persist revocation state (`revoked`, `revoked_at`, `replaced_by`).
    async fn update_session(&mut self, session: &AuthSession) -> Result<(), StoreError>;

    /// Revoke every live session of a user. Returns how many were revoked.
    async fn revoke_user_sessions(
        &mut self,
        user_id: UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, StoreError>;
}

/// One atomic scope of reads and writes.
#[async_trait]
pub trait UnitOfWork:
    CatalogRepository
    + StockRepository
    + CartRepository
    + OrderRepository
    + UserRepository
    + SessionRepository
    + Send
{
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
