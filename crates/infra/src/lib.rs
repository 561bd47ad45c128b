//! Infrastructure layer: persistence, orchestration services and configuration.
//!
//! Every service opens one unit of work per call (see [`store`]) and returns
//! [`ServiceError`] on failure, leaving storage untouched.

pub mod auth_service;
pub mod cart_service;
pub mod checkout;
pub mod config;
pub mod error;
pub mod inventory_guard;
pub mod orders;
pub mod store;


pub use auth_service::{AuthService, AuthTokens, AuthenticatedUser};
pub use cart_service::CartService;
pub use checkout::{CheckoutService, OrderNumberSuffix, RandomSuffix};
pub use config::{AuthSettings, ConfigError, LogFormat, StorefrontConfig};
pub use error::{ErrorCategory, ServiceError, ServiceResult};
pub use inventory_guard::InventoryGuard;
pub use orders::OrderService;
pub use store::{InMemoryStore, PostgresStore, Store, StoreError};
