//! `storefront-auth` — authentication and authorization primitives.
//!
//! Users, roles/permissions, access-token claims and signing, password hashing
//! and refresh-token sessions. Decoupled from HTTP and storage: callers supply
//! the clock and persist what this crate produces.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod session;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, Principal, authorize, permissions_for_role};
pub use claims::AccessClaims;
pub use password::{PasswordError, PasswordHashCost, PasswordHasher};
pub use permissions::Permission;
pub use roles::Role;
pub use session::{AuthSession, digest_token};
pub use token::{IssuedAccessToken, TokenConfig, TokenError, TokenIssuer};
pub use user::{Registration, User, UserProfile, UserStatus, ValidRegistration};
