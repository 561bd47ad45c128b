use storefront_auth::{AccessClaims, Principal, Role};
use storefront_core::UserId;

/// Authenticated identity for a request, taken from a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    email: String,
    role: Role,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, email: String, role: Role) -> Self {
        Self { user_id, email, role }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            role: self.role.clone(),
        }
    }
}

impl From<AccessClaims> for PrincipalContext {
    fn from(claims: AccessClaims) -> Self {
        Self::new(claims.sub, claims.email, claims.role)
    }
}
