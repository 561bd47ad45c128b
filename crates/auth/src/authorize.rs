use serde::Serialize;
use thiserror::Error;

use storefront_core::UserId;

use crate::{Permission, Role};

/// The authenticated caller, as far as authorization is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Role to permission mapping.
///
/// `admin` holds the wildcard. Customers hold no elevated permissions: what
/// they may do with their own cart and orders is enforced by ownership checks,
/// not permissions.
pub fn permissions_for_role(role: &Role) -> Vec<Permission> {
    if role.is_admin() {
        return vec![Permission::WILDCARD];
    }
    Vec::new()
}

/// Check a principal holds `required`. Pure policy check, no IO.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = permissions_for_role(&principal.role)
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_granted_everything() {
        let principal = Principal {
            user_id: UserId::new(),
            role: Role::new("Admin"),
        };
        assert!(authorize(&principal, &Permission::ORDERS_STATUS_UPDATE).is_ok());
        assert!(authorize(&principal, &Permission::new("anything.else")).is_ok());
    }

    #[test]
    fn customer_cannot_change_order_status() {
        let principal = Principal {
            user_id: UserId::new(),
            role: Role::customer(),
        };
        assert_eq!(
            authorize(&principal, &Permission::ORDERS_STATUS_UPDATE),
            Err(AuthzError::Forbidden("orders.status.update".into()))
        );
    }
}
