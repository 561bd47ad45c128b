//! API-side authorization guard.
//!
//! Permission checks happen here, before a service is invoked; the services
//! themselves only enforce ownership.

use storefront_auth::{AuthzError, Permission, authorize};

use crate::context::PrincipalContext;

/// Check that the caller holds every permission in `required`.
pub fn authorize_request(
    principal: &PrincipalContext,
    required: &[Permission],
) -> Result<(), AuthzError> {
    let principal = principal.principal();
    for perm in required {
        authorize(&principal, perm)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_auth::Role;
    use storefront_core::UserId;

    fn caller(role: Role) -> PrincipalContext {
        PrincipalContext::new(UserId::new(), "someone@example.com".into(), role)
    }

    #[test]
    fn admins_may_change_order_status() {
        assert!(authorize_request(&caller(Role::admin()), &[Permission::ORDERS_STATUS_UPDATE]).is_ok());
    }

    #[test]
    fn customers_may_not() {
        let err = authorize_request(&caller(Role::customer()), &[Permission::ORDERS_STATUS_UPDATE])
            .unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("orders.status.update".into()));
    }
}
