//! Service-level error model shared by every orchestrator.

use serde::Serialize;
use thiserror::Error;

use storefront_auth::{PasswordError, TokenError};
use storefront_core::{DomainError, VariantId};
use storefront_inventory::InventoryError;
use storefront_sales::TransitionError;

use crate::config::ConfigError;
use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse classification used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Auth,
    Configuration,
    Internal,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient stock for variant {variant_id}")]
    InsufficientStock {
        variant_id: VariantId,
        requested: u64,
        available: u32,
    },

    #[error("variant {0} is not available")]
    VariantUnavailable(VariantId),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("username or email already registered")]
    DuplicateIdentity,

    #[error("role '{0}' does not exist")]
    InvalidRole(String),

    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token is invalid or expired")]
    InvalidOrExpiredToken,

    #[error("account is not active")]
    AccountInactive,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::Validation(_) | ServiceError::EmptyCart | ServiceError::InvalidRole(_) => {
                ErrorCategory::Validation
            }
            ServiceError::NotFound(_) => ErrorCategory::NotFound,
            ServiceError::InsufficientStock { .. }
            | ServiceError::VariantUnavailable(_)
            | ServiceError::InvalidTransition(_)
            | ServiceError::DuplicateIdentity
            | ServiceError::OrderNumberExhausted
            | ServiceError::Conflict(_) => ErrorCategory::Conflict,
            ServiceError::InvalidCredentials
            | ServiceError::InvalidOrExpiredToken
            | ServiceError::AccountInactive => ErrorCategory::Auth,
            ServiceError::Configuration(_) => ErrorCategory::Configuration,
            ServiceError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::EmptyCart => "empty_cart",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::VariantUnavailable(_) => "variant_unavailable",
            ServiceError::InvalidTransition(_) => "invalid_transition",
            ServiceError::DuplicateIdentity => "duplicate_identity",
            ServiceError::InvalidRole(_) => "invalid_role",
            ServiceError::OrderNumberExhausted => "order_number_exhausted",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::InvalidCredentials => "invalid_credentials",
            ServiceError::InvalidOrExpiredToken => "invalid_or_expired_token",
            ServiceError::AccountInactive => "account_inactive",
            ServiceError::Configuration(_) => "configuration_error",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<InventoryError> for ServiceError {
    fn from(value: InventoryError) -> Self {
        match value {
            InventoryError::InsufficientStock {
                variant_id,
                requested,
                available,
            } => ServiceError::InsufficientStock {
                variant_id,
                requested,
                available,
            },
            InventoryError::VariantUnavailable(id) => ServiceError::VariantUnavailable(id),
            InventoryError::InvalidQuantity(id) => {
                ServiceError::Validation(format!("quantity for variant {id} must be at least 1"))
            }
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::MisconfiguredSigningKey => ServiceError::Configuration(value.to_string()),
            TokenError::InvalidOrExpiredToken => ServiceError::InvalidOrExpiredToken,
            TokenError::Signing(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(value: PasswordError) -> Self {
        match value {
            PasswordError::InvalidParams(msg) => ServiceError::Configuration(msg),
            PasswordError::Hash(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        ServiceError::Configuration(value.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(what) => ServiceError::Conflict(format!("duplicate {what}")),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_sales::OrderStatus;

    #[test]
    fn categories_follow_the_taxonomy() {
        let variant = VariantId::new();
        let cases = [
            (ServiceError::Validation("x".into()), ErrorCategory::Validation),
            (ServiceError::not_found("order"), ErrorCategory::NotFound),
            (
                ServiceError::InsufficientStock {
                    variant_id: variant,
                    requested: 2,
                    available: 1,
                },
                ErrorCategory::Conflict,
            ),
            (ServiceError::DuplicateIdentity, ErrorCategory::Conflict),
            (ServiceError::InvalidCredentials, ErrorCategory::Auth),
            (ServiceError::AccountInactive, ErrorCategory::Auth),
            (
                ServiceError::from(TokenError::MisconfiguredSigningKey),
                ErrorCategory::Configuration,
            ),
            (
                ServiceError::from(StoreError::backend("x", "boom")),
                ErrorCategory::Internal,
            ),
        ];
        for (err, category) in cases {
            assert_eq!(err.category(), category, "{err}");
        }
    }

    #[test]
    fn transition_errors_keep_their_code() {
        let err = ServiceError::from(TransitionError {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Processing,
        });
        assert_eq!(err.code(), "invalid_transition");
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn inventory_errors_map_to_conflicts() {
        let id = VariantId::new();
        assert!(matches!(
            ServiceError::from(InventoryError::VariantUnavailable(id)),
            ServiceError::VariantUnavailable(v) if v == id
        ));
    }

    #[test]
    fn domain_errors_split_into_input_and_internal() {
        let bad_id = ServiceError::from(DomainError::invalid_id("VariantId: bad"));
        assert_eq!(bad_id.category(), ErrorCategory::Validation);
        assert_eq!(bad_id.code(), "validation_error");

        let broken = ServiceError::from(DomainError::invariant("zero quantity line"));
        assert_eq!(broken.category(), ErrorCategory::Internal);
    }
}
