//! Runtime configuration, read from environment variables.

use core::str::FromStr;

use chrono::Duration;
use rust_decimal::Decimal;
use thiserror::Error;

use storefront_auth::{PasswordHashCost, TokenConfig};
use storefront_sales::PricingPolicy;

pub use storefront_observability::LogFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Session and theft-response settings for the auth orchestrator.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub token: TokenConfig,
    pub refresh_ttl: Duration,
    pub revoke_family_on_reuse: bool,
    pub password_cost: PasswordHashCost,
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub auth: AuthSettings,
    pub pricing: PricingPolicy,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub log_format: LogFormat,
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    ///
    /// A missing `JWT_SECRET` is not rejected here; the token issuer refuses a
    /// blank key when the services are constructed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_minutes: i64 = parse_or(&get, "ACCESS_TOKEN_MINUTES", 15)?;
        let refresh_days: i64 = parse_or(&get, "REFRESH_TOKEN_DAYS", 7)?;
        positive("ACCESS_TOKEN_MINUTES", access_minutes)?;
        positive("REFRESH_TOKEN_DAYS", refresh_days)?;

        let default_cost = PasswordHashCost::default();
        let password_cost = PasswordHashCost {
            memory_kib: parse_or(&get, "PASSWORD_HASH_MEMORY_KIB", default_cost.memory_kib)?,
            iterations: parse_or(&get, "PASSWORD_HASH_ITERATIONS", default_cost.iterations)?,
            parallelism: default_cost.parallelism,
        };

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: parse_or(
                &get,
                "FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping_fee: parse_or(&get, "FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
            tax_rate: parse_or::<Decimal, _>(&get, "TAX_RATE", defaults.tax_rate)?,
        };
        pricing
            .validate()
            .map_err(|e| ConfigError::invalid("pricing", "", e.to_string()))?;

        Ok(Self {
            auth: AuthSettings {
                token: TokenConfig {
                    secret: lookup("JWT_SECRET").unwrap_or_default(),
                    issuer: get("JWT_ISSUER").unwrap_or_else(|| "storefront".to_string()),
                    access_ttl: Duration::minutes(access_minutes),
                },
                refresh_ttl: Duration::days(refresh_days),
                revoke_family_on_reuse: parse_bool(&get, "REVOKE_FAMILY_ON_REUSE", false)?,
                password_cost,
            },
            pricing,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            log_format: parse_or(&get, "LOG_FORMAT", LogFormat::default())?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, &raw, "expected a boolean")),
        },
        None => Ok(default),
    }
}

fn positive(key: &'static str, value: i64) -> Result<(), ConfigError> {
    if value <= 0 {
        return Err(ConfigError::invalid(key, &value.to_string(), "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use storefront_core::Money;

    fn config(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[("JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(cfg.auth.token.issuer, "storefront");
        assert_eq!(cfg.auth.token.access_ttl, Duration::minutes(15));
        assert_eq!(cfg.auth.refresh_ttl, Duration::days(7));
        assert!(!cfg.auth.revoke_family_on_reuse);
        assert_eq!(cfg.pricing, PricingPolicy::default());
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.auth.password_cost, PasswordHashCost::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_MINUTES", "5"),
            ("REVOKE_FAMILY_ON_REUSE", "true"),
            ("TAX_RATE", "0.2"),
            ("FLAT_SHIPPING_FEE", "4.99"),
            ("LOG_FORMAT", "Pretty"),
            ("DATABASE_URL", "postgres://localhost/shop"),
        ])
        .unwrap();

        assert_eq!(cfg.auth.token.access_ttl, Duration::minutes(5));
        assert!(cfg.auth.revoke_family_on_reuse);
        assert_eq!(cfg.pricing.tax_rate, Decimal::new(2, 1));
        assert_eq!(cfg.pricing.flat_shipping_fee, Money::from_cents(499));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/shop"));
    }

    #[test]
    fn missing_secret_is_left_for_the_issuer_to_reject() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.auth.token.secret.is_empty());
    }

    #[test]
    fn malformed_values_are_errors() {
        for (key, value) in [
            ("ACCESS_TOKEN_MINUTES", "soon"),
            ("ACCESS_TOKEN_MINUTES", "0"),
            ("REFRESH_TOKEN_DAYS", "-1"),
            ("REVOKE_FAMILY_ON_REUSE", "maybe"),
            ("TAX_RATE", "-0.1"),
            ("LOG_FORMAT", "xml"),
        ] {
            assert!(config(&[(key, value)]).is_err(), "{key}={value} should be rejected");
        }
    }
}
