//! Access-token signing/validation and refresh-token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use uuid::Uuid;

use crate::{AccessClaims, User};

/// Refresh tokens are this many random bytes before encoding.
pub const REFRESH_TOKEN_BYTES: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("access-token signing key is missing or blank")]
    MisconfiguredSigningKey,

    #[error("token is invalid or expired")]
    InvalidOrExpiredToken,

    #[error("failed to sign access token: {0}")]
    Signing(String),
}

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl: Duration,
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 access-token issuer and validator.
///
/// Expiry is checked against the caller's `now`, never the wall clock, so a
/// fixed clock drives it in tests.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_ttl: Duration,
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Result<Self, TokenError> {
        if config.secret.trim().is_empty() {
            return Err(TokenError::MisconfiguredSigningKey);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: config.access_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue_access_token(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, TokenError> {
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::now_v7(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedAccessToken { token, expires_at })
    }

    /// Opaque refresh token: 64 bytes from the OS CSPRNG, base64url without
    /// padding. Carries no structure.
    pub fn issue_refresh_token(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Verify signature, issuer and expiry.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::InvalidOrExpiredToken)?;

        if !data.claims.is_live_at(now) {
            return Err(TokenError::InvalidOrExpiredToken);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, UserStatus};
    use storefront_core::UserId;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn config(secret: &str) -> TokenConfig {
        TokenConfig {
            secret: secret.into(),
            issuer: "storefront".into(),
            access_ttl: Duration::minutes(15),
        }
    }

    fn user() -> User {
        User {
            id: UserId::new(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            role: Role::customer(),
            status: UserStatus::Active,
            first_name: None,
            last_name: None,
            last_login_at: None,
            created_at: test_time(),
            updated_at: test_time(),
        }
    }

    #[test]
    fn blank_secret_is_a_configuration_error() {
        assert_eq!(
            TokenIssuer::new(&config("   ")).unwrap_err(),
            TokenError::MisconfiguredSigningKey
        );
    }

    #[test]
    fn issued_token_validates_within_window() {
        let issuer = TokenIssuer::new(&config("s3cret")).unwrap();
        let user = user();
        let issued = issuer.issue_access_token(&user, test_time()).unwrap();

        let claims = issuer
            .validate(&issued.token, test_time() + Duration::minutes(14))
            .unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.role, Role::customer());
        assert_eq!(claims.iss, "storefront");
        assert_eq!(issued.expires_at, test_time() + Duration::minutes(15));
    }

    #[test]
    fn token_expires_after_its_window() {
        let issuer = TokenIssuer::new(&config("s3cret")).unwrap();
        let issued = issuer.issue_access_token(&user(), test_time()).unwrap();

        assert_eq!(
            issuer.validate(&issued.token, test_time() + Duration::minutes(15)),
            Err(TokenError::InvalidOrExpiredToken)
        );
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let issuer = TokenIssuer::new(&config("s3cret")).unwrap();
        let other = TokenIssuer::new(&config("different")).unwrap();
        let issued = other.issue_access_token(&user(), test_time()).unwrap();
        assert_eq!(
            issuer.validate(&issued.token, test_time()),
            Err(TokenError::InvalidOrExpiredToken)
        );

        let mine = issuer.issue_access_token(&user(), test_time()).unwrap();
        let mut tampered = mine.token.clone();
        tampered.push('x');
        assert!(issuer.validate(&tampered, test_time()).is_err());
        assert!(issuer.validate("not.a.jwt", test_time()).is_err());
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let issuer = TokenIssuer::new(&config("s3cret")).unwrap();
        let mut cfg = config("s3cret");
        cfg.issuer = "someone-else".into();
        let foreign = TokenIssuer::new(&cfg).unwrap();

        let issued = foreign.issue_access_token(&user(), test_time()).unwrap();
        assert!(issuer.validate(&issued.token, test_time()).is_err());
    }

    #[test]
    fn refresh_tokens_are_long_and_distinct() {
        let issuer = TokenIssuer::new(&config("s3cret")).unwrap();
        let a = issuer.issue_refresh_token();
        let b = issuer.issue_refresh_token();

        // 64 bytes -> 86 base64url characters without padding
        assert_eq!(a.len(), 86);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
