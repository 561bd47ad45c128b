//! Refresh-token sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use storefront_core::{Entity, SessionId, UserId};

/// SHA-256 of a refresh token, lower-case hex. Sessions are stored and looked
/// up by this digest; the token itself is never persisted.
pub fn digest_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// A persisted refresh-token record.
///
/// Valid iff not revoked and not expired. Never deleted: revocation only sets
/// `revoked`, `revoked_at` and, on rotation, `replaced_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: SessionId,
    pub token_digest: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<SessionId>,
    pub created_at: DateTime<Utc>,
}

impl Entity for AuthSession {
    type Id = SessionId;

    fn id(&self) -> SessionId {
        self.id
    }
}

impl AuthSession {
    pub fn issue(user_id: UserId, refresh_token: &str, now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            id: SessionId::new(),
            token_digest: digest_token(refresh_token),
            user_id,
            expires_at: now + lifetime,
            revoked: false,
            revoked_at: None,
            replaced_by: None,
            created_at: now,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }

    /// Revoke the session. Revoking twice keeps the first `revoked_at`.
    pub fn revoke(&mut self, now: DateTime<Utc>, replaced_by: Option<SessionId>) {
        if self.revoked {
            return;
        }
        self.revoked = true;
        self.revoked_at = Some(now);
        self.replaced_by = replaced_by;
    }

    /// Revoked because it was rotated, as opposed to logout/explicit revoke.
    pub fn was_rotated(&self) -> bool {
        self.replaced_by.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn digest_is_stable_hex_sha256() {
        assert_eq!(
            digest_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn session_expires_at_its_lifetime() {
        let s = AuthSession::issue(UserId::new(), "tok", test_time(), Duration::days(7));
        assert!(s.is_active(test_time() + Duration::days(7) - Duration::seconds(1)));
        assert!(!s.is_active(test_time() + Duration::days(7)));
        assert_ne!(s.token_digest, "tok");
    }

    #[test]
    fn revocation_is_idempotent() {
        let mut s = AuthSession::issue(UserId::new(), "tok", test_time(), Duration::days(7));
        let replacement = SessionId::new();
        s.revoke(test_time(), Some(replacement));
        s.revoke(test_time() + Duration::hours(1), None);

        assert!(!s.is_active(test_time()));
        assert_eq!(s.revoked_at, Some(test_time()));
        assert_eq!(s.replaced_by, Some(replacement));
        assert!(s.was_rotated());
    }
}
