//! Register, login, refresh-token rotation and revocation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use storefront_auth::{
    AccessClaims, AuthSession, PasswordHasher, Registration, Role, TokenIssuer, User, UserProfile,
    digest_token,
};
use storefront_core::{Clock, SessionId, UserId};

use crate::config::AuthSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{SessionRepository, Store, StoreError, UnitOfWork};

/// Public identity returned alongside tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// An access/refresh pair and the session backing the refresh token.
#[derive(Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub session_id: SessionId,
    pub user: AuthenticatedUser,
}

impl core::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("session_id", &self.session_id)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    issuer: TokenIssuer,
    hasher: Arc<PasswordHasher>,
    refresh_ttl: Duration,
    revoke_family_on_reuse: bool,
}

impl AuthService {
    /// Fails with a configuration error when the signing key is blank or the
    /// hashing cost is rejected.
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: &AuthSettings,
    ) -> ServiceResult<Self> {
        Ok(Self {
            store,
            clock,
            issuer: TokenIssuer::new(&settings.token)?,
            hasher: Arc::new(PasswordHasher::new(settings.password_cost)?),
            refresh_ttl: settings.refresh_ttl,
            revoke_family_on_reuse: settings.revoke_family_on_reuse,
        })
    }

    /// Validate an access token against the service clock.
    pub fn verify_access_token(&self, token: &str) -> ServiceResult<AccessClaims> {
        Ok(self.issuer.validate(token, self.clock.now())?)
    }

    #[instrument(skip(self, registration), fields(username = %registration.username), err)]
    pub async fn register(&self, registration: Registration) -> ServiceResult<AuthTokens> {
        let valid = registration.validate()?;

        {
            let mut uow = self.store.begin().await?;
            check_registrable(uow.as_mut(), &valid.username, &valid.email, &valid.role).await?;
        }

        let hasher = Arc::clone(&self.hasher);
        let password = valid.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::internal(format!("password hashing task failed: {e}")))??;

        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        // Re-checked: the identity may have been taken while hashing.
        check_registrable(uow.as_mut(), &valid.username, &valid.email, &valid.role).await?;

        let mut user = User::register(UserId::new(), &valid, password_hash, now);
        user.record_login(now);
        let profile = UserProfile::default_for(&user);
        match uow.insert_user(&user, &profile).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => return Err(ServiceError::DuplicateIdentity),
            Err(e) => return Err(e.into()),
        }

        let tokens = self.open_session(uow.as_mut(), &user, now).await?;
        uow.commit().await?;

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(tokens)
    }

    /// Username or email (case-insensitive) plus password.
    ///
    /// Unknown users and wrong passwords fail identically, and both pay for
    /// one password verification.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, login: &str, password: &str) -> ServiceResult<AuthTokens> {
        let found = {
            let mut uow = self.store.begin().await?;
            uow.find_user_by_login(login.trim()).await?
        };

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let stored_hash = found.as_ref().map(|u| u.password_hash.clone());
        let verified =
            tokio::task::spawn_blocking(move || hasher.verify(&password, stored_hash.as_deref()))
                .await
                .map_err(|e| ServiceError::internal(format!("password verification task failed: {e}")))?;

        let user = match found {
            Some(user) if verified => user,
            _ => return Err(ServiceError::InvalidCredentials),
        };
        if !user.is_active() {
            warn!(user_id = %user.id, "login rejected for inactive account");
            return Err(ServiceError::AccountInactive);
        }

        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let mut user = uow.user(user.id).await?.ok_or(ServiceError::InvalidCredentials)?;
        if !user.is_active() {
            return Err(ServiceError::AccountInactive);
        }
        user.record_login(now);
        uow.update_user(&user).await?;

        let tokens = self.open_session(uow.as_mut(), &user, now).await?;
        uow.commit().await?;

        info!(user_id = %user.id, "user logged in");
        Ok(tokens)
    }

    /// Rotate a refresh token: the presented session is revoked and replaced.
    ///
    /// The session row stays locked for the whole rotation, so concurrent
    /// refreshes of one token yield exactly one success.
    #[instrument(skip(self, refresh_token), err)]
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<AuthTokens> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let mut session = uow
            .lock_session_by_digest(&digest_token(refresh_token))
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        if session.revoked {
            if session.was_rotated() {
                warn!(
                    session_id = %session.id,
                    user_id = %session.user_id,
                    "rotated refresh token presented again"
                );
                if self.revoke_family_on_reuse {
                    let revoked = revoke_successors(uow.as_mut(), &session, now).await?;
                    uow.commit().await?;
                    warn!(user_id = %session.user_id, revoked, "session family revoked after reuse");
                }
            }
            return Err(ServiceError::InvalidOrExpiredToken);
        }
        if !session.is_active(now) {
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        let user = uow
            .user(session.user_id)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;
        if !user.is_active() {
            warn!(user_id = %user.id, "refresh rejected for inactive account");
            return Err(ServiceError::AccountInactive);
        }

        // The replacement must exist before the old row can point at it.
        let tokens = self.open_session(uow.as_mut(), &user, now).await?;
        session.revoke(now, Some(tokens.session_id));
        uow.update_session(&session).await?;
        uow.commit().await?;

        Ok(tokens)
    }

    /// Revoke every live session of the user.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn logout(&self, user_id: UserId) -> ServiceResult<u64> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let revoked = uow.revoke_user_sessions(user_id, now).await?;
        uow.commit().await?;

        info!(revoked, "user logged out");
        Ok(revoked)
    }

    /// Revoke the session behind one refresh token. Idempotent.
    #[instrument(skip(self, refresh_token), err)]
    pub async fn revoke(&self, refresh_token: &str) -> ServiceResult<()> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let mut session = uow
            .lock_session_by_digest(&digest_token(refresh_token))
            .await?
            .ok_or_else(|| ServiceError::not_found("session"))?;
        if !session.revoked {
            session.revoke(now, None);
            uow.update_session(&session).await?;
        }
        uow.commit().await?;
        Ok(())
    }

    async fn open_session(
        &self,
        uow: &mut dyn UnitOfWork,
        user: &User,
        now: DateTime<Utc>,
    ) -> ServiceResult<AuthTokens> {
        let access = self.issuer.issue_access_token(user, now)?;
        let refresh_token = self.issuer.issue_refresh_token();
        let session = AuthSession::issue(user.id, &refresh_token, now, self.refresh_ttl);
        uow.insert_session(&session).await?;

        Ok(AuthTokens {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token,
            refresh_expires_at: session.expires_at,
            session_id: session.id,
            user: AuthenticatedUser::from(user),
        })
    }
}

async fn check_registrable(
    uow: &mut dyn UnitOfWork,
    username: &str,
    email: &str,
    role: &Role,
) -> ServiceResult<()> {
    if uow.identity_taken(username, email).await? {
        return Err(ServiceError::DuplicateIdentity);
    }
    if !uow.role_exists(role).await? {
        return Err(ServiceError::InvalidRole(role.to_string()));
    }
    Ok(())
}

/// Walk the rotation chain after `reused` and revoke whatever is still live.
async fn revoke_successors<R>(
    repo: &mut R,
    reused: &AuthSession,
    now: DateTime<Utc>,
) -> ServiceResult<u64>
where
    R: SessionRepository + ?Sized,
{
    let mut revoked = 0;
    let mut seen = HashSet::new();
    let mut next = reused.replaced_by;

    while let Some(id) = next {
        if !seen.insert(id) {
            break;
        }
        let Some(mut session) = repo.lock_session(id).await? else {
            break;
        };
        if session.is_active(now) {
            session.revoke(now, None);
            repo.update_session(&session).await?;
            revoked += 1;
        }
        next = session.replaced_by;
    }
    Ok(revoked)
}
