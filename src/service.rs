//! Account Service
//!
//! Account lifecycle: creating accounts, opening and closing sessions,
//! password changes, and deactivation.

use crate::clock::Clock;
use crate::error::{AuthError, StoreError};
use crate::hasher::CredentialHasher;
use crate::models::*;
use crate::store::{SessionStore, UserDirectory};
use crate::token::TokenProvider;

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

/// Account lifecycle operations over injected capabilities
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<dyn TokenProvider>,
    hasher: Arc<dyn CredentialHasher>,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<dyn TokenProvider>,
        hasher: Arc<dyn CredentialHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            hasher,
            clock,
        }
    }

    // ============================================
    // Account Creation
    // ============================================

    /// Register a new account and sign it in
    pub async fn create_account(&self, req: CreateAccountRequest) -> Result<TokenPair, AuthError> {
        match self.users.find_by_email(&req.email).await {
            Ok(_) => return Err(AuthError::EmailExists),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = self.hash_password(&req.password).await?;
        let now = self.clock.now();

        let user = User {
            id: Uuid::new_v4(),
            name: req.name,
            email: req.email,
            password_hash,
            avatar: req.avatar.unwrap_or_default(),
            state: AccountState::Active,
            created_at: now,
            updated_at: now,
        };

        self.users.create(&user).await.map_err(|e| match e {
            StoreError::Conflict => AuthError::EmailExists,
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, "Account created");

        self.open_session(&user).await
    }

    // ============================================
    // Login / Logout
    // ============================================

    /// Verify credentials and open a new session
    pub async fn login(&self, req: LoginRequest) -> Result<TokenPair, AuthError> {
        let user = self.find_for_credentials(&req.email).await?;

        if !user.is_active() {
            return Err(AuthError::UserDeactivated);
        }

        if !self.verify_password(&req.password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        self.open_session(&user).await
    }

    /// Delete the caller's session
    pub async fn logout(&self, session_id: Uuid) -> Result<(), AuthError> {
        match self.sessions.delete_by_id(session_id).await {
            Ok(session) => {
                tracing::info!(
                    session_id = %session.id,
                    user_id = %session.user_id,
                    "Session deleted"
                );
                Ok(())
            }
            // Already swept or revoked concurrently
            Err(StoreError::NotFound) => {
                tracing::debug!(session_id = %session_id, "Logout for missing session");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ============================================
    // Password
    // ============================================

    /// Change the password after checking the current one
    pub async fn update_password(
        &self,
        user_id: Uuid,
        req: UpdatePasswordRequest,
    ) -> Result<(), AuthError> {
        let user = self.find_user(user_id).await?;

        if !self
            .verify_password(&req.current_password, &user.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCurrentPassword);
        }

        let password_hash = self.hash_password(&req.new_password).await?;
        self.users
            .update_password(user.id, &password_hash)
            .await
            .map_err(not_found_as_user)?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    // ============================================
    // Deactivation
    // ============================================

    /// Revoke every session of the account, then mark it deactivated
    pub async fn deactivate(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.sessions.delete_by_user(user_id).await?;

        self.users
            .deactivate(user_id, self.clock.now())
            .await
            .map_err(not_found_as_user)?;

        tracing::info!(user_id = %user_id, "Account deactivated");
        Ok(())
    }

    /// Restore a deactivated account and sign it in
    pub async fn reactivate(&self, req: LoginRequest) -> Result<TokenPair, AuthError> {
        let user = self.find_for_credentials(&req.email).await?;

        if user.is_active() {
            return Err(AuthError::UserNotDeactivated);
        }

        if !self.verify_password(&req.password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        self.users
            .reactivate(user.id)
            .await
            .map_err(not_found_as_user)?;

        tracing::info!(user_id = %user.id, "Account reactivated");

        self.open_session(&user).await
    }

    /// Delete accounts that have been deactivated for at least `retention`
    pub async fn purge_deactivated(&self, retention: Duration) -> Result<u64, AuthError> {
        let cutoff = self.clock.now() - retention;
        Ok(self.users.purge_deactivated(cutoff).await?)
    }

    // ============================================
    // Helpers
    // ============================================

    async fn find_for_credentials(&self, email: &str) -> Result<User, AuthError> {
        match self.users.find_by_email(email).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(e.into()),
        }
    }

    /// Hashing is CPU-bound, so it runs on the blocking pool
    async fn hash_password(&self, plaintext: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing task failed");
                AuthError::Internal
            })?
    }

    async fn verify_password(&self, plaintext: &str, digest: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_owned();
        let digest = digest.to_owned();

        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password verification task failed");
                AuthError::Internal
            })?
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users.find_by_id(user_id).await.map_err(not_found_as_user)
    }

    /// Persist a new session and issue its token pair
    async fn open_session(&self, user: &User) -> Result<TokenPair, AuthError> {
        let now = self.clock.now();
        let session = Session::new(user.id, now, now + self.tokens.ttl().refresh);

        self.sessions.create(&session).await?;

        let tokens = TokenPair {
            access_token: self.tokens.issue_access(session.id)?,
            refresh_token: self.tokens.issue_refresh(user.id, session.id)?,
        };

        tracing::debug!(session_id = %session.id, user_id = %user.id, "Session opened");
        Ok(tokens)
    }
}

fn not_found_as_user(err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound => AuthError::UserNotFound,
        other => other.into(),
    }
}
