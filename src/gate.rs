//! Authentication Gate
//!
//! Per-request session check with sliding renewal. Given the two cookie
//! values it either resolves the caller's identity and rotates the token
//! pair, or rejects the request. Revocation-class rejections tell the
//! caller to clear both cookies.

use crate::clock::Clock;
use crate::error::StoreError;
use crate::models::{Identity, TokenPair};
use crate::store::{SessionStore, UserDirectory};
use crate::token::{ExpiryCheck, TokenProvider};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("access token cookie missing")]
    MissingAccessToken,

    #[error("access token failed verification")]
    InvalidAccessToken,

    #[error("access token names a malformed session id")]
    MalformedSessionRef,

    #[error("session no longer exists")]
    SessionGone,

    #[error("refresh token cookie missing")]
    MissingRefreshToken,

    #[error("refresh token failed verification")]
    RefreshInvalid,

    #[error("session owner missing or deactivated")]
    OwnerMissing,
}

impl Rejection {
    /// Whether both auth cookies must be cleared on the response
    pub fn clears_cookies(&self) -> bool {
        matches!(
            self,
            Rejection::SessionGone | Rejection::MissingRefreshToken | Rejection::RefreshInvalid
        )
    }
}

/// Outcome of a failed authentication attempt
#[derive(Debug, thiserror::Error)]
pub enum GateFailure {
    #[error("request rejected: {0}")]
    Rejected(Rejection),

    #[error("internal failure: {0}")]
    Internal(String),
}

impl From<Rejection> for GateFailure {
    fn from(rejection: Rejection) -> Self {
        GateFailure::Rejected(rejection)
    }
}

/// A successful pass through the gate
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    /// Freshly rotated pair to send back as cookies
    pub tokens: TokenPair,
    /// Session expiry after this rotation
    pub expires_at: DateTime<Utc>,
}

/// Validates tokens against stored sessions and rotates them
#[derive(Clone)]
pub struct AuthenticationGate {
    tokens: Arc<dyn TokenProvider>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl AuthenticationGate {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            sessions,
            users,
            clock,
        }
    }

    /// Run the session state machine for one request
    pub async fn authenticate(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<Authenticated, GateFailure> {
        let access_token = present(access_token).ok_or(Rejection::MissingAccessToken)?;

        let access = self
            .tokens
            .verify_access(access_token, ExpiryCheck::Skip)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                Rejection::InvalidAccessToken
            })?;

        let session_id =
            Uuid::parse_str(access.session_id()).map_err(|_| Rejection::MalformedSessionRef)?;

        let session = match self.sessions.find_by_id(session_id).await {
            Ok(session) => session,
            Err(StoreError::NotFound) => {
                tracing::debug!(session_id = %session_id, "Session not found or expired");
                return Err(Rejection::SessionGone.into());
            }
            Err(e) => return Err(GateFailure::Internal(e.to_string())),
        };

        let refresh_token = present(refresh_token).ok_or(Rejection::MissingRefreshToken)?;

        if let Err(e) = self.tokens.verify_refresh(refresh_token) {
            tracing::info!(
                session_id = %session_id,
                error = %e,
                "Refresh token invalid, revoking session"
            );
            if let Err(e) = self.sessions.delete_by_id(session_id).await {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to delete session after refresh token failure"
                );
            }
            return Err(Rejection::RefreshInvalid.into());
        }

        // Owner comes from the session record, not the refresh token
        let user_id = session.user_id;
        let user = match self.users.find_by_id(user_id).await {
            Ok(user) if user.is_active() => user,
            Ok(_) => {
                tracing::debug!(user_id = %user_id, "Session owner is deactivated");
                return Err(Rejection::OwnerMissing.into());
            }
            Err(StoreError::NotFound) => {
                tracing::debug!(user_id = %user_id, "Session owner not found");
                return Err(Rejection::OwnerMissing.into());
            }
            Err(e) => return Err(GateFailure::Internal(e.to_string())),
        };

        let tokens = TokenPair {
            access_token: self
                .tokens
                .issue_access(session.id)
                .map_err(|e| GateFailure::Internal(e.to_string()))?,
            refresh_token: self
                .tokens
                .issue_refresh(user.id, session.id)
                .map_err(|e| GateFailure::Internal(e.to_string()))?,
        };

        // Expiry never moves backwards
        let renewed = self.clock.now() + self.tokens.ttl().refresh;
        let expires_at = renewed.max(session.expires_at);

        if let Err(e) = self.sessions.extend_expiry(session.id, expires_at).await {
            tracing::warn!(
                session_id = %session.id,
                error = %e,
                "Failed to extend session expiry"
            );
        }

        Ok(Authenticated {
            identity: Identity::new(&user, session.id),
            tokens,
            expires_at,
        })
    }
}
