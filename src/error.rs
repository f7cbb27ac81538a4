//! Authentication Error Types
//!
//! Component errors (`TokenError`, `StoreError`) and the API-facing
//! `AuthError`, which renders as an RFC 7807 problem-details body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors raised by the token provider
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("unusable key material: {0}")]
    KeyMaterial(String),
}

/// Errors raised by session and user storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
            other => StoreError::Storage(other.to_string()),
        }
    }
}

/// API-facing authentication errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    InvalidCurrentPassword,

    #[error("Your account has been deactivated")]
    UserDeactivated,

    #[error("Account is not deactivated")]
    UserNotDeactivated,

    #[error("An account with this email already exists")]
    EmailExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Problem type context, kind, title and status for this error
    fn problem(&self) -> (&'static str, &'static str, &'static str, StatusCode) {
        match self {
            AuthError::Unauthorized => (
                "auth",
                "unauthorized",
                "Unauthorized",
                StatusCode::UNAUTHORIZED,
            ),
            AuthError::InvalidCredentials => (
                "auth",
                "invalid-credentials",
                "Invalid Credentials",
                StatusCode::UNAUTHORIZED,
            ),
            AuthError::InvalidCurrentPassword => (
                "user",
                "invalid-current-password",
                "Invalid Current Password",
                StatusCode::UNAUTHORIZED,
            ),
            AuthError::UserDeactivated => (
                "auth",
                "user-deactivated",
                "Account Deactivated",
                StatusCode::FORBIDDEN,
            ),
            AuthError::UserNotDeactivated => (
                "auth",
                "user-not-deactivated",
                "Account Not Deactivated",
                StatusCode::BAD_REQUEST,
            ),
            AuthError::EmailExists => (
                "user",
                "email-already-exists",
                "Email Already Registered",
                StatusCode::CONFLICT,
            ),
            AuthError::UserNotFound => (
                "user",
                "user-not-found",
                "User Not Found",
                StatusCode::NOT_FOUND,
            ),
            AuthError::Validation(_) => (
                "request",
                "validation-error",
                "Validation Failed",
                StatusCode::BAD_REQUEST,
            ),
            AuthError::Database(_) | AuthError::Config(_) | AuthError::Internal => (
                "server",
                "internal-error",
                "Internal Server Error",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (context, kind, title, status) = self.problem();

        let detail = match &self {
            AuthError::Database(_) | AuthError::Config(_) | AuthError::Internal => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "type": format!("urn:auth-session-api/{context}/{kind}"),
                "title": title,
                "status": status.as_u16(),
                "detail": detail
            })),
        )
            .into_response()
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Storage error: {}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        tracing::error!("Token error: {}", err);
        AuthError::Internal
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unauthorized_is_generic_problem() {
        let (status, body) = body_json(AuthError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], "urn:auth-session-api/auth/unauthorized");
        assert_eq!(body["status"], 401);
        assert_eq!(body["detail"], "Authentication required");
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (status, body) =
            body_json(AuthError::Database("disk I/O error at page 7".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "An unexpected error occurred");
    }

    #[test]
    fn test_store_not_found_from_sqlx() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_sqlx_failure_reaches_api_through_store_error() {
        let err = AuthError::from(StoreError::from(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, AuthError::Database(_)));

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "An unexpected error occurred");
    }
}
