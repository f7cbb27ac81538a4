//! HTTP Handlers
//!
//! REST endpoints for the account lifecycle and the health check.

use crate::cookie::CookiePolicy;
use crate::error::AuthError;
use crate::gate::AuthenticationGate;
use crate::middleware;
use crate::models::*;
use crate::service::AccountService;
use crate::store;
use crate::token::TokenTtl;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use sqlx::SqlitePool;
use validator::Validate;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthenticationGate,
    pub accounts: AccountService,
    pub cookies: CookiePolicy,
    pub ttl: TokenTtl,
    pub db: SqlitePool,
}

// ============================================
// Route Builder
// ============================================

/// Create the API routes
pub fn create_routes(state: AppState) -> Router {
    // Public routes (no session required)
    let public = Router::new()
        .route("/health", get(health))
        .route("/v1/user/create-account", post(create_account))
        .route("/v1/user/reactivate", patch(reactivate))
        .route("/v1/auth/login", post(login));

    // Protected routes (session gate)
    let protected = Router::new()
        .route("/v1/user/password", patch(update_password))
        .route("/v1/user", delete(delete_user))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/auth/me", get(me))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}

/// Set-Cookie headers for a newly opened session
fn session_cookies(state: &AppState, tokens: &TokenPair) -> HeaderMap {
    let mut headers = HeaderMap::new();
    state.cookies.apply_pair(&mut headers, tokens, state.ttl);
    headers
}

fn cleared_cookies(state: &AppState) -> HeaderMap {
    let mut headers = HeaderMap::new();
    state.cookies.apply_clear(&mut headers);
    headers
}

// ============================================
// Health
// ============================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match store::ping(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "WORKING", "database": "healthy" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "WORKING", "database": "error" })),
            )
        }
    }
}

// ============================================
// Account Creation / Reactivation
// ============================================

/// POST /v1/user/create-account
pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let tokens = state.accounts.create_account(req).await?;

    Ok((
        StatusCode::CREATED,
        session_cookies(&state, &tokens),
        Json(tokens),
    ))
}

/// PATCH /v1/user/reactivate
pub async fn reactivate(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let tokens = state.accounts.reactivate(req).await?;

    Ok((session_cookies(&state, &tokens), Json(tokens)))
}

// ============================================
// Login / Logout
// ============================================

/// POST /v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let tokens = state.accounts.login(req).await?;

    Ok((session_cookies(&state, &tokens), Json(tokens)))
}

/// POST /v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, AuthError> {
    state.accounts.logout(identity.session_id).await?;

    Ok((StatusCode::OK, cleared_cookies(&state)))
}

/// GET /v1/auth/me
pub async fn me(identity: Identity) -> Json<UserResponse> {
    Json(UserResponse::from(&identity))
}

// ============================================
// Account Management
// ============================================

/// PATCH /v1/user/password
pub async fn update_password(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    state
        .accounts
        .update_password(identity.user_id, req)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/user
///
/// Deactivates the account; it is purged after the retention period
pub async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, AuthError> {
    state.accounts.deactivate(identity.user_id).await?;

    Ok((StatusCode::OK, cleared_cookies(&state)))
}
