//! Session Middleware
//!
//! Runs the authentication gate for protected routes. A successful pass
//! stores the caller's [`Identity`](crate::models::Identity) in request
//! extensions and rotates both auth cookies on the way out.

use crate::cookie::{read_cookie, sets_auth_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::error::AuthError;
use crate::gate::GateFailure;
use crate::handlers::AppState;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Require a live session
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let access = read_cookie(req.headers(), ACCESS_COOKIE).map(str::to_owned);
    let refresh = read_cookie(req.headers(), REFRESH_COOKIE).map(str::to_owned);

    let outcome = state
        .gate
        .authenticate(access.as_deref(), refresh.as_deref())
        .await;

    let authenticated = match outcome {
        Ok(authenticated) => authenticated,
        Err(GateFailure::Rejected(rejection)) => {
            tracing::debug!(reason = %rejection, "Request rejected by session gate");
            let mut response = AuthError::Unauthorized.into_response();
            if rejection.clears_cookies() {
                state.cookies.apply_clear(response.headers_mut());
            }
            return response;
        }
        Err(GateFailure::Internal(e)) => {
            tracing::error!(error = %e, "Session gate failed");
            return AuthError::Internal.into_response();
        }
    };

    req.extensions_mut().insert(authenticated.identity);

    let mut response = next.run(req).await;

    // Handlers that clear the cookies (logout, deactivate) take precedence
    if !sets_auth_cookie(response.headers()) {
        state
            .cookies
            .apply_pair(response.headers_mut(), &authenticated.tokens, state.ttl);
    }

    response
}
