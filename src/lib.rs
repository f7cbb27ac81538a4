//! Cookie-based session authentication service
//!
//! Authenticates HTTP clients with a pair of RS256-signed tokens backed by
//! a server-side session record:
//! - Short-lived access token naming the session
//! - Long-lived refresh token binding the user to the session
//! - Sliding renewal: every authenticated request rotates both tokens and
//!   extends the session
//! - Argon2id password hashing
//! - Account lifecycle (create, login, logout, password change,
//!   deactivation and reactivation)
//! - Background sweeps of expired sessions and deactivated accounts
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables, see
//! [`AuthConfig::from_env`]. The keypair is read from
//! `PRIVATE_KEY_PATH` / `PUBLIC_KEY_PATH` (both required).
//!
//! # Usage
//!
//! ```rust,ignore
//! use auth_session::{create_routes, AppState};
//!
//! let app = create_routes(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod clock;
pub mod config;
pub mod cookie;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod hasher;
pub mod middleware;
pub mod models;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod token;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, Environment};
pub use cookie::CookiePolicy;
pub use error::{AuthError, StoreError, TokenError};
pub use gate::{Authenticated, AuthenticationGate, GateFailure, Rejection};
pub use handlers::{create_routes, AppState};
pub use hasher::{Argon2Hasher, CredentialHasher};
pub use models::*;
pub use service::AccountService;
pub use store::{SessionStore, SqliteSessionStore, SqliteUserDirectory, UserDirectory};
pub use sweeper::Sweepers;
pub use token::{ExpiryCheck, JwtProvider, TokenProvider, TokenTtl};
