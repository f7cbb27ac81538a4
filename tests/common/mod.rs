#![allow(dead_code)]

use auth_session::{
    store, AccountService, AppState, Argon2Hasher, AuthenticationGate, Clock, CookiePolicy,
    CreateAccountRequest, JwtProvider, ManualClock, SessionStore, SqliteSessionStore,
    SqliteUserDirectory, TokenPair, TokenTtl, UserDirectory,
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

pub const PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/jwt_private.pem");
pub const PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/jwt_public.pem");

pub const PASSWORD: &str = "s3cret-passphrase";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

pub fn ttl() -> TokenTtl {
    TokenTtl {
        access: Duration::minutes(60),
        refresh: Duration::minutes(10080),
    }
}

/// Fully wired service over an in-memory database and a manual clock
pub struct Harness {
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub tokens: Arc<JwtProvider>,
    pub sessions: Arc<SqliteSessionStore>,
    pub users: Arc<SqliteUserDirectory>,
    pub gate: AuthenticationGate,
    pub accounts: AccountService,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = store::connect_memory().await.unwrap();
        store::run_migrations(&pool).await.unwrap();

        let clock = Arc::new(ManualClock::new(start_time()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let tokens =
            Arc::new(JwtProvider::from_pem(PRIVATE_PEM, PUBLIC_PEM, ttl(), dyn_clock.clone()).unwrap());
        let sessions = Arc::new(SqliteSessionStore::new(pool.clone(), dyn_clock.clone()));
        let users = Arc::new(SqliteUserDirectory::new(pool.clone(), dyn_clock.clone()));
        let hasher = Arc::new(Argon2Hasher::new(1024, 1, 1).unwrap());

        let gate = AuthenticationGate::new(
            tokens.clone(),
            sessions.clone(),
            users.clone(),
            dyn_clock.clone(),
        );
        let accounts = AccountService::new(
            users.clone(),
            sessions.clone(),
            tokens.clone(),
            hasher,
            dyn_clock,
        );

        Self {
            pool,
            clock,
            tokens,
            sessions,
            users,
            gate,
            accounts,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            gate: self.gate.clone(),
            accounts: self.accounts.clone(),
            cookies: CookiePolicy::new(false),
            ttl: ttl(),
            db: self.pool.clone(),
        }
    }

    /// Create an account and return its freshly issued pair
    pub async fn signup(&self, email: &str) -> TokenPair {
        self.accounts
            .create_account(CreateAccountRequest {
                name: "Ana Souza".into(),
                avatar: None,
                email: email.into(),
                password: PASSWORD.into(),
            })
            .await
            .unwrap()
    }

    pub fn session_store(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub fn user_directory(&self) -> &dyn UserDirectory {
        self.users.as_ref()
    }
}
