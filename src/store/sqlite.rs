//! SQLite storage backed by sqlx.
//!
//! Ids are stored as UUID blobs and timestamps as unix milliseconds so
//! expiry comparisons stay numeric.

use super::{bounded, SessionStore, UserDirectory, BULK_TIMEOUT, POINT_TIMEOUT};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::StoreError;
use crate::models::{AccountState, Session, User};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Open a pool for the configured database file, creating it if missing
pub async fn connect(config: &AuthConfig) -> Result<SqlitePool, StoreError> {
    if let Some(dir) = Path::new(&config.db_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| {
                StoreError::Storage(format!("failed to create database directory: {e}"))
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_conn)
        .min_connections(config.db_min_conn)
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Single-connection in-memory database; the connection is never recycled
/// since dropping it would drop the data.
pub async fn connect_memory() -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    Ok(pool)
}

/// Liveness probe used by the health check
pub async fn ping(pool: &SqlitePool) -> Result<(), StoreError> {
    bounded(POINT_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await?;
    Ok(())
}

/// Create tables and indexes
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    tracing::info!("Running session storage migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            avatar TEXT NOT NULL DEFAULT '',
            deactivated_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_deactivated ON users(deactivated_at);")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id BLOB PRIMARY KEY NOT NULL,
            user_id BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);")
        .execute(pool)
        .await?;

    tracing::info!("Session storage migrations completed");
    Ok(())
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Storage(format!("timestamp out of range: {ms}")))
}

// ============================================
// Sessions
// ============================================

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    created_at: i64,
    updated_at: i64,
    expires_at: i64,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
            expires_at: from_millis(row.expires_at)?,
        })
    }
}

/// SQLite session store
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        bounded(
            POINT_TIMEOUT,
            sqlx::query(
                r#"
                INSERT INTO sessions (id, user_id, created_at, updated_at, expires_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.id)
            .bind(session.user_id)
            .bind(millis(session.created_at))
            .bind(millis(session.updated_at))
            .bind(millis(session.expires_at))
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Session, StoreError> {
        let now = millis(self.clock.now());

        let row = bounded(
            POINT_TIMEOUT,
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT id, user_id, created_at, updated_at, expires_at
                FROM sessions
                WHERE id = ? AND expires_at > ?
                "#,
            )
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn extend_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = bounded(
            POINT_TIMEOUT,
            sqlx::query("UPDATE sessions SET expires_at = ?, updated_at = ? WHERE id = ?")
                .bind(millis(expires_at))
                .bind(millis(self.clock.now()))
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Storage(format!(
                "cannot extend missing session {id}"
            )));
        }

        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Session, StoreError> {
        let row = bounded(
            POINT_TIMEOUT,
            sqlx::query_as::<_, SessionRow>(
                r#"
                DELETE FROM sessions
                WHERE id = ?
                RETURNING id, user_id, created_at, updated_at, expires_at
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        let result = bounded(
            BULK_TIMEOUT,
            sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;

        tracing::debug!(
            user_id = %user_id,
            deleted = result.rows_affected(),
            "Deleted sessions for user"
        );
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let result = bounded(
            BULK_TIMEOUT,
            sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
                .bind(millis(self.clock.now()))
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}

// ============================================
// Users
// ============================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    avatar: String,
    deactivated_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let state = match row.deactivated_at {
            Some(ms) => AccountState::Deactivated {
                since: from_millis(ms)?,
            },
            None => AccountState::Active,
        };

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            avatar: row.avatar,
            state,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, avatar, deactivated_at, created_at, updated_at";

/// SQLite user directory
#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn touch(&self, sql: &str, id: Uuid, value: Option<i64>) -> Result<(), StoreError> {
        let result = bounded(
            POINT_TIMEOUT,
            sqlx::query(sql)
                .bind(value)
                .bind(millis(self.clock.now()))
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let deactivated_at = match user.state {
            AccountState::Active => None,
            AccountState::Deactivated { since } => Some(millis(since)),
        };

        bounded(
            POINT_TIMEOUT,
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, password_hash, avatar, deactivated_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.avatar)
            .bind(deactivated_at)
            .bind(millis(user.created_at))
            .bind(millis(user.updated_at))
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = bounded(
            POINT_TIMEOUT,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = bounded(
            POINT_TIMEOUT,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = bounded(
            POINT_TIMEOUT,
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(millis(self.clock.now()))
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn deactivate(&self, id: Uuid, since: DateTime<Utc>) -> Result<(), StoreError> {
        self.touch(
            "UPDATE users SET deactivated_at = ?, updated_at = ? WHERE id = ?",
            id,
            Some(millis(since)),
        )
        .await
    }

    async fn reactivate(&self, id: Uuid) -> Result<(), StoreError> {
        self.touch(
            "UPDATE users SET deactivated_at = ?, updated_at = ? WHERE id = ?",
            id,
            None,
        )
        .await
    }

    async fn purge_deactivated(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = bounded(
            BULK_TIMEOUT,
            sqlx::query("DELETE FROM users WHERE deactivated_at IS NOT NULL AND deactivated_at <= ?")
                .bind(millis(before))
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}
