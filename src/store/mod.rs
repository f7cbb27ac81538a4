//! Session and account storage contracts.
//!
//! Every operation is bounded by a timeout; an elapsed timeout surfaces as
//! [`StoreError::Storage`].

mod sqlite;

pub use sqlite::{
    connect, connect_memory, ping, run_migrations, SqliteSessionStore, SqliteUserDirectory,
};

use crate::error::StoreError;
use crate::models::{Session, User};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Budget for single-row operations
pub const POINT_TIMEOUT: Duration = Duration::from_secs(1);

/// Budget for bulk deletes and sweeps
pub const BULK_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistence for session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), StoreError>;

    /// `NotFound` when absent or already expired
    async fn find_by_id(&self, id: Uuid) -> Result<Session, StoreError>;

    async fn extend_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Remove the record and return what was removed
    async fn delete_by_id(&self, id: Uuid) -> Result<Session, StoreError>;

    async fn delete_by_user(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Delete every session whose expiry is at or before now
    async fn sweep_expired(&self) -> Result<u64, StoreError>;
}

/// Persistence for user accounts
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn deactivate(&self, id: Uuid, since: DateTime<Utc>) -> Result<(), StoreError>;

    async fn reactivate(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete accounts deactivated at or before `before`
    async fn purge_deactivated(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Run a storage future under a deadline
pub(crate) async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Storage(format!(
            "operation timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, sqlx::Error>(())
        };

        let result = bounded(POINT_TIMEOUT, slow).await;
        assert!(matches!(result, Err(StoreError::Storage(_))));
    }

    #[tokio::test]
    async fn test_bounded_maps_row_not_found() {
        let result: Result<(), _> =
            bounded(POINT_TIMEOUT, async { Err(sqlx::Error::RowNotFound) }).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
