//! Periodic cleanup of expired sessions and long-deactivated accounts.
//!
//! Each job runs on a fixed interval until its `CancellationToken` fires.
//! Cancellation is only observed between cycles; a sweep in progress always
//! runs to completion.

use crate::service::AccountService;
use crate::store::SessionStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Delete expired sessions once, logging the outcome
pub async fn sweep_sessions_once(store: &dyn SessionStore) {
    match store.sweep_expired().await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Session sweep: removed expired sessions");
            } else {
                tracing::debug!("Session sweep: nothing to remove");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Session sweep failed");
        }
    }
}

/// Purge long-deactivated accounts once, logging the outcome
pub async fn sweep_accounts_once(accounts: &AccountService, retention: chrono::Duration) {
    match accounts.purge_deactivated(retention).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Account sweep: purged deactivated accounts");
            } else {
                tracing::debug!("Account sweep: nothing to purge");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Account sweep failed");
        }
    }
}

/// First tick fires one full period after start
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Run the expired-session sweep loop until `cancel` is triggered
pub async fn run_session_sweep(
    store: Arc<dyn SessionStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = period.as_secs(), "Session sweeper started");

    let mut interval = ticker(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_sessions_once(store.as_ref()).await;
            }
        }
    }
}

/// Run the deactivated-account purge loop until `cancel` is triggered
pub async fn run_account_sweep(
    accounts: AccountService,
    retention: chrono::Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = period.as_secs(),
        retention_days = retention.num_days(),
        "Account sweeper started"
    );

    let mut interval = ticker(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Account sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_accounts_once(&accounts, retention).await;
            }
        }
    }
}

/// Handle to the running background jobs
pub struct Sweepers {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Sweepers {
    /// Spawn both sweep loops under one cancellation token
    pub fn spawn(
        sessions: Arc<dyn SessionStore>,
        session_period: Duration,
        accounts: AccountService,
        retention: chrono::Duration,
        account_period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(run_session_sweep(sessions, session_period, cancel.clone())),
            tokio::spawn(run_account_sweep(
                accounts,
                retention,
                account_period,
                cancel.clone(),
            )),
        ];

        Self { cancel, tasks }
    }

    /// Signal the loops to stop and wait for them up to `timeout`
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();

        let all = wait_for(self.tasks);
        if tokio::time::timeout(timeout, all).await.is_err() {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Sweepers did not stop before the shutdown timeout"
            );
        }
    }
}

async fn wait_for(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Sweeper task panicked");
        }
    }
}
