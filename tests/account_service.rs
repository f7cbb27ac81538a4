mod common;

use auth_session::{
    AccountService, Argon2Hasher, AuthError, CreateAccountRequest, CredentialHasher,
    LoginRequest, UpdatePasswordRequest, UserDirectory,
};
use common::{Harness, PASSWORD};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

/// Records which thread each hashing call ran on
struct ThreadTrackingHasher {
    inner: Argon2Hasher,
    seen: Mutex<Vec<ThreadId>>,
}

impl ThreadTrackingHasher {
    fn new() -> Self {
        Self {
            inner: Argon2Hasher::new(1024, 1, 1).unwrap(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn record(&self) {
        self.seen.lock().unwrap().push(thread::current().id());
    }
}

impl CredentialHasher for ThreadTrackingHasher {
    fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        self.record();
        self.inner.hash(plaintext)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, AuthError> {
        self.record();
        self.inner.verify(plaintext, digest)
    }
}

fn service(h: &Harness, hasher: Arc<ThreadTrackingHasher>) -> AccountService {
    AccountService::new(
        h.users.clone(),
        h.sessions.clone(),
        h.tokens.clone(),
        hasher,
        h.clock.clone(),
    )
}

#[tokio::test]
async fn test_hashing_runs_off_the_runtime_thread() {
    let h = Harness::new().await;
    let hasher = Arc::new(ThreadTrackingHasher::new());
    let accounts = service(&h, hasher.clone());

    accounts
        .create_account(CreateAccountRequest {
            name: "Ana Souza".into(),
            avatar: None,
            email: "ana@example.com".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    accounts
        .login(LoginRequest {
            email: "ana@example.com".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();

    let runtime_thread = thread::current().id();
    let seen = hasher.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|id| *id != runtime_thread));
}

#[tokio::test]
async fn test_password_change_verifies_then_rehashes() {
    let h = Harness::new().await;
    let hasher = Arc::new(ThreadTrackingHasher::new());
    let accounts = service(&h, hasher.clone());
    h.signup("ben@example.com").await;
    let user_id = h.users.find_by_email("ben@example.com").await.unwrap().id;

    let wrong = accounts
        .update_password(
            user_id,
            UpdatePasswordRequest {
                current_password: "not-the-password".into(),
                new_password: "an0ther-passphrase".into(),
            },
        )
        .await;
    assert!(matches!(wrong, Err(AuthError::InvalidCurrentPassword)));

    accounts
        .update_password(
            user_id,
            UpdatePasswordRequest {
                current_password: PASSWORD.into(),
                new_password: "an0ther-passphrase".into(),
            },
        )
        .await
        .unwrap();

    let login = accounts
        .login(LoginRequest {
            email: "ben@example.com".into(),
            password: "an0ther-passphrase".into(),
        })
        .await;
    assert!(login.is_ok());
    assert_eq!(hasher.seen.lock().unwrap().len(), 4);
}
