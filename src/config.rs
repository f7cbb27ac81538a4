//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! Key material is never inlined; only the paths to the PEM files are.

use crate::error::AuthError;
use std::env;
use std::str::FromStr;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AuthError::Config(format!("unknown ENV value: {other}"))),
        }
    }
}

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Deployment environment (from ENV env var)
    pub environment: Environment,

    /// Bind host (from HOST env var)
    pub host: String,

    /// Bind port (from PORT env var)
    pub port: u16,

    /// Tracing filter directive (from LOG_LEVEL env var)
    pub log_level: String,

    /// Path to the RSA private key PEM (from PRIVATE_KEY_PATH env var)
    pub private_key_path: String,

    /// Path to the RSA public key PEM (from PUBLIC_KEY_PATH env var)
    pub public_key_path: String,

    /// Access token lifetime in minutes (from ACCESS_TOKEN_EXPIRY env var)
    pub access_token_expiry: i64,

    /// Refresh token and session lifetime in minutes (from REFRESH_TOKEN_EXPIRY env var)
    pub refresh_token_expiry: i64,

    /// SQLite database file (from DB_PATH env var)
    pub db_path: String,

    /// Maximum pool connections (from DB_MAX_CONN env var)
    pub db_max_conn: u32,

    /// Minimum idle pool connections (from DB_MIN_CONN env var)
    pub db_min_conn: u32,

    /// Connection lifetime in seconds (from DB_MAX_LIFETIME env var)
    pub db_max_lifetime: u64,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost (iterations) (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Expired session sweep interval in seconds (from SESSION_SWEEP_INTERVAL env var)
    pub session_sweep_interval: u64,

    /// Deactivated account sweep interval in seconds (from ACCOUNT_SWEEP_INTERVAL env var)
    pub account_sweep_interval: u64,

    /// Days a deactivated account is kept (from DEACTIVATED_RETENTION_DAYS env var)
    pub deactivated_retention_days: i64,

    /// Graceful shutdown budget in seconds (from SHUTDOWN_TIMEOUT env var)
    pub shutdown_timeout: u64,
}

/// Read an optional numeric variable; a set but unparseable value is an error
fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, AuthError> {
    parse_value(key, env::var(key).ok(), default)
}

fn parse_value<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, AuthError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AuthError::Config(format!("{key} has invalid value: {value}"))),
    }
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        let environment = match env::var("ENV") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        let private_key_path = env::var("PRIVATE_KEY_PATH")
            .map_err(|_| AuthError::Config("PRIVATE_KEY_PATH must be set".to_string()))?;
        let public_key_path = env::var("PUBLIC_KEY_PATH")
            .map_err(|_| AuthError::Config("PUBLIC_KEY_PATH must be set".to_string()))?;

        Ok(Self {
            environment,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed_or("PORT", 8080)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            private_key_path,
            public_key_path,
            access_token_expiry: parsed_or("ACCESS_TOKEN_EXPIRY", 60)?,
            refresh_token_expiry: parsed_or("REFRESH_TOKEN_EXPIRY", 10080)?, // 7 days
            db_path: env::var("DB_PATH")
                .unwrap_or_else(|_| "./data/auth-session.db".to_string()),
            db_max_conn: parsed_or("DB_MAX_CONN", 10)?,
            db_min_conn: parsed_or("DB_MIN_CONN", 5)?,
            db_max_lifetime: parsed_or("DB_MAX_LIFETIME", 3600)?,
            argon2_memory_cost: parsed_or("ARGON2_MEMORY_COST", 65536)?, // 64 MiB
            argon2_time_cost: parsed_or("ARGON2_TIME_COST", 3)?,
            argon2_parallelism: parsed_or("ARGON2_PARALLELISM", 4)?,
            session_sweep_interval: parsed_or("SESSION_SWEEP_INTERVAL", 43200)?, // 12 hours
            account_sweep_interval: parsed_or("ACCOUNT_SWEEP_INTERVAL", 86400)?, // 24 hours
            deactivated_retention_days: parsed_or("DEACTIVATED_RETENTION_DAYS", 7)?,
            shutdown_timeout: parsed_or("SHUTDOWN_TIMEOUT", 10)?,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.private_key_path.trim().is_empty() || self.public_key_path.trim().is_empty() {
            return Err(AuthError::Config(
                "PRIVATE_KEY_PATH and PUBLIC_KEY_PATH must not be empty".to_string(),
            ));
        }

        if self.access_token_expiry <= 0 {
            return Err(AuthError::Config(
                "ACCESS_TOKEN_EXPIRY must be positive".to_string(),
            ));
        }

        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err(AuthError::Config(
                "REFRESH_TOKEN_EXPIRY must be greater than ACCESS_TOKEN_EXPIRY".to_string(),
            ));
        }

        if self.session_sweep_interval == 0 || self.account_sweep_interval == 0 {
            return Err(AuthError::Config(
                "sweep intervals must be positive".to_string(),
            ));
        }

        if self.deactivated_retention_days < 0 {
            return Err(AuthError::Config(
                "DEACTIVATED_RETENTION_DAYS must not be negative".to_string(),
            ));
        }

        if self.db_max_conn == 0 || self.db_min_conn > self.db_max_conn {
            return Err(AuthError::Config(
                "DB_MAX_CONN must be positive and at least DB_MIN_CONN".to_string(),
            ));
        }

        Ok(())
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expiry)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.refresh_token_expiry)
    }

    pub fn deactivated_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.deactivated_retention_days)
    }
}
