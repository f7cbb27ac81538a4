//! Token Provider
//!
//! Issues and verifies the RS256-signed access and refresh tokens. The
//! provider is a pure function of its keypair, its lifetimes and the clock.

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::TokenError;
use crate::models::{AccessTokenClaims, RefreshTokenClaims};

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::RS256;

/// Whether an access token's `exp` claim is enforced on verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    Enforce,
    /// The session gate rotates on every request, so an expired but
    /// well-signed access token still identifies the session.
    Skip,
}

/// Token lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenTtl {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            access: config.access_ttl(),
            refresh: config.refresh_ttl(),
        }
    }
}

/// Signs and verifies session tokens
pub trait TokenProvider: Send + Sync {
    /// Issue an access token naming `session_id`
    fn issue_access(&self, session_id: Uuid) -> Result<String, TokenError>;

    /// Issue a refresh token binding `user_id` to `session_id`
    fn issue_refresh(&self, user_id: Uuid, session_id: Uuid) -> Result<String, TokenError>;

    fn verify_access(&self, token: &str, expiry: ExpiryCheck)
        -> Result<AccessTokenClaims, TokenError>;

    /// Refresh tokens are always expiry-checked
    fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, TokenError>;

    fn ttl(&self) -> TokenTtl;
}

/// RS256 JWT implementation of [`TokenProvider`]
pub struct JwtProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: TokenTtl,
    clock: Arc<dyn Clock>,
}

impl JwtProvider {
    /// Build a provider from PEM-encoded RSA key material
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        ttl: TokenTtl,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| TokenError::KeyMaterial(format!("private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| TokenError::KeyMaterial(format!("public key: {e}")))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            ttl,
            clock,
        })
    }

    /// Load the keypair from PEM files on disk
    pub fn from_files(
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
        ttl: TokenTtl,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let private_path = private_key_path.as_ref();
        let public_path = public_key_path.as_ref();

        let private_pem = std::fs::read(private_path).map_err(|e| {
            TokenError::KeyMaterial(format!("failed to read {}: {e}", private_path.display()))
        })?;
        let public_pem = std::fs::read(public_path).map_err(|e| {
            TokenError::KeyMaterial(format!("failed to read {}: {e}", public_path.display()))
        })?;

        Self::from_pem(&private_pem, &public_pem, ttl, clock)
    }

    fn sign<T: serde::Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature and algorithm; expiry is judged against our own clock
    fn parse<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    fn ensure_unexpired(&self, exp: i64) -> Result<(), TokenError> {
        if self.clock.now().timestamp() >= exp {
            return Err(TokenError::Invalid("token expired".to_string()));
        }
        Ok(())
    }
}

impl TokenProvider for JwtProvider {
    fn issue_access(&self, session_id: Uuid) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = AccessTokenClaims {
            sub: session_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl.access).timestamp(),
        };
        self.sign(&claims)
    }

    fn issue_refresh(&self, user_id: Uuid, session_id: Uuid) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            session_id: session_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl.refresh).timestamp(),
        };
        self.sign(&claims)
    }

    fn verify_access(
        &self,
        token: &str,
        expiry: ExpiryCheck,
    ) -> Result<AccessTokenClaims, TokenError> {
        let claims: AccessTokenClaims = self.parse(token)?;
        if expiry == ExpiryCheck::Enforce {
            self.ensure_unexpired(claims.exp)?;
        }
        Ok(claims)
    }

    fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, TokenError> {
        let claims: RefreshTokenClaims = self.parse(token)?;
        self.ensure_unexpired(claims.exp)?;
        Ok(claims)
    }

    fn ttl(&self) -> TokenTtl {
        self.ttl
    }
}
