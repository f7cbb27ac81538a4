//! Auth cookie reading and Set-Cookie construction.

use crate::models::TokenPair;
use crate::token::TokenTtl;

use axum::http::{header, HeaderMap, HeaderValue};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Find a cookie value by name in the request's Cookie headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Attributes shared by both auth cookies
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Add the `Secure` attribute (everywhere but development)
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// `name=value` with the auth attributes and a lifetime in seconds
    pub fn set(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
            name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Directive telling the client to drop `name`
    pub fn clear(&self, name: &str) -> String {
        self.set(name, "", -1)
    }

    /// Append Set-Cookie headers for a freshly issued pair
    pub fn apply_pair(&self, headers: &mut HeaderMap, tokens: &TokenPair, ttl: TokenTtl) {
        append(
            headers,
            self.set(ACCESS_COOKIE, &tokens.access_token, ttl.access.num_seconds()),
        );
        append(
            headers,
            self.set(REFRESH_COOKIE, &tokens.refresh_token, ttl.refresh.num_seconds()),
        );
    }

    /// Append Set-Cookie headers clearing both auth cookies
    pub fn apply_clear(&self, headers: &mut HeaderMap) {
        append(headers, self.clear(ACCESS_COOKIE));
        append(headers, self.clear(REFRESH_COOKIE));
    }
}

fn append(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Refusing to emit malformed Set-Cookie header"),
    }
}

/// Whether a response already carries a Set-Cookie for either auth cookie
pub fn sets_auth_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value.starts_with(&format!("{ACCESS_COOKIE}="))
                || value.starts_with(&format!("{REFRESH_COOKIE}="))
        })
}
