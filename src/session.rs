//! Identity-provider boundary.
//!
//! The auth site issues an HS256 session token shared across subdomains as a
//! cookie. This module only verifies that token and reads `{ id, email }` from
//! it; issuing and refreshing sessions belong to the identity provider.

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::normalize_email;

/// Cookie names the identity provider writes, newest first.
pub const SESSION_COOKIES: [&str; 2] = ["sb-access-token", "sb:token"];

/// The signed-in caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

/// Custom claims carried next to the standard `sub`/`exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: Option<String>,
}

pub struct SessionVerifier {
    key: Option<HS256Key>,
}

impl SessionVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| HS256Key::from_bytes(s.as_bytes())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Verify a raw session token. Invalid, expired, or email-less tokens yield `None`.
    pub fn verify(&self, token: &str) -> Option<SessionUser> {
        let key = self.key.as_ref()?;
        let claims = match key.verify_token::<SessionClaims>(token, None) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                return None;
            }
        };
        let id = claims.subject.filter(|s| !s.is_empty())?;
        let email = normalize_email(claims.custom.email.as_deref()?).ok()?;
        Some(SessionUser { id, email })
    }

    /// Resolve the caller from request headers (session cookie or bearer token).
    pub fn current_user(&self, headers: &HeaderMap) -> Option<SessionUser> {
        let token = extract_session_token(headers)?;
        self.verify(&token)
    }
}

/// Find the session token: identity cookies first, then `Authorization: Bearer`.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    for name in SESSION_COOKIES {
        if let Some(cookie) = jar.get(name)
            && let Some(token) = unwrap_cookie_token(cookie.value())
        {
            return Some(token);
        }
    }

    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Cookie values are either the bare JWT or a JSON object holding `access_token`.
fn unwrap_cookie_token(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with('{') {
        let parsed: serde_json::Value = serde_json::from_str(value).ok()?;
        return parsed
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(String::from);
    }
    Some(value.to_string())
}

/// Login page URL that returns the browser to `next` afterwards.
pub fn login_redirect_url(login_url: &str, next: &str) -> String {
    format!("{}?next={}", login_url, urlencoding::encode(next))
}
