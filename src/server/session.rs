//! Request-scoped authentication and one-shot notices, both carried in cookies.

use super::AppState;
use crate::app::Notice;
use axum::async_trait;
use constant_time_eq::constant_time_eq;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

pub const SESSION_COOKIE: &str = "inventory_session";
pub const NOTICE_COOKIE: &str = "inventory_notice";

const CLEAR_SESSION: &str = "inventory_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";
const CLEAR_NOTICE: &str = "inventory_notice=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

/// The shared staff password plus the sessions it has opened.
///
/// Each login gets its own token, kept server-side until logout or expiry.
/// Sessions do not survive a restart.
pub struct AuthSettings {
    password: String,
    secret_key: String,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Instant>>,
    issued: AtomicU64,
}

impl AuthSettings {
    pub fn new(password: &str, secret_key: &str, ttl: Duration) -> Self {
        Self {
            password: password.to_string(),
            secret_key: secret_key.to_string(),
            ttl,
            sessions: Mutex::new(HashMap::new()),
            issued: AtomicU64::new(0),
        }
    }

    pub fn check_password(&self, candidate: &str) -> bool {
        constant_time_eq(self.password.as_bytes(), candidate.as_bytes())
    }

    /// Open a session and return its token
    pub fn start_session(&self) -> String {
        let serial = self.issued.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(b"inventory-session:");
        hasher.update(self.secret_key.as_bytes());
        hasher.update(serial.to_be_bytes());
        hasher.update(nanos.to_be_bytes());
        let token = hex::encode(hasher.finalize());

        let now = Instant::now();
        let mut sessions = self.sessions();
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + self.ttl);
        token
    }

    pub fn end_session(&self, token: &str) {
        self.sessions().remove(token);
    }

    fn accepts(&self, token: &str) -> bool {
        let now = Instant::now();
        self.sessions().iter().any(|(known, expires)| {
            constant_time_eq(known.as_bytes(), token.as_bytes()) && *expires > now
        })
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        // The map stays consistent even if a holder panicked
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Who is making this request. Built per request; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    authenticated: bool,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
        }
    }

    pub fn staff() -> Self {
        Self {
            authenticated: true,
        }
    }

    pub fn from_headers(headers: &HeaderMap, auth: &AuthSettings) -> Self {
        match cookie_value(headers, SESSION_COOKIE) {
            Some(token) if auth.accepts(&token) => Self::staff(),
            _ => Self::anonymous(),
        }
    }

    /// Single shared gate: any authenticated staff member may use every page
    pub fn can_access(&self) -> bool {
        self.authenticated
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(AuthContext::from_headers(&parts.headers, &state.auth))
    }
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Read the pending notice, if any
pub fn pending_notice(headers: &HeaderMap) -> Option<Notice> {
    let encoded = cookie_value(headers, NOTICE_COOKIE)?;
    let bytes = hex::decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Attach `notice` so the next page shows it once
pub fn with_notice(mut response: Response, notice: &Notice) -> Response {
    let encoded = match serde_json::to_vec(notice) {
        Ok(bytes) => hex::encode(bytes),
        Err(e) => {
            warn!("Failed to encode notice: {}", e);
            return response;
        }
    };
    let cookie = format!("{NOTICE_COOKIE}={encoded}; Path=/; HttpOnly; SameSite=Lax");
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!("Failed to set notice cookie: {}", e),
    }
    response
}

/// Consume the pending notice so it is shown only once
pub fn clear_notice(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(SET_COOKIE, HeaderValue::from_static(CLEAR_NOTICE));
    response
}

/// Open a session and set its cookie on `response`
pub fn with_session(mut response: Response, auth: &AuthSettings) -> Response {
    let token = auth.start_session();
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!("Failed to set session cookie: {}", e),
    }
    response
}

/// Close the session named by the request cookie and clear it on the client
pub fn end_session(mut response: Response, headers: &HeaderMap, auth: &AuthSettings) -> Response {
    if let Some(token) = cookie_value(headers, SESSION_COOKIE) {
        auth.end_session(&token);
    }
    response
        .headers_mut()
        .append(SET_COOKIE, HeaderValue::from_static(CLEAR_SESSION));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn settings() -> AuthSettings {
        AuthSettings::new("letmein", "secret", Duration::from_secs(3600))
    }

    fn cookie_for(token: &str) -> HeaderMap {
        headers_with_cookie(&format!("theme=dark; {SESSION_COOKIE}={token}"))
    }

    #[test]
    fn each_login_gets_its_own_session() {
        let auth = settings();
        let first = auth.start_session();
        let second = auth.start_session();

        assert_ne!(first, second);
        assert!(AuthContext::from_headers(&cookie_for(&first), &auth).can_access());
        assert!(AuthContext::from_headers(&cookie_for(&second), &auth).can_access());
    }

    #[test]
    fn ended_or_foreign_session_is_anonymous() {
        let auth = settings();
        let other = settings();
        let token = auth.start_session();
        let foreign = other.start_session();

        assert!(!AuthContext::from_headers(&cookie_for(&foreign), &auth).can_access());
        assert!(!AuthContext::from_headers(&HeaderMap::new(), &auth).can_access());

        auth.end_session(&token);
        assert!(!AuthContext::from_headers(&cookie_for(&token), &auth).can_access());
    }

    #[test]
    fn expired_session_is_anonymous() {
        let auth = AuthSettings::new("letmein", "secret", Duration::ZERO);
        let token = auth.start_session();
        assert!(!AuthContext::from_headers(&cookie_for(&token), &auth).can_access());
    }

    #[test]
    fn password_check_is_exact() {
        let auth = settings();
        assert!(auth.check_password("letmein"));
        assert!(!auth.check_password("letmein "));
        assert!(!auth.check_password(""));
    }

    #[test]
    fn notice_survives_cookie_round_trip() {
        let notice = Notice::failure("Item 4 could not be updated; try again");
        let response = with_notice(().into_response(), &notice);
        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap();

        assert_eq!(pending_notice(&headers_with_cookie(pair)), Some(notice));
    }
}
