//! Admin authentication: a server-side session store keyed by random
//! tokens carried in the `admin-session` cookie.

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ADMIN_COOKIE;
use crate::error::{AppError, Result};

use super::routes::ApiState;

pub struct AdminSessions {
    /// token → expiry
    sessions: DashMap<String, Instant>,
    ttl: Duration,
}

impl AdminSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn issue(&self) -> String {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.sessions.insert(token.clone(), Instant::now() + self.ttl);
        token
    }

    /// True for a known, unexpired token. Expired tokens are dropped.
    pub fn validate(&self, token: &str) -> bool {
        let expired = match self.sessions.get(token) {
            Some(expires) => *expires <= Instant::now(),
            None => return false,
        };
        if expired {
            self.sessions.remove(token);
            return false;
        }
        true
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, expires| *expires > now);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Value of cookie `name` from the request's Cookie headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim())
}

/// True when the Authorization header is `Bearer <secret>`.
pub fn bearer_matches(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Route layer guarding every admin endpoint.
pub async fn require_admin(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let authorized = cookie_value(request.headers(), ADMIN_COOKIE)
        .is_some_and(|token| state.admin_sessions.validate(token));
    if !authorized {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<ApiState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response> {
    let password = body
        .password
        .ok_or_else(|| AppError::BadRequest("password is required".to_string()))?;
    if !constant_time_eq(password.as_bytes(), state.config.admin_password.as_bytes()) {
        warn!("Rejected admin login attempt");
        return Err(AppError::Unauthorized);
    }

    let token = state.admin_sessions.issue();
    let cookie = format!(
        "{ADMIN_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        state.admin_sessions.ttl().as_secs()
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::BadRequest(format!("cookie header: {e}")))?;
    info!("Admin logged in ({} active sessions)", state.admin_sessions.len());

    let mut response = Json(json!({ "message": "Logged in" })).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

pub async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookie_value(&headers, ADMIN_COOKIE) {
        state.admin_sessions.revoke(token);
    }
    let mut response = Json(json!({ "message": "Logged out" })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_static("admin-session=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"),
    );
    response
}
