use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{MAX_WINDOW_COUNT, UPCOMING_SESSION_COUNT};
use crate::error::{AppError, Result};
use crate::sessions::{current_window, generate_windows, next_windows, SessionWindow};
use crate::types::SessionStatus;

use super::auth::bearer_matches;
use super::routes::ApiState;

/// A window plus its classification at response time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub window: SessionWindow,
    pub status: SessionStatus,
    pub progress: f64,
    /// Milliseconds until the window closes, 0 once it has.
    pub remaining_ms: i64,
}

impl SessionView {
    pub fn at(window: SessionWindow, now: DateTime<Utc>) -> Self {
        let c = window.classify(now);
        let remaining_ms = (window.end_time - now).num_milliseconds().max(0);
        Self {
            window,
            status: c.status,
            progress: c.progress,
            remaining_ms,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub current_session: SessionView,
    pub next_sessions: Vec<SessionView>,
    pub server_time: DateTime<Utc>,
}

pub async fn get_sessions(State(state): State<ApiState>) -> Result<Json<SessionsResponse>> {
    let server_time = Utc::now();
    let local_now = server_time.with_timezone(&state.config.utc_offset);

    let current_session = SessionView::at(current_window(&local_now)?, server_time);
    let next_sessions = next_windows(&local_now, UPCOMING_SESSION_COUNT)?
        .into_iter()
        .map(|w| SessionView::at(w, server_time))
        .collect();

    Ok(Json(SessionsResponse {
        current_session,
        next_sessions,
        server_time,
    }))
}

#[derive(Deserialize)]
pub struct WindowsQuery {
    /// RFC 3339 instant; defaults to now.
    pub anchor: Option<String>,
    pub count: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsResponse {
    pub anchor: DateTime<Utc>,
    pub windows: Vec<SessionView>,
    pub server_time: DateTime<Utc>,
}

pub async fn get_windows(
    State(state): State<ApiState>,
    Query(params): Query<WindowsQuery>,
) -> Result<Json<WindowsResponse>> {
    let server_time = Utc::now();
    let anchor = match params.anchor.as_deref() {
        Some(raw) => parse_instant(raw)?,
        None => server_time,
    };
    let count = params.count.unwrap_or(1);
    if count > MAX_WINDOW_COUNT {
        return Err(AppError::InvalidArgument(format!(
            "window count must be at most {MAX_WINDOW_COUNT}, got {count}"
        )));
    }

    let windows = generate_windows(&anchor.with_timezone(&state.config.utc_offset), count)?
        .into_iter()
        .map(|w| SessionView::at(w, server_time))
        .collect();

    Ok(Json(WindowsResponse {
        anchor,
        windows,
        server_time,
    }))
}

/// Sessions are generated from the clock; the endpoint only acknowledges.
pub async fn post_sessions(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    if !bearer_matches(&headers, &state.config.admin_secret) {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(json!({
        "success": true,
        "message": "Sessions are now managed automatically. No manual updates needed."
    })))
}

pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidTimestamp(format!("'{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn sessions_lists_current_and_thirty_upcoming() {
        let state = test_state().await;
        let (status, body) = send(&state, "GET", "/api/sessions", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let next = body["nextSessions"].as_array().unwrap();
        assert_eq!(next.len(), 30);
        assert!(next.iter().all(|s| s["status"] == "upcoming" && s["progress"] == 0.0));
        assert!(body["currentSession"]["startTime"].is_string());
        assert!(body["currentSession"]["label"].as_str().unwrap().len() == 5);
        assert!(body["serverTime"].is_string());
    }

    #[tokio::test]
    async fn windows_endpoint_follows_the_generator() {
        let state = test_state().await;
        let (status, body) = send(
            &state,
            "GET",
            "/api/sessions/windows?anchor=2025-06-29T09:00:00.000Z&count=2",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let windows = body["windows"].as_array().unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0]["startTime"], "2025-06-29T09:00:01Z");
        assert_eq!(windows[0]["endTime"], "2025-06-29T09:00:59.999Z");
        assert_eq!(windows[1]["startTime"], "2025-06-29T09:01:01Z");
        assert_eq!(windows[0]["label"], "16:00");
        assert_eq!(windows[0]["status"], "completed");
    }

    #[tokio::test]
    async fn zero_count_is_empty_and_negative_is_rejected() {
        let state = test_state().await;
        let (status, body) = send(&state, "GET", "/api/sessions/windows?count=0", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["windows"].as_array().unwrap().is_empty());

        let (status, body) = send(&state, "GET", "/api/sessions/windows?count=-1", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid argument"));
    }

    #[tokio::test]
    async fn unparseable_anchor_is_invalid_timestamp() {
        let state = test_state().await;
        let (status, body) = send(
            &state,
            "GET",
            "/api/sessions/windows?anchor=yesterday",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid timestamp"));
    }

    #[tokio::test]
    async fn post_requires_the_bearer_secret() {
        let state = test_state().await;
        let (status, _) = send(&state, "POST", "/api/sessions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn view_reports_remaining_time() {
        let anchor = parse_instant("2025-06-29T09:00:00Z").unwrap();
        let w = generate_windows(&anchor, 1).unwrap().remove(0);
        let view = SessionView::at(w, parse_instant("2025-06-29T09:00:30Z").unwrap());
        assert_eq!(view.status, SessionStatus::Active);
        assert_eq!(view.remaining_ms, 29_999);

        let late = SessionView::at(view.window.clone(), parse_instant("2025-06-29T09:05:00Z").unwrap());
        assert_eq!(late.remaining_ms, 0);
    }
}
