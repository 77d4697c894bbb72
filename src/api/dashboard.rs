//! Read-only feeds for the admin dashboard landing page.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RECENT_LIMIT;
use crate::db::models::SessionRow;
use crate::db::{sessions as session_repo, users as user_repo};
use crate::error::Result;
use crate::sessions::classify_span;
use crate::types::{from_ms, Outcome, SessionStatus};

use super::routes::ApiState;
use super::users::UserResponse;

#[derive(Serialize)]
pub struct RecentUsersResponse {
    pub users: Vec<UserResponse>,
}

pub async fn recent_users(State(state): State<ApiState>) -> Result<Json<RecentUsersResponse>> {
    let rows = user_repo::recent_users(&state.pool, RECENT_LIMIT).await?;
    Ok(Json(RecentUsersResponse {
        users: rows.into_iter().map(UserResponse::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub result: Option<Outcome>,
    pub result_label: Option<&'static str>,
    pub status: SessionStatus,
    pub progress: f64,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl RecentSession {
    fn from_row(row: SessionRow, now: DateTime<Utc>) -> Result<Self> {
        let start_time = from_ms(row.start_time)?;
        let end_time = from_ms(row.end_time)?;
        let result = row.result.as_deref().map(str::parse::<Outcome>).transpose()?;
        let c = classify_span(start_time, end_time, now);
        Ok(Self {
            id: row.id,
            start_time,
            end_time,
            result,
            result_label: result.map(Outcome::label),
            status: c.status,
            progress: c.progress,
            recorded_at: DateTime::from_timestamp_millis(row.recorded_at),
        })
    }
}

#[derive(Serialize)]
pub struct RecentSessionsResponse {
    pub sessions: Vec<RecentSession>,
}

pub async fn recent_sessions(State(state): State<ApiState>) -> Result<Json<RecentSessionsResponse>> {
    let now = Utc::now();
    let sessions = session_repo::recent_sessions(&state.pool, RECENT_LIMIT)
        .await?
        .into_iter()
        .map(|row| RecentSession::from_row(row, now))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(RecentSessionsResponse { sessions }))
}
