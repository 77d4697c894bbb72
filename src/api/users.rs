use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::USERS_DEFAULT_LIMIT;
use crate::db::models::UserRow;
use crate::db::users::{self as repo, UserQuery, UserUpdate};
use crate::error::{AppError, Result};

use super::routes::ApiState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Balance {
    pub available: i64,
    pub frozen: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFlags {
    pub active: bool,
    pub bet_locked: bool,
    pub withdraw_locked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub balance: Balance,
    pub status: StatusFlags,
    pub verified: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserResponse {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone,
            role: r.role,
            balance: Balance {
                available: r.balance_available,
                frozen: r.balance_frozen,
            },
            status: StatusFlags {
                active: r.active,
                bet_locked: r.bet_locked,
                withdraw_locked: r.withdraw_locked,
            },
            verified: r.verified,
            created_at: DateTime::from_timestamp_millis(r.created_at),
            updated_at: DateTime::from_timestamp_millis(r.updated_at),
            last_login: r.last_login.and_then(DateTime::from_timestamp_millis),
        }
    }
}

#[derive(Serialize)]
pub struct UserActionResponse {
    pub message: &'static str,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Query and body types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UsersQuery {
    pub search: Option<String>,
    /// `all` (default), `active` or `inactive`.
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub user_id: Option<String>,
    pub active: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub active: Option<bool>,
    pub bet_locked: Option<bool>,
    pub withdraw_locked: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<StatusPatch>,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<bool>> {
    match raw.unwrap_or("all") {
        "all" => Ok(None),
        "active" => Ok(Some(true)),
        "inactive" => Ok(Some(false)),
        other => Err(AppError::BadRequest(format!("unknown status filter '{other}'"))),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn list_users(
    State(state): State<ApiState>,
    Query(params): Query<UsersQuery>,
) -> Result<Json<Vec<UserResponse>>> {
    let query = UserQuery {
        search: params.search,
        active: parse_status_filter(params.status.as_deref())?,
        limit: params.limit.unwrap_or(USERS_DEFAULT_LIMIT),
    };
    let users = repo::list_users(&state.pool, &query).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn set_user_active(
    State(state): State<ApiState>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<UserActionResponse>> {
    let (Some(user_id), Some(active)) = (body.user_id, body.active) else {
        return Err(AppError::BadRequest("userId and active are required".to_string()));
    };

    let user = repo::set_active(&state.pool, &user_id, active)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %user.id, active, "User status updated");

    Ok(Json(UserActionResponse {
        message: "User status updated",
        user: user.into(),
    }))
}

pub async fn update_user(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let status = body.status.unwrap_or_default();
    let update = UserUpdate {
        full_name: body.full_name,
        email: body.email,
        phone: body.phone,
        active: status.active,
        bet_locked: status.bet_locked,
        withdraw_locked: status.withdraw_locked,
    };

    let user = repo::update_user(&state.pool, &user_id, &update)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %user.id, "User updated");
    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserActionResponse>> {
    let user = repo::delete_user(&state.pool, &user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %user.id, username = %user.username, "User deleted");

    Ok(Json(UserActionResponse {
        message: "User deleted",
        user: user.into(),
    }))
}
