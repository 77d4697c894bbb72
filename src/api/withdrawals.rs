use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MAX_PAGE_SIZE, REQUESTS_PAGE_SIZE};
use crate::db::deposits::RequestQuery;
use crate::db::models::{WithdrawalRow, WithdrawalWithUserRow};
use crate::db::total_pages;
use crate::db::withdrawals as repo;
use crate::error::{AppError, Result};
use crate::types::RequestStatus;

use super::routes::ApiState;

/// Recorded as `processed_by` on resolved withdrawals.
const PROCESSED_BY: &str = "admin";

#[derive(Deserialize)]
pub struct WithdrawalsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub amount: i64,
    pub received_amount: i64,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub branch: Option<String>,
    pub status: String,
    pub note: Option<String>,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<WithdrawalRow> for WithdrawalResponse {
    fn from(r: WithdrawalRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            username: None,
            amount: r.amount,
            received_amount: r.received_amount,
            bank_name: r.bank_name,
            account_number: r.account_number,
            account_holder: r.account_holder,
            branch: r.branch,
            status: r.status,
            note: r.note,
            processed_by: r.processed_by,
            processed_at: r.processed_at.and_then(DateTime::from_timestamp_millis),
            created_at: DateTime::from_timestamp_millis(r.created_at),
            updated_at: DateTime::from_timestamp_millis(r.updated_at),
        }
    }
}

impl From<WithdrawalWithUserRow> for WithdrawalResponse {
    fn from(r: WithdrawalWithUserRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            username: Some(r.username),
            amount: r.amount,
            received_amount: r.received_amount,
            bank_name: r.bank_name,
            account_number: r.account_number,
            account_holder: r.account_holder,
            branch: r.branch,
            status: r.status,
            note: r.note,
            processed_by: r.processed_by,
            processed_at: r.processed_at.and_then(DateTime::from_timestamp_millis),
            created_at: DateTime::from_timestamp_millis(r.created_at),
            updated_at: DateTime::from_timestamp_millis(r.updated_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<WithdrawalResponse>,
    pub total: i64,
    pub current_page: i64,
    pub total_pages: i64,
}

pub async fn list_withdrawals(
    State(state): State<ApiState>,
    Query(params): Query<WithdrawalsQuery>,
) -> Result<Json<WithdrawalsResponse>> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(REQUESTS_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    let status = match params.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<RequestStatus>()?),
    };

    let query = RequestQuery {
        status,
        search: params.search,
        page,
        per_page: limit,
    };
    let (rows, total) = repo::list_withdrawals(&state.pool, &query).await?;

    Ok(Json(WithdrawalsResponse {
        withdrawals: rows.into_iter().map(WithdrawalResponse::from).collect(),
        total,
        current_page: page,
        total_pages: total_pages(total, limit),
    }))
}

#[derive(Deserialize)]
pub struct ResolveWithdrawalRequest {
    pub status: Option<String>,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct ResolveWithdrawalResponse {
    pub message: String,
    pub withdrawal: WithdrawalResponse,
}

pub async fn resolve_withdrawal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<ResolveWithdrawalRequest>,
) -> Result<Json<ResolveWithdrawalResponse>> {
    let next: RequestStatus = body
        .status
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("status is required".to_string()))?
        .parse()?;
    if !matches!(next, RequestStatus::Approved | RequestStatus::Rejected) {
        return Err(AppError::BadRequest(format!(
            "status must be approved or rejected, got {next}"
        )));
    }

    let withdrawal =
        repo::resolve_withdrawal(&state.pool, &id, next, body.note.as_deref(), PROCESSED_BY).await?;
    Ok(Json(ResolveWithdrawalResponse {
        message: format!("Withdrawal {next}"),
        withdrawal: withdrawal.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_support::*;
    use crate::db::users::{get_user, insert_user, new_user};
    use crate::db::withdrawals::insert_withdrawal;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn funded(state: &ApiState, name: &str, balance: i64) -> String {
        let mut u = new_user(name);
        u.balance_available = balance;
        insert_user(&state.pool, &u).await.unwrap().id
    }

    #[tokio::test]
    async fn list_searches_by_username() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let alice = funded(&state, "alice", 1_000_000).await;
        let bob = funded(&state, "bob", 1_000_000).await;
        insert_withdrawal(&state.pool, &alice, 100_000, 0, "VCB", "0011", "ALICE").await.unwrap();
        insert_withdrawal(&state.pool, &bob, 200_000, 0, "ACB", "0022", "BOB").await.unwrap();

        let (status, body) = send(
            &state,
            "GET",
            "/api/admin/withdrawals?search=ALI",
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["totalPages"], 1);
        assert_eq!(body["withdrawals"][0]["username"], "alice");
        assert_eq!(body["withdrawals"][0]["bankName"], "VCB");
    }

    #[tokio::test]
    async fn huge_page_and_limit_stay_in_range() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let erin = funded(&state, "erin", 1_000_000).await;
        for amount in [100_000, 200_000] {
            insert_withdrawal(&state.pool, &erin, amount, 0, "VCB", "0055", "ERIN").await.unwrap();
        }

        let uri = format!("/api/admin/withdrawals?page={}", i64::MAX);
        let (status, body) = send(&state, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert!(body["withdrawals"].as_array().unwrap().is_empty());

        let uri = format!("/api/admin/withdrawals?limit={}", i64::MAX);
        let (status, body) = send(&state, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPages"], 1);
        assert_eq!(body["withdrawals"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reject_refunds_and_records_processor() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let user_id = funded(&state, "carol", 300_000).await;
        let w = insert_withdrawal(&state.pool, &user_id, 100_000, 0, "VCB", "0033", "CAROL")
            .await
            .unwrap();

        let (status, body) = send(
            &state,
            "PATCH",
            &format!("/api/admin/withdrawals/{}", w.id),
            Some(&cookie),
            Some(json!({ "status": "rejected", "note": "wrong account" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["withdrawal"]["status"], "rejected");
        assert_eq!(body["withdrawal"]["processedBy"], "admin");
        assert_eq!(body["withdrawal"]["note"], "wrong account");
        assert!(body["withdrawal"]["processedAt"].is_string());

        let user = get_user(&state.pool, &user_id).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 300_000);
        assert_eq!(user.balance_frozen, 0);
    }

    #[tokio::test]
    async fn second_resolution_conflicts() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let user_id = funded(&state, "dave", 300_000).await;
        let w = insert_withdrawal(&state.pool, &user_id, 100_000, 0, "VCB", "0044", "DAVE")
            .await
            .unwrap();
        let uri = format!("/api/admin/withdrawals/{}", w.id);

        let (status, _) = send(&state, "PATCH", &uri, Some(&cookie), Some(json!({ "status": "approved" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, "PATCH", &uri, Some(&cookie), Some(json!({ "status": "rejected" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&state, "PATCH", &uri, Some(&cookie), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let user = get_user(&state.pool, &user_id).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 200_000);
        assert_eq!(user.balance_frozen, 0);
    }
}
