use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MAX_PAGE_SIZE, REQUESTS_PAGE_SIZE};
use crate::db::deposits::{self as repo, RequestQuery};
use crate::db::models::{DepositRow, DepositWithUserRow};
use crate::db::total_pages;
use crate::error::{AppError, Result};
use crate::types::RequestStatus;

use super::routes::ApiState;

#[derive(Deserialize)]
pub struct DepositsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub status: String,
    pub proof_image: Option<String>,
    pub notes: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_details: Option<UserDetails>,
}

impl From<DepositRow> for DepositResponse {
    fn from(r: DepositRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            amount: r.amount,
            status: r.status,
            proof_image: r.proof_image,
            notes: r.notes,
            created_at: DateTime::from_timestamp_millis(r.created_at),
            updated_at: DateTime::from_timestamp_millis(r.updated_at),
            user_details: None,
        }
    }
}

impl From<DepositWithUserRow> for DepositResponse {
    fn from(r: DepositWithUserRow) -> Self {
        Self {
            user_details: Some(UserDetails {
                id: r.user_id.clone(),
                username: r.username,
                full_name: r.full_name,
                phone: r.phone,
            }),
            id: r.id,
            user_id: r.user_id,
            amount: r.amount,
            status: r.status,
            proof_image: r.proof_image,
            notes: r.notes,
            created_at: DateTime::from_timestamp_millis(r.created_at),
            updated_at: DateTime::from_timestamp_millis(r.updated_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositsResponse {
    pub deposits: Vec<DepositResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

pub async fn list_deposits(
    State(state): State<ApiState>,
    Query(params): Query<DepositsQuery>,
) -> Result<Json<DepositsResponse>> {
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
        search: None,
        page,
        per_page: limit,
    };
    let (rows, total) = repo::list_deposits(&state.pool, &query).await?;

    Ok(Json(DepositsResponse {
        deposits: rows.into_iter().map(DepositResponse::from).collect(),
        total,
        page,
        limit,
        total_pages: total_pages(total, limit),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDepositRequest {
    pub deposit_id: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ResolveDepositResponse {
    pub message: String,
    pub deposit: DepositResponse,
}

pub async fn resolve_deposit(
    State(state): State<ApiState>,
    Json(body): Json<ResolveDepositRequest>,
) -> Result<Json<ResolveDepositResponse>> {
    let (Some(deposit_id), Some(raw_status)) = (body.deposit_id, body.status) else {
        return Err(AppError::BadRequest("depositId and status are required".to_string()));
    };
    let next: RequestStatus = raw_status.parse()?;
    if !matches!(next, RequestStatus::Approved | RequestStatus::Rejected) {
        return Err(AppError::BadRequest(format!(
            "status must be approved or rejected, got {next}"
        )));
    }

    let deposit = repo::resolve_deposit(&state.pool, &deposit_id, next, body.notes.as_deref()).await?;
    Ok(Json(ResolveDepositResponse {
        message: format!("Deposit {next}"),
        deposit: deposit.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_support::*;
    use crate::db::deposits::insert_deposit;
    use crate::db::users::{get_user, insert_user, new_user};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn list_includes_user_details_and_paging() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let user = insert_user(&state.pool, &new_user("alice")).await.unwrap();
        for amount in [100_000, 200_000, 300_000] {
            insert_deposit(&state.pool, &user.id, amount, None).await.unwrap();
        }

        let (status, body) = send(
            &state,
            "GET",
            "/api/admin/deposits?limit=2&status=pending",
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["totalPages"], 2);
        let deposits = body["deposits"].as_array().unwrap();
        assert_eq!(deposits.len(), 2);
        assert_eq!(deposits[0]["userDetails"]["username"], "alice");
        assert_eq!(deposits[0]["userDetails"]["phone"], "0912345678");

        let (status, body) = send(
            &state,
            "GET",
            "/api/admin/deposits?status=approved",
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn huge_page_and_limit_stay_in_range() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let user = insert_user(&state.pool, &new_user("dave")).await.unwrap();
        for amount in [10_000, 20_000] {
            insert_deposit(&state.pool, &user.id, amount, None).await.unwrap();
        }

        let uri = format!("/api/admin/deposits?page={}", i64::MAX);
        let (status, body) = send(&state, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert!(body["deposits"].as_array().unwrap().is_empty());

        let uri = format!("/api/admin/deposits?limit={}", i64::MAX);
        let (status, body) = send(&state, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], MAX_PAGE_SIZE);
        assert_eq!(body["totalPages"], 1);
        assert_eq!(body["deposits"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn approve_credits_balance_once() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let user = insert_user(&state.pool, &new_user("bob")).await.unwrap();
        let deposit = insert_deposit(&state.pool, &user.id, 500_000, Some("/uploads/p.png"))
            .await
            .unwrap();

        let request = json!({ "depositId": deposit.id, "status": "approved", "notes": "ok" });
        let (status, body) = send(
            &state,
            "PUT",
            "/api/admin/deposits",
            Some(&cookie),
            Some(request.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deposit"]["status"], "approved");
        assert_eq!(body["deposit"]["notes"], "ok");

        let (status, _) = send(&state, "PUT", "/api/admin/deposits", Some(&cookie), Some(request)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let user = get_user(&state.pool, &user.id).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 500_000);
    }

    #[tokio::test]
    async fn rejects_unsupported_target_status() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let user = insert_user(&state.pool, &new_user("carol")).await.unwrap();
        let deposit = insert_deposit(&state.pool, &user.id, 1_000, None).await.unwrap();

        for bad in ["pending", "cancelled", "paid"] {
            let (status, _) = send(
                &state,
                "PUT",
                "/api/admin/deposits",
                Some(&cookie),
                Some(json!({ "depositId": deposit.id, "status": bad })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "status {bad}");
        }

        let (status, _) = send(
            &state,
            "PUT",
            "/api/admin/deposits",
            Some(&cookie),
            Some(json!({ "depositId": "nope", "status": "rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
