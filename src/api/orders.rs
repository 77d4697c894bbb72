use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ORDERS_PAGE_SIZE;
use crate::db::models::BetRow;
use crate::db::orders::{self as repo, OrderQuery};
use crate::db::total_pages;
use crate::error::{AppError, Result};

use super::routes::ApiState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQuery {
    pub username: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub user: String,
    pub session: String,
    pub amount: i64,
    pub direction: String,
    pub status: String,
    pub payout: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<BetRow> for OrderResponse {
    fn from(r: BetRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            user: r.username,
            session: r.session_id,
            amount: r.amount,
            direction: r.direction,
            status: r.status,
            payout: r.payout,
            created_at: DateTime::from_timestamp_millis(r.created_at),
            updated_at: DateTime::from_timestamp_millis(r.updated_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersResponse {
    pub orders: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

pub async fn list_orders(
    State(state): State<ApiState>,
    Query(params): Query<OrdersQuery>,
) -> Result<Json<OrdersResponse>> {
    let page = params.page.unwrap_or(1).max(1);
    let offset = state.config.utc_offset;

    // The range only applies when both ends are given.
    let created_between = match (params.start_date.as_deref(), params.end_date.as_deref()) {
        (Some(start), Some(end)) => Some((day_start(start, offset)?, day_end(end, offset)?)),
        _ => None,
    };

    let query = OrderQuery {
        username: params.username,
        created_between,
        page,
        per_page: ORDERS_PAGE_SIZE,
    };
    let (rows, total) = repo::list_orders(&state.pool, &query).await?;

    Ok(Json(OrdersResponse {
        orders: rows.into_iter().map(OrderResponse::from).collect(),
        total,
        page,
        total_pages: total_pages(total, ORDERS_PAGE_SIZE),
    }))
}

/// Accepts `YYYY-MM-DD` (midnight in the display zone) or RFC 3339.
fn day_start(raw: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return local_instant(date, NaiveTime::MIN, offset);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidTimestamp(format!("startDate '{raw}': {e}")))
}

/// The last millisecond of the given day, so the end date is inclusive.
fn day_end(raw: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let (date, zone) = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => (date, offset),
        Err(_) => {
            let t = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| AppError::InvalidTimestamp(format!("endDate '{raw}': {e}")))?;
            (t.date_naive(), *t.offset())
        }
    };
    let last_ms = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| AppError::InvalidTimestamp("end of day".to_string()))?;
    local_instant(date, last_ms, zone)
}

fn local_instant(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Result<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| AppError::InvalidTimestamp(format!("{date} {time}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::test_support::*;
    use crate::db::orders::insert_bet;
    use axum::http::StatusCode;

    fn vn() -> FixedOffset {
        FixedOffset::east_opt(7 * 3_600).unwrap()
    }

    #[test]
    fn plain_dates_cover_the_whole_local_day() {
        let start = day_start("2025-06-29", vn()).unwrap();
        let end = day_end("2025-06-29", vn()).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-06-28T17:00:00+00:00");
        assert_eq!((end - start).num_milliseconds(), 86_399_999);
    }

    #[test]
    fn rfc3339_end_date_extends_to_end_of_its_day() {
        let end = day_end("2025-06-29T08:00:00+07:00", vn()).unwrap();
        assert_eq!(end, day_end("2025-06-29", vn()).unwrap());
    }

    #[test]
    fn garbage_dates_are_invalid_timestamps() {
        assert!(matches!(day_start("29/06/2025", vn()), Err(AppError::InvalidTimestamp(_))));
        assert!(matches!(day_end("soon", vn()), Err(AppError::InvalidTimestamp(_))));
    }

    #[tokio::test]
    async fn paginates_ten_per_page() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let base = day_start("2025-06-29", vn()).unwrap().timestamp_millis();
        for i in 0..12 {
            insert_bet(&state.pool, "alice", 1_000 + i, base + i * 1_000).await;
        }

        let (status, body) = send(&state, "GET", "/api/admin/orders?page=2", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 12);
        assert_eq!(body["page"], 2);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["orders"].as_array().unwrap().len(), 2);
        assert_eq!(body["orders"][0]["user"], "alice");
    }

    #[tokio::test]
    async fn huge_page_returns_an_empty_page() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        insert_bet(&state.pool, "alice", 1_000, 0).await;

        let uri = format!("/api/admin/orders?page={}", i64::MAX);
        let (status, body) = send(&state, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert!(body["orders"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn date_range_includes_the_whole_end_day() {
        let state = test_state().await;
        let cookie = admin_cookie(&state);
        let late_evening = day_end("2025-06-29", vn()).unwrap().timestamp_millis() - 60_000;
        insert_bet(&state.pool, "bob", 5, late_evening).await;
        insert_bet(&state.pool, "bob", 6, late_evening + 120_000).await;

        let (status, body) = send(
            &state,
            "GET",
            "/api/admin/orders?startDate=2025-06-29&endDate=2025-06-29",
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["orders"][0]["amount"], 5);

        let (status, _) = send(
            &state,
            "GET",
            "/api/admin/orders?startDate=nope&endDate=2025-06-29",
            Some(&cookie),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
