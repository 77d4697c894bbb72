use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;

use super::models::BetRow;
use super::{like_pattern, page_offset};

/// Filter for the order (bet) history.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Case-insensitive substring of the bettor's username.
    pub username: Option<String>,
    /// Inclusive creation-time range.
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub page: i64,
    pub per_page: i64,
}

impl OrderQuery {
    fn push_filters<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(username) = self.username.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND lower(username) LIKE ")
                .push_bind(like_pattern(username))
                .push(" ESCAPE '\\'");
        }
        if let Some((from, to)) = self.created_between {
            qb.push(" AND created_at >= ")
                .push_bind(from.timestamp_millis())
                .push(" AND created_at <= ")
                .push_bind(to.timestamp_millis());
        }
    }
}

/// One page of orders, newest first, plus the total matching count.
pub async fn list_orders(pool: &SqlitePool, query: &OrderQuery) -> Result<(Vec<BetRow>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM bets");
    query.push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, user_id, username, session_id, amount, direction, status, payout, created_at, updated_at FROM bets",
    );
    query.push_filters(&mut qb);
    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(query.per_page)
        .push(" OFFSET ")
        .push_bind(page_offset(query.page, query.per_page));

    let rows = qb.build_query_as::<BetRow>().fetch_all(pool).await?;
    Ok((rows, total))
}

#[cfg(test)]
pub async fn insert_bet(pool: &SqlitePool, username: &str, amount: i64, created_at: i64) -> BetRow {
    let id = uuid::Uuid::new_v4().simple().to_string();
    sqlx::query(
        r#"
        INSERT INTO bets (id, user_id, username, session_id, amount, direction, status, payout, created_at, updated_at)
        VALUES (?, ?, ?, '202506290900', ?, 'up', 'completed', 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(format!("uid-{username}"))
    .bind(username)
    .bind(amount)
    .bind(created_at)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
    sqlx::query_as::<_, BetRow>("SELECT * FROM bets WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
        .unwrap()
}
