use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::error::{AppError, Result};
use crate::types::{now_ms, RequestStatus};

use super::deposits::RequestQuery;
use super::models::{WithdrawalRow, WithdrawalWithUserRow};
use super::users;

pub async fn list_withdrawals(
    pool: &SqlitePool,
    query: &RequestQuery,
) -> Result<(Vec<WithdrawalWithUserRow>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM withdrawals r JOIN users u ON u.id = r.user_id");
    query.push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT r.id, r.user_id, r.amount, r.received_amount, r.bank_name, r.account_number,
               r.account_holder, r.branch, r.status, r.note, r.processed_by, r.processed_at,
               r.created_at, r.updated_at, u.username
        FROM withdrawals r
        JOIN users u ON u.id = r.user_id
        "#,
    );
    query.push_filters(&mut qb);
    qb.push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(query.per_page)
        .push(" OFFSET ")
        .push_bind(query.offset());

    let rows = qb.build_query_as::<WithdrawalWithUserRow>().fetch_all(pool).await?;
    Ok((rows, total))
}

/// Approves or rejects a pending withdrawal. The requested amount sits in
/// the frozen balance: approval pays it out, rejection returns it to
/// available.
pub async fn resolve_withdrawal(
    pool: &SqlitePool,
    id: &str,
    next: RequestStatus,
    note: Option<&str>,
    processed_by: &str,
) -> Result<WithdrawalRow> {
    let mut tx = pool.begin().await?;

    let withdrawal = sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Withdrawal"))?;

    let current: RequestStatus = withdrawal.status.parse()?;
    if current != RequestStatus::Pending {
        return Err(AppError::Conflict(format!("withdrawal already {current}")));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!("cannot move withdrawal to {next}")));
    }

    let refund = next == RequestStatus::Rejected;
    users::release_frozen(&mut tx, &withdrawal.user_id, withdrawal.amount, refund).await?;

    let now = now_ms();
    sqlx::query(
        r#"
        UPDATE withdrawals
        SET status = ?, note = ?, processed_by = ?, processed_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(next.as_str())
    .bind(note)
    .bind(processed_by)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let updated = sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        event = "WITHDRAWAL_RESOLVED",
        withdrawal_id = %updated.id,
        user_id = %updated.user_id,
        amount = updated.amount,
        status = %next,
        "Withdrawal {} {}",
        updated.id,
        next,
    );
    Ok(updated)
}

/// Creates a pending withdrawal and freezes the amount. Fails when the
/// available balance does not cover it.
#[cfg(test)]
pub async fn insert_withdrawal(
    pool: &SqlitePool,
    user_id: &str,
    amount: i64,
    fee: i64,
    bank_name: &str,
    account_number: &str,
    account_holder: &str,
) -> Result<WithdrawalRow> {
    let mut tx = pool.begin().await?;
    let frozen = sqlx::query(
        r#"
        UPDATE users
        SET balance_available = balance_available - ?, balance_frozen = balance_frozen + ?
        WHERE id = ? AND balance_available >= ?
        "#,
    )
    .bind(amount)
    .bind(amount)
    .bind(user_id)
    .bind(amount)
    .execute(&mut *tx)
    .await?;
    if frozen.rows_affected() == 0 {
        return Err(AppError::BadRequest("insufficient available balance".to_string()));
    }

    let id = uuid::Uuid::new_v4().simple().to_string();
    let now = now_ms();
    sqlx::query(
        r#"
        INSERT INTO withdrawals (
            id, user_id, amount, received_amount, bank_name, account_number, account_holder,
            status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(amount)
    .bind((amount - fee).max(0))
    .bind(bank_name)
    .bind(account_number)
    .bind(account_holder)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{get_user, insert_user, new_user};

    async fn funded_user(pool: &SqlitePool, name: &str, balance: i64) -> String {
        let mut u = new_user(name);
        u.balance_available = balance;
        insert_user(pool, &u).await.unwrap().id
    }

    #[tokio::test]
    async fn request_freezes_funds() {
        let pool = test_pool().await;
        let uid = funded_user(&pool, "alice", 100_000).await;
        let w = insert_withdrawal(&pool, &uid, 40_000, 1_000, "VCB", "0011", "ALICE")
            .await
            .unwrap();
        assert_eq!(w.received_amount, 39_000);

        let user = get_user(&pool, &uid).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 60_000);
        assert_eq!(user.balance_frozen, 40_000);

        let err = insert_withdrawal(&pool, &uid, 70_000, 0, "VCB", "0011", "ALICE")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn approval_pays_out_frozen_funds() {
        let pool = test_pool().await;
        let uid = funded_user(&pool, "bob", 100_000).await;
        let w = insert_withdrawal(&pool, &uid, 40_000, 0, "ACB", "22", "BOB").await.unwrap();

        let done = resolve_withdrawal(&pool, &w.id, RequestStatus::Approved, Some("paid"), "admin")
            .await
            .unwrap();
        assert_eq!(done.status, "approved");
        assert_eq!(done.processed_by.as_deref(), Some("admin"));
        assert!(done.processed_at.is_some());

        let user = get_user(&pool, &uid).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 60_000);
        assert_eq!(user.balance_frozen, 0);
    }

    #[tokio::test]
    async fn rejection_returns_funds_and_is_final() {
        let pool = test_pool().await;
        let uid = funded_user(&pool, "carol", 10_000).await;
        let w = insert_withdrawal(&pool, &uid, 10_000, 0, "TCB", "33", "CAROL").await.unwrap();

        resolve_withdrawal(&pool, &w.id, RequestStatus::Rejected, None, "admin")
            .await
            .unwrap();
        let user = get_user(&pool, &uid).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 10_000);
        assert_eq!(user.balance_frozen, 0);

        let again = resolve_withdrawal(&pool, &w.id, RequestStatus::Approved, None, "admin").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn release_needs_the_full_amount_frozen() {
        let pool = test_pool().await;
        let uid = funded_user(&pool, "frank", 50_000).await;
        let w = insert_withdrawal(&pool, &uid, 50_000, 0, "VCB", "44", "FRANK").await.unwrap();
        sqlx::query("UPDATE users SET balance_frozen = 20000 WHERE id = ?")
            .bind(&uid)
            .execute(&pool)
            .await
            .unwrap();

        let err = resolve_withdrawal(&pool, &w.id, RequestStatus::Rejected, None, "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let user = get_user(&pool, &uid).await.unwrap().unwrap();
        assert_eq!(user.balance_available, 0);
        assert_eq!(user.balance_frozen, 20_000);
        let query = RequestQuery {
            page: 1,
            per_page: 10,
            ..RequestQuery::default()
        };
        let (rows, _) = list_withdrawals(&pool, &query).await.unwrap();
        assert_eq!(rows[0].status, "pending");
    }

    #[tokio::test]
    async fn release_for_a_missing_user_is_not_found() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let err = crate::db::users::release_frozen(&mut *conn, "ghost", 1_000, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("User")));
    }

    #[tokio::test]
    async fn listing_searches_by_username() {
        let pool = test_pool().await;
        let a = funded_user(&pool, "dave", 5_000).await;
        let b = funded_user(&pool, "erin", 5_000).await;
        insert_withdrawal(&pool, &a, 1_000, 0, "VCB", "1", "DAVE").await.unwrap();
        insert_withdrawal(&pool, &b, 2_000, 0, "VCB", "2", "ERIN").await.unwrap();

        let (rows, total) = list_withdrawals(
            &pool,
            &RequestQuery {
                search: Some("ERI".to_string()),
                page: 1,
                per_page: 10,
                ..RequestQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].username, "erin");
        assert_eq!(rows[0].amount, 2_000);
    }
}
