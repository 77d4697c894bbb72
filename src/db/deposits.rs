use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

use crate::error::{AppError, Result};
use crate::types::{now_ms, RequestStatus};

use super::models::{DepositRow, DepositWithUserRow};
use super::{page_offset, users};

/// Filter shared by the deposit and withdrawal listings.
#[derive(Debug, Clone, Default)]
pub struct RequestQuery {
    pub status: Option<RequestStatus>,
    /// Case-insensitive substring of the owner's username.
    pub search: Option<String>,
    pub page: i64,
    pub per_page: i64,
}

impl RequestQuery {
    /// Appends the WHERE clause. Table `r` is the request, `u` the user.
    pub fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(status) = self.status {
            qb.push(" AND r.status = ").push_bind(status.as_str());
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND lower(u.username) LIKE ")
                .push_bind(super::like_pattern(search))
                .push(" ESCAPE '\\'");
        }
    }

    pub fn offset(&self) -> i64 {
        page_offset(self.page, self.per_page)
    }
}

pub async fn list_deposits(
    pool: &SqlitePool,
    query: &RequestQuery,
) -> Result<(Vec<DepositWithUserRow>, i64)> {
    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM deposits r JOIN users u ON u.id = r.user_id");
    query.push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT r.id, r.user_id, r.amount, r.status, r.proof_image, r.notes,
               r.created_at, r.updated_at, u.username, u.full_name, u.phone
        FROM deposits r
        JOIN users u ON u.id = r.user_id
        "#,
    );
    query.push_filters(&mut qb);
    qb.push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(query.per_page)
        .push(" OFFSET ")
        .push_bind(query.offset());

    let rows = qb.build_query_as::<DepositWithUserRow>().fetch_all(pool).await?;
    Ok((rows, total))
}

#[cfg(test)]
pub async fn get_deposit(pool: &SqlitePool, id: &str) -> Result<Option<DepositRow>> {
    Ok(sqlx::query_as::<_, DepositRow>("SELECT * FROM deposits WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

/// Approves or rejects a pending deposit. Approval credits the owner's
/// available balance in the same transaction.
pub async fn resolve_deposit(
    pool: &SqlitePool,
    id: &str,
    next: RequestStatus,
    notes: Option<&str>,
) -> Result<DepositRow> {
    let mut tx = pool.begin().await?;

    let deposit = sqlx::query_as::<_, DepositRow>("SELECT * FROM deposits WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Deposit"))?;

    let current: RequestStatus = deposit.status.parse()?;
    if current != RequestStatus::Pending {
        return Err(AppError::Conflict(format!("deposit already {current}")));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!("cannot move deposit to {next}")));
    }

    if next == RequestStatus::Approved {
        users::credit_available(&mut tx, &deposit.user_id, deposit.amount).await?;
    }

    sqlx::query("UPDATE deposits SET status = ?, notes = ?, updated_at = ? WHERE id = ?")
        .bind(next.as_str())
        .bind(notes.unwrap_or_default())
        .bind(now_ms())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let updated = sqlx::query_as::<_, DepositRow>("SELECT * FROM deposits WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(
        event = "DEPOSIT_RESOLVED",
        deposit_id = %updated.id,
        user_id = %updated.user_id,
        amount = updated.amount,
        status = %next,
        "Deposit {} {}",
        updated.id,
        next,
    );
    Ok(updated)
}

#[cfg(test)]
pub async fn insert_deposit(
    pool: &SqlitePool,
    user_id: &str,
    amount: i64,
    proof_image: Option<&str>,
) -> Result<DepositRow> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let now = now_ms();
    sqlx::query(
        r#"
        INSERT INTO deposits (id, user_id, amount, status, proof_image, notes, created_at, updated_at)
        VALUES (?, ?, ?, 'pending', ?, '', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(amount)
    .bind(proof_image)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    get_deposit(pool, &id).await?.ok_or(AppError::NotFound("Deposit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{get_user, insert_user, new_user};

    #[tokio::test]
    async fn approval_credits_the_user_once() {
        let pool = test_pool().await;
        let user = insert_user(&pool, &new_user("alice")).await.unwrap();
        let deposit = insert_deposit(&pool, &user.id, 50_000, Some("/uploads/proof.png"))
            .await
            .unwrap();

        let approved = resolve_deposit(&pool, &deposit.id, RequestStatus::Approved, Some("ok"))
            .await
            .unwrap();
        assert_eq!(approved.status, "approved");
        assert_eq!(approved.notes, "ok");
        assert_eq!(get_user(&pool, &user.id).await.unwrap().unwrap().balance_available, 50_000);

        let again = resolve_deposit(&pool, &deposit.id, RequestStatus::Approved, None).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(get_user(&pool, &user.id).await.unwrap().unwrap().balance_available, 50_000);
    }

    #[tokio::test]
    async fn rejection_leaves_balance_alone() {
        let pool = test_pool().await;
        let user = insert_user(&pool, &new_user("bob")).await.unwrap();
        let deposit = insert_deposit(&pool, &user.id, 10_000, None).await.unwrap();

        let rejected = resolve_deposit(&pool, &deposit.id, RequestStatus::Rejected, None)
            .await
            .unwrap();
        assert_eq!(rejected.status, "rejected");
        assert_eq!(rejected.notes, "");
        assert_eq!(get_user(&pool, &user.id).await.unwrap().unwrap().balance_available, 0);
    }

    #[tokio::test]
    async fn cannot_move_to_pending_or_cancelled() {
        let pool = test_pool().await;
        let user = insert_user(&pool, &new_user("carol")).await.unwrap();
        let deposit = insert_deposit(&pool, &user.id, 1, None).await.unwrap();
        let err = resolve_deposit(&pool, &deposit.id, RequestStatus::Cancelled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unknown_deposit_is_not_found() {
        let pool = test_pool().await;
        let err = resolve_deposit(&pool, "missing", RequestStatus::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Deposit")));
    }

    #[tokio::test]
    async fn listing_joins_user_and_filters_status() {
        let pool = test_pool().await;
        let user = insert_user(&pool, &new_user("dave")).await.unwrap();
        let first = insert_deposit(&pool, &user.id, 1_000, None).await.unwrap();
        insert_deposit(&pool, &user.id, 2_000, None).await.unwrap();
        resolve_deposit(&pool, &first.id, RequestStatus::Rejected, None)
            .await
            .unwrap();

        let (rows, total) = list_deposits(
            &pool,
            &RequestQuery {
                status: Some(RequestStatus::Pending),
                search: None,
                page: 1,
                per_page: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].amount, 2_000);
        assert_eq!(rows[0].username, "dave");
        assert_eq!(rows[0].phone.as_deref(), Some("0912345678"));
    }
}
