use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::types::now_ms;

use super::like_pattern;
use super::models::{UserRow, USER_COLUMNS};

/// Filter for the user listing.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive substring of username or full name.
    pub search: Option<String>,
    /// `None` lists everyone.
    pub active: Option<bool>,
    pub limit: i64,
}

/// Partial update applied by `PUT /api/admin/users/:id`.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
    pub bet_locked: Option<bool>,
    pub withdraw_locked: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub balance_available: i64,
    pub active: bool,
    pub bet_locked: bool,
    pub withdraw_locked: bool,
    pub verified: bool,
}

pub async fn list_users(pool: &SqlitePool, query: &UserQuery) -> Result<Vec<UserRow>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (lower(username) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR lower(coalesce(full_name, '')) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(active) = query.active {
        qb.push(" AND active = ").push_bind(active);
    }
    qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(query.limit.max(0));

    Ok(qb.build_query_as::<UserRow>().fetch_all(pool).await?)
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?)
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>> {
    Ok(
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn recent_users(pool: &SqlitePool, limit: i64) -> Result<Vec<UserRow>> {
    Ok(sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<UserRow> {
    let id = Uuid::new_v4().simple().to_string();
    let now = now_ms();

    sqlx::query(
        r#"
        INSERT INTO users (
            id, username, full_name, email, phone,
            balance_available, active, bet_locked, withdraw_locked, verified,
            created_at, updated_at, last_login
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(user.balance_available)
    .bind(user.active)
    .bind(user.bet_locked)
    .bind(user.withdraw_locked)
    .bind(user.verified)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_user(pool, &id).await?.ok_or(AppError::NotFound("User"))
}

/// Returns `None` when no user has that id.
pub async fn set_active(pool: &SqlitePool, id: &str, active: bool) -> Result<Option<UserRow>> {
    let result = sqlx::query("UPDATE users SET active = ?, updated_at = ? WHERE id = ?")
        .bind(active)
        .bind(now_ms())
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_user(pool, id).await
}

/// Applies only the fields that are set; `updated_at` always moves.
pub async fn update_user(pool: &SqlitePool, id: &str, update: &UserUpdate) -> Result<Option<UserRow>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
    qb.push_bind(now_ms());

    if let Some(full_name) = &update.full_name {
        qb.push(", full_name = ").push_bind(full_name.clone());
    }
    if let Some(email) = &update.email {
        qb.push(", email = ").push_bind(email.clone());
    }
    if let Some(phone) = &update.phone {
        qb.push(", phone = ").push_bind(phone.clone());
    }
    if let Some(active) = update.active {
        qb.push(", active = ").push_bind(active);
    }
    if let Some(bet_locked) = update.bet_locked {
        qb.push(", bet_locked = ").push_bind(bet_locked);
    }
    if let Some(withdraw_locked) = update.withdraw_locked {
        qb.push(", withdraw_locked = ").push_bind(withdraw_locked);
    }
    qb.push(" WHERE id = ").push_bind(id.to_string());

    let result = qb.build().execute(pool).await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_user(pool, id).await
}

/// Deletes and returns the user, `None` when absent.
pub async fn delete_user(pool: &SqlitePool, id: &str) -> Result<Option<UserRow>> {
    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if user.is_some() {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(user)
}

/// Plain increment of the available balance (deposit approval).
pub async fn credit_available(conn: &mut SqliteConnection, id: &str, amount: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET balance_available = balance_available + ?, updated_at = ? WHERE id = ?",
    )
    .bind(amount)
    .bind(now_ms())
    .bind(id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User"));
    }
    Ok(())
}

/// Moves `amount` out of the frozen balance; when `refund` is set it goes
/// back to available, otherwise it leaves the platform (withdrawal paid).
/// Fails with `Conflict` when less than `amount` is frozen.
pub async fn release_frozen(
    conn: &mut SqliteConnection,
    id: &str,
    amount: i64,
    refund: bool,
) -> Result<()> {
    let refund_amount = if refund { amount } else { 0 };
    let result = sqlx::query(
        r#"
        UPDATE users SET
            balance_frozen = balance_frozen - ?,
            balance_available = balance_available + ?,
            updated_at = ?
        WHERE id = ? AND balance_frozen >= ?
        "#,
    )
    .bind(amount)
    .bind(refund_amount)
    .bind(now_ms())
    .bind(id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match exists {
        Some(_) => Err(AppError::Conflict(format!(
            "frozen balance is below {amount}"
        ))),
        None => Err(AppError::NotFound("User")),
    }
}

#[cfg(test)]
pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        full_name: Some(format!("Người dùng {username}")),
        email: Some(format!("{username}@example.com")),
        phone: Some("0912345678".to_string()),
        active: true,
        ..NewUser::default()
    }
}
