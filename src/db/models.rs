/// Database row types matching migrations/0001_init.sql.
/// Timestamps are epoch milliseconds, money is integer đồng.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub balance_available: i64,
    pub balance_frozen: i64,
    pub active: bool,
    pub bet_locked: bool,
    pub withdraw_locked: bool,
    pub verified: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_login: Option<i64>,
}

/// Column list for `UserRow`; never includes the password hash.
pub const USER_COLUMNS: &str = "id, username, full_name, email, phone, role, \
    balance_available, balance_frozen, active, bet_locked, withdraw_locked, verified, \
    created_at, updated_at, last_login";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub session_id: String,
    pub amount: i64,
    pub direction: String,
    pub status: String,
    pub payout: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DepositRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub status: String,
    pub proof_image: Option<String>,
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Deposit joined with the owning user's public fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DepositWithUserRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub status: String,
    pub proof_image: Option<String>,
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawalRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub received_amount: i64,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub branch: Option<String>,
    pub status: String,
    pub note: Option<String>,
    pub processed_by: Option<String>,
    pub processed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Withdrawal joined with the owning user's username.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawalWithUserRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub received_amount: i64,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub branch: Option<String>,
    pub status: String,
    pub note: Option<String>,
    pub processed_by: Option<String>,
    pub processed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub username: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub result: Option<String>,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub user_id: Option<String>,
    pub url: String,
    pub status: String,
    pub created_at: i64,
}
