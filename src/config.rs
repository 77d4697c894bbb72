use chrono::FixedOffset;

use crate::error::{AppError, Result};

/// Number of upcoming sessions listed by `GET /api/sessions`.
pub const UPCOMING_SESSION_COUNT: i64 = 30;

/// Upper bound for `count` on `GET /api/sessions/windows`.
pub const MAX_WINDOW_COUNT: i64 = 1_440;

/// Fixed page size of the order history.
pub const ORDERS_PAGE_SIZE: i64 = 10;

/// Default page size for deposit and withdrawal listings.
pub const REQUESTS_PAGE_SIZE: i64 = 10;

/// Largest `limit` accepted by the deposit and withdrawal listings.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default `limit` of the user listing.
pub const USERS_DEFAULT_LIMIT: i64 = 100;

/// Rows returned by the dashboard "recent" endpoints.
pub const RECENT_LIMIT: i64 = 10;

/// Mock users inserted into an empty database when seeding is on.
pub const MOCK_USER_COUNT: usize = 10;

/// Largest accepted identity-document upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Channel capacity between the session recorder and the DB writer.
pub const CHANNEL_CAPACITY: usize = 256;

/// Cadence of the session stream and the TUI countdown.
pub const STREAM_INTERVAL_MS: u64 = 1_000;

/// Name of the cookie carrying the admin session token.
pub const ADMIN_COOKIE: &str = "admin-session";

/// Vietnam time, the platform's display zone.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 7 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Password accepted by `POST /api/admin/login` (ADMIN_PASSWORD)
    pub admin_password: String,
    /// Bearer secret for `POST /api/sessions` (ADMIN_SECRET)
    pub admin_secret: String,
    /// Lifetime of an admin session token (ADMIN_SESSION_TTL_SECS)
    pub admin_session_ttl_secs: u64,
    /// Directory uploaded documents are written to (UPLOAD_DIR)
    pub upload_dir: String,
    /// Offset used for session labels and ids (UTC_OFFSET_MINUTES)
    pub utc_offset: FixedOffset,
    /// Insert mock users into an empty database on startup (SEED_MOCK_USERS)
    pub seed_mock_users: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let offset_minutes = std::env::var("UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| DEFAULT_UTC_OFFSET_MINUTES.to_string())
            .parse::<i32>()
            .map_err(|_| AppError::Config("UTC_OFFSET_MINUTES must be an integer".to_string()))?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "desk.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            admin_password: std::env::var("ADMIN_PASSWORD")
                .map_err(|_| AppError::Config("ADMIN_PASSWORD must be set".to_string()))?,
            admin_secret: std::env::var("ADMIN_SECRET")
                .map_err(|_| AppError::Config("ADMIN_SECRET must be set".to_string()))?,
            admin_session_ttl_secs: std::env::var("ADMIN_SESSION_TTL_SECS")
                .unwrap_or_else(|_| "28800".to_string())
                .parse::<u64>()
                .unwrap_or(28_800),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "public/uploads".to_string()),
            utc_offset: offset_from_minutes(offset_minutes)?,
            seed_mock_users: std::env::var("SEED_MOCK_USERS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| AppError::Config(format!("UTC offset out of range: {minutes} minutes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_offset_is_plus_seven() {
        let offset = offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap();
        assert_eq!(offset.local_minus_utc(), 7 * 3_600);
    }

    #[test]
    fn out_of_range_offset_is_config_error() {
        assert!(matches!(offset_from_minutes(48 * 60), Err(AppError::Config(_))));
    }
}
