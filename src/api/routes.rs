use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{Config, MAX_UPLOAD_BYTES};

use super::auth::{self, AdminSessions};
use super::health::{get_health, HealthState};
use super::latency::{get_stats_latency, track_latency, LatencyStats};
use super::{dashboard, deposits, orders, sessions, stream, upload, users, withdrawals};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub config: Arc<Config>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub admin_sessions: Arc<AdminSessions>,
}

pub fn router(state: ApiState) -> Router {
    let admin = Router::new()
        .route("/api/admin/logout", post(auth::logout))
        .route("/api/admin/users", get(users::list_users).put(users::set_user_active))
        .route(
            "/api/admin/users/:id",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/api/admin/orders", get(orders::list_orders))
        .route(
            "/api/admin/deposits",
            get(deposits::list_deposits).put(deposits::resolve_deposit),
        )
        .route("/api/admin/withdrawals", get(withdrawals::list_withdrawals))
        .route("/api/admin/withdrawals/:id", patch(withdrawals::resolve_withdrawal))
        .route("/api/admin/recent-users", get(dashboard::recent_users))
        .route("/api/admin/recent-sessions", get(dashboard::recent_sessions))
        .route(
            "/api/upload",
            post(upload::upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .route("/api/admin/login", post(auth::login))
        .route(
            "/api/sessions",
            get(sessions::get_sessions).post(sessions::post_sessions),
        )
        .route("/api/sessions/windows", get(sessions::get_windows))
        .route("/api/sessions/stream", get(stream::session_stream))
        .merge(admin)
        .layer(middleware::from_fn_with_state(state.clone(), track_latency))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
