//! Shared health state for the /health endpoint.
//! Updated by the session recorder and the DB writer.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::types::now_ms;

use super::routes::ApiState;

/// Shared health metrics. Updated by background tasks, read by API.
pub struct HealthState {
    started_at: Instant,
    /// Millisecond timestamp of the last persisted session event (0 = none).
    pub last_session_write_ms: AtomicI64,
    /// Session events queued for DB write.
    pub write_queue_pending: AtomicU64,
    /// Failed session writes since start.
    pub write_errors: AtomicU64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            last_session_write_ms: AtomicI64::new(0),
            write_queue_pending: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_session_written(&self) {
        self.last_session_write_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn inc_write_queue_pending(&self) {
        self.write_queue_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_write_queue_pending(&self) {
        // Saturating: a stray decrement must not wrap the gauge.
        let _ = self
            .write_queue_pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn inc_write_errors(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_session_write_ms(&self) -> i64 {
        self.last_session_write_ms.load(Ordering::Relaxed)
    }

    pub fn write_queue_pending(&self) -> u64 {
        self.write_queue_pending.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub db_ok: bool,
    pub uptime_secs: u64,
    pub last_session_write_ms: Option<i64>,
    pub write_queue_pending: u64,
    pub write_errors: u64,
    pub admin_sessions: usize,
}

pub async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let last = state.health.last_session_write_ms();

    Json(HealthResponse {
        db_ok,
        uptime_secs: state.health.uptime_secs(),
        last_session_write_ms: (last > 0).then_some(last),
        write_queue_pending: state.health.write_queue_pending(),
        write_errors: state.health.write_errors(),
        admin_sessions: state.admin_sessions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_gauge_does_not_underflow() {
        let h = HealthState::new();
        h.dec_write_queue_pending();
        assert_eq!(h.write_queue_pending(), 0);
        h.inc_write_queue_pending();
        h.inc_write_queue_pending();
        h.dec_write_queue_pending();
        assert_eq!(h.write_queue_pending(), 1);
    }

    #[test]
    fn session_write_timestamp_is_recorded() {
        let h = HealthState::new();
        assert_eq!(h.last_session_write_ms(), 0);
        h.mark_session_written();
        assert!(h.last_session_write_ms() > 0);
    }
}
