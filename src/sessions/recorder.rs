use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::types::{Outcome, SessionCloseEvent, SessionEvent, SessionOpenEvent};

use super::outcome;
use super::window::{current_window, is_active, SessionWindow};

/// Background task that walks the minute grid and reports each session's
/// open and close to the DB writer. Display bookkeeping only.
pub struct SessionRecorder {
    offset: FixedOffset,
    event_tx: mpsc::Sender<SessionEvent>,
    health: Arc<HealthState>,
}

impl SessionRecorder {
    pub fn new(
        offset: FixedOffset,
        event_tx: mpsc::Sender<SessionEvent>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            offset,
            event_tx,
            health,
        }
    }

    pub async fn run(self) {
        info!("Session recorder started (offset {})", self.offset);
        loop {
            let now = Utc::now().with_timezone(&self.offset);
            let window = match current_window(&now) {
                Ok(w) => w,
                Err(e) => {
                    error!("Session recorder clock error: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            // Second :00 falls between windows; wait for the next open.
            tokio::time::sleep(until(window.start_time, Utc::now())).await;
            if !is_active(&window, Utc::now()) {
                warn!("Session {} missed (woke after close), skipping", window.id);
                continue;
            }
            if !self.emit(SessionEvent::Open(open_event(&window))).await {
                return;
            }

            tokio::time::sleep(until(window.end_time, Utc::now())).await;
            let result = outcome::draw();
            if !self.emit(SessionEvent::Close(close_event(&window, result))).await {
                return;
            }
            info!(
                event = "SESSION_CLOSE",
                session_id = %window.id,
                result = %result,
                "SESSION CLOSE | {} | {}",
                window.label,
                result.label(),
            );

            // Step past the window end so the next iteration lands in the following minute.
            tokio::time::sleep(until(
                window.end_time + chrono::Duration::milliseconds(1),
                Utc::now(),
            ))
            .await;
        }
    }

    /// Returns false once the writer is gone.
    async fn emit(&self, event: SessionEvent) -> bool {
        self.health.inc_write_queue_pending();
        match self.event_tx.send(event).await {
            Ok(()) => true,
            Err(e) => {
                self.health.dec_write_queue_pending();
                warn!("Session writer channel closed, recorder stopping: {e}");
                false
            }
        }
    }
}

pub fn open_event(window: &SessionWindow) -> SessionOpenEvent {
    debug!("SESSION OPEN | {} | {}", window.id, window.label);
    SessionOpenEvent {
        session_id: window.id.clone(),
        start_time: window.start_time,
        end_time: window.end_time,
    }
}

pub fn close_event(window: &SessionWindow, outcome: Outcome) -> SessionCloseEvent {
    SessionCloseEvent {
        session_id: window.id.clone(),
        start_time: window.start_time,
        end_time: window.end_time,
        outcome,
    }
}

/// Time left until `target`, zero when it has passed.
fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or_default()
}
