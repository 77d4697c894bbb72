use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::error;

use crate::api::health::HealthState;
use crate::error::Result;
use crate::types::SessionEvent;

use super::sessions::{record_close, record_open};

/// Receives SessionEvents from the recorder and persists them to SQLite.
/// Runs as a dedicated background task.
pub struct DbWriter {
    pool: sqlx::SqlitePool,
    event_rx: mpsc::Receiver<SessionEvent>,
    health: Arc<HealthState>,
}

impl DbWriter {
    pub fn new(
        pool: sqlx::SqlitePool,
        event_rx: mpsc::Receiver<SessionEvent>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            pool,
            event_rx,
            health,
        }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.event_rx.recv().await {
            self.health.dec_write_queue_pending();
            match self.write_event(&event).await {
                Ok(()) => self.health.mark_session_written(),
                Err(e) => {
                    self.health.inc_write_errors();
                    error!("DB write error: {e}");
                }
            }
        }
    }

    async fn write_event(&self, event: &SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Open(open) => record_open(&self.pool, open).await,
            SessionEvent::Close(close) => record_close(&self.pool, close).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{sessions::recent_sessions, test_pool};
    use crate::sessions::generate_windows;
    use crate::sessions::recorder::{close_event, open_event};
    use crate::types::Outcome;

    #[tokio::test]
    async fn writer_drains_channel_until_closed() {
        let pool = test_pool().await;
        let health = Arc::new(HealthState::new());
        let (tx, rx) = mpsc::channel(8);
        let writer = DbWriter::new(pool.clone(), rx, health.clone());

        let w = generate_windows(&chrono::Utc::now(), 1).unwrap().remove(0);
        health.inc_write_queue_pending();
        tx.send(SessionEvent::Open(open_event(&w))).await.unwrap();
        health.inc_write_queue_pending();
        tx.send(SessionEvent::Close(close_event(&w, Outcome::Up))).await.unwrap();
        drop(tx);

        writer.run().await;

        let rows = recent_sessions(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].result.as_deref(), Some("up"));
        assert_eq!(health.write_queue_pending(), 0);
        assert_eq!(health.write_errors(), 0);
        assert!(health.last_session_write_ms() > 0);
    }
}
