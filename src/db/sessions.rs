use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{now_ms, SessionCloseEvent, SessionOpenEvent};

use super::models::SessionRow;

/// Records an opened session. Re-opening a known session is a no-op.
pub async fn record_open(pool: &SqlitePool, event: &SessionOpenEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO sessions (id, start_time, end_time, result, recorded_at)
        VALUES (?, ?, ?, NULL, ?)
        "#,
    )
    .bind(&event.session_id)
    .bind(event.start_time.timestamp_millis())
    .bind(event.end_time.timestamp_millis())
    .bind(now_ms())
    .execute(pool)
    .await?;
    Ok(())
}

/// Stores the outcome of a closed session, inserting the row when the
/// open was never recorded (recorder started mid-window).
pub async fn record_close(pool: &SqlitePool, event: &SessionCloseEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, start_time, end_time, result, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            result = excluded.result,
            recorded_at = excluded.recorded_at
        "#,
    )
    .bind(&event.session_id)
    .bind(event.start_time.timestamp_millis())
    .bind(event.end_time.timestamp_millis())
    .bind(event.outcome.to_string())
    .bind(now_ms())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn recent_sessions(pool: &SqlitePool, limit: i64) -> Result<Vec<SessionRow>> {
    Ok(sqlx::query_as::<_, SessionRow>(
        "SELECT id, start_time, end_time, result, recorded_at FROM sessions ORDER BY start_time DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::sessions::generate_windows;
    use crate::sessions::recorder::{close_event, open_event};
    use crate::types::Outcome;
    use chrono::NaiveDate;

    fn windows(n: i64) -> Vec<crate::sessions::SessionWindow> {
        let anchor = NaiveDate::from_ymd_opt(2025, 6, 29)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc();
        generate_windows(&anchor, n).unwrap()
    }

    #[tokio::test]
    async fn open_then_close_fills_in_the_result() {
        let pool = test_pool().await;
        let w = windows(1).remove(0);

        record_open(&pool, &open_event(&w)).await.unwrap();
        record_open(&pool, &open_event(&w)).await.unwrap();
        let rows = recent_sessions(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].result.is_none());

        record_close(&pool, &close_event(&w, Outcome::Up)).await.unwrap();
        let rows = recent_sessions(&pool, 10).await.unwrap();
        assert_eq!(rows[0].result.as_deref(), Some("up"));
        assert_eq!(rows[0].start_time, w.start_time.timestamp_millis());
    }

    #[tokio::test]
    async fn close_without_open_inserts() {
        let pool = test_pool().await;
        let w = windows(1).remove(0);
        record_close(&pool, &close_event(&w, Outcome::Down)).await.unwrap();
        let rows = recent_sessions(&pool, 10).await.unwrap();
        assert_eq!(rows[0].result.as_deref(), Some("down"));
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let pool = test_pool().await;
        for w in windows(15) {
            record_open(&pool, &open_event(&w)).await.unwrap();
        }
        let rows = recent_sessions(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows[0].start_time > rows[9].start_time);
        assert_eq!(rows[0].id, "202506290914");
    }
}
