//! Minute-aligned session windows.
//!
//! A window opens at second `:01.000` of its minute and closes at
//! `:59.999`. Second `:00` belongs to no window.

use chrono::{DateTime, Offset, TimeZone, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::from_ms;

use super::classifier::{classify, Classification};

const MINUTE_MS: i64 = 60_000;
const OPEN_OFFSET_MS: i64 = 1_000;
const CLOSE_OFFSET_MS: i64 = 59_999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWindow {
    /// Session code, `YYYYMMDDHHMM` of the start in the display zone.
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `HH:MM` of the start in the display zone.
    pub label: String,
}

impl SessionWindow {
    /// The window whose local minute contains `at`.
    fn containing<Tz>(at: &DateTime<Tz>) -> Result<Self>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let offset_ms = i64::from(at.offset().fix().local_minus_utc()) * 1_000;
        let local_ms = at.timestamp_millis() + offset_ms;
        let minute_ms = local_ms.div_euclid(MINUTE_MS) * MINUTE_MS - offset_ms;
        let start_time = from_ms(minute_ms + OPEN_OFFSET_MS)?;
        let end_time = from_ms(minute_ms + CLOSE_OFFSET_MS)?;

        let local_start = start_time.with_timezone(&at.timezone());
        Ok(Self {
            id: local_start.format("%Y%m%d%H%M").to_string(),
            start_time,
            end_time,
            label: local_start.format("%H:%M").to_string(),
        })
    }

    pub fn classify(&self, now: DateTime<Utc>) -> Classification {
        classify(self, now)
    }
}

/// Produce `count` consecutive windows, the first one in the minute of
/// `anchor`. Labels and ids use the anchor's zone.
pub fn generate_windows<Tz>(anchor: &DateTime<Tz>, count: i64) -> Result<Vec<SessionWindow>>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if count < 0 {
        return Err(AppError::InvalidArgument(format!(
            "window count must be non-negative, got {count}"
        )));
    }

    let mut windows = Vec::with_capacity(count as usize);
    let mut cursor = anchor.clone();
    for _ in 0..count {
        windows.push(SessionWindow::containing(&cursor)?);
        cursor = cursor
            .checked_add_signed(chrono::Duration::minutes(1))
            .ok_or_else(|| AppError::InvalidTimestamp("window past the end of time".to_string()))?;
    }
    Ok(windows)
}

/// The window of the current minute.
pub fn current_window<Tz>(now: &DateTime<Tz>) -> Result<SessionWindow>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    SessionWindow::containing(now)
}

/// `count` windows starting with the next minute.
pub fn next_windows<Tz>(now: &DateTime<Tz>, count: i64) -> Result<Vec<SessionWindow>>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let next_minute = now
        .clone()
        .checked_add_signed(chrono::Duration::minutes(1))
        .ok_or_else(|| AppError::InvalidTimestamp("window past the end of time".to_string()))?;
    generate_windows(&next_minute, count)
}

pub fn is_active(window: &SessionWindow, now: DateTime<Utc>) -> bool {
    window.start_time <= now && now <= window.end_time
}
