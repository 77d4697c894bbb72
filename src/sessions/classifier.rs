use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::SessionStatus;

use super::window::SessionWindow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub status: SessionStatus,
    /// Elapsed share of the window, 0–100.
    pub progress: f64,
}

/// Status and progress of `window` as seen at `now`.
/// Both window bounds count as active.
pub fn classify(window: &SessionWindow, now: DateTime<Utc>) -> Classification {
    classify_span(window.start_time, window.end_time, now)
}

/// Same rule over a bare `[start, end]` span, used for recorded sessions.
pub fn classify_span(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Classification {
    if now < start {
        return Classification {
            status: SessionStatus::Upcoming,
            progress: 0.0,
        };
    }
    if now > end {
        return Classification {
            status: SessionStatus::Completed,
            progress: 100.0,
        };
    }

    let total = (end - start).num_milliseconds();
    let progress = if total <= 0 {
        100.0
    } else {
        let elapsed = (now - start).num_milliseconds();
        (elapsed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    };

    Classification {
        status: SessionStatus::Active,
        progress,
    }
}
