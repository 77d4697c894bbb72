use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// `now` is before the window start.
    Upcoming,
    /// `now` is within `[start, end]`, both ends inclusive.
    Active,
    /// `now` is past the window end.
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Upcoming => "upcoming",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Session outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    /// Label shown on the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Up => "LÊN",
            Outcome::Down => "XUỐNG",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Up => write!(f, "up"),
            Outcome::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Outcome {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Outcome::Up),
            "down" => Ok(Outcome::Down),
            other => Err(AppError::BadRequest(format!("unknown outcome '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Deposit / withdrawal request status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    /// The only legal moves are pending → approved and pending → rejected.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        self == RequestStatus::Pending
            && matches!(next, RequestStatus::Approved | RequestStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(AppError::BadRequest(format!("unknown request status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Front side of the ID card.
    Front,
    /// Back side of the ID card.
    Back,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Front => write!(f, "front"),
            DocumentKind::Back => write!(f, "back"),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front" => Ok(DocumentKind::Front),
            "back" => Ok(DocumentKind::Back),
            other => Err(AppError::BadRequest(format!("unknown document type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Session events, sent over mpsc from the recorder to the DB writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionOpenEvent {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionCloseEvent {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Open(SessionOpenEvent),
    Close(SessionCloseEvent),
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Stored millisecond timestamp back to an instant.
pub fn from_ms(ms: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::InvalidTimestamp(format!("{ms} ms is out of range")))
}
