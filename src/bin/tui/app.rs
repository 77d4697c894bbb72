use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror the desk's JSON shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct SessionView {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub label: String,
    pub status: String,
    pub progress: f64,
    pub remaining_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub current_session: SessionView,
    pub next_sessions: Vec<SessionView>,
    pub server_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    pub session: SessionView,
    pub server_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct RecentSession {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub result: Option<String>,
    pub result_label: Option<String>,
    pub status: String,
    pub progress: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentSessionsResponse {
    pub sessions: Vec<RecentSession>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserBalance {
    pub available: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlags {
    pub active: bool,
    pub bet_locked: bool,
    pub withdraw_locked: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentUser {
    pub username: String,
    pub full_name: Option<String>,
    pub balance: UserBalance,
    pub status: UserFlags,
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentUsersResponse {
    pub users: Vec<RecentUser>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub db_ok: Option<bool>,
    pub uptime_secs: Option<u64>,
    pub last_session_write_ms: Option<i64>,
    pub write_queue_pending: Option<u64>,
    pub write_errors: Option<u64>,
    pub admin_sessions: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct LatencyResponse {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: Option<i64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Messages from the stream task to the render loop.
#[derive(Debug)]
pub enum StreamEvent {
    Frame(StreamFrame),
    Disconnected(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub stream_status: ConnectionStatus,
    pub current: Option<SessionView>,
    pub server_time: Option<String>,
    pub next_sessions: Vec<SessionView>,
    pub recent_sessions: Vec<RecentSession>,
    pub recent_users: Vec<RecentUser>,
    pub admin_error: Option<String>,
    pub health: HealthResponse,
    pub latency: LatencyResponse,
    pub base_url: String,
    /// Value of the `admin-session` cookie, from ADMIN_SESSION.
    pub admin_session: Option<String>,
}

impl AppState {
    pub fn new(base_url: String, admin_session: Option<String>) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            stream_status: ConnectionStatus::Connecting,
            current: None,
            server_time: None,
            next_sessions: Vec::new(),
            recent_sessions: Vec::new(),
            recent_users: Vec::new(),
            admin_error: None,
            health: HealthResponse::default(),
            latency: LatencyResponse::default(),
            base_url,
            admin_session,
        }
    }

    pub fn apply_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Frame(frame) => {
                self.current = Some(frame.session);
                self.server_time = Some(frame.server_time);
                self.stream_status = ConnectionStatus::Connected;
            }
            StreamEvent::Disconnected(reason) => {
                self.stream_status = ConnectionStatus::Error(reason);
            }
        }
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let sessions_url = format!("{}/api/sessions", self.base_url);
        let health_url = format!("{}/health", self.base_url);
        let latency_url = format!("{}/stats/latency", self.base_url);

        let (sessions_res, health_res, latency_res) = tokio::join!(
            client.get(&sessions_url).send(),
            client.get(&health_url).send(),
            client.get(&latency_url).send(),
        );

        let sessions = match sessions_res {
            Ok(resp) => resp.json::<SessionsResponse>().await,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        match sessions {
            Ok(s) => {
                // The stream owns the countdown once connected.
                if self.stream_status != ConnectionStatus::Connected {
                    self.current = Some(s.current_session);
                    self.server_time = Some(s.server_time);
                }
                self.next_sessions = s.next_sessions;
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
                return;
            }
        }

        if let Ok(h) = health_res {
            if let Ok(health) = h.json::<HealthResponse>().await {
                self.health = health;
            }
        }
        if let Ok(l) = latency_res {
            if let Ok(latency) = l.json::<LatencyResponse>().await {
                self.latency = latency;
            }
        }

        self.refresh_admin(client).await;
    }

    async fn refresh_admin(&mut self, client: &reqwest::Client) {
        let Some(token) = self.admin_session.as_deref() else {
            self.admin_error = Some("set ADMIN_SESSION to show admin panels".to_string());
            return;
        };
        let cookie = format!("admin-session={token}");
        let users_url = format!("{}/api/admin/recent-users", self.base_url);
        let sessions_url = format!("{}/api/admin/recent-sessions", self.base_url);

        let (users_res, sessions_res) = tokio::join!(
            client.get(&users_url).header(reqwest::header::COOKIE, &cookie).send(),
            client.get(&sessions_url).header(reqwest::header::COOKIE, &cookie).send(),
        );

        let (users_resp, sessions_resp) = match (users_res, sessions_res) {
            (Ok(u), Ok(s)) => (u, s),
            (Err(e), _) | (_, Err(e)) => {
                self.admin_error = Some(format!("{e}"));
                return;
            }
        };
        if users_resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.admin_error = Some("admin session rejected, log in again".to_string());
            return;
        }

        let (users, sessions) = tokio::join!(
            users_resp.json::<RecentUsersResponse>(),
            sessions_resp.json::<RecentSessionsResponse>(),
        );
        match (users, sessions) {
            (Ok(u), Ok(s)) => {
                self.recent_users = u.users;
                self.recent_sessions = s.sessions;
                self.admin_error = None;
            }
            (Err(e), _) | (_, Err(e)) => {
                self.admin_error = Some(format!("parse error: {e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `http://host` → `ws://host/api/sessions/stream`.
pub fn stream_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/api/sessions/stream")
}

/// Milliseconds to `MM:SS`, rounded up so a live window never shows 00:00.
pub fn format_remaining(ms: i64) -> String {
    let secs = (ms.max(0) + 999) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Đồng with dot thousands separators: `1234567` → `1.234.567 ₫`.
pub fn format_vnd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} ₫")
}

/// `HH:MM:SS` portion of an RFC 3339 timestamp.
pub fn clock_part(ts: &str) -> &str {
    ts.split('T')
        .nth(1)
        .and_then(|t| t.get(..8))
        .unwrap_or("—")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
