mod api;
mod config;
mod db;
mod error;
mod seed;
mod sessions;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::api::auth::AdminSessions;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY, MOCK_USER_COUNT};
use crate::db::writer::DbWriter;
use crate::error::Result;
use crate::sessions::SessionRecorder;
use crate::types::SessionEvent;

/// How often expired admin sessions are swept from memory.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    if cfg.seed_mock_users {
        let inserted = seed::seed_mock_users(&pool, MOCK_USER_COUNT).await?;
        if inserted == 0 {
            debug!("Users present, mock seeding skipped");
        }
    }

    let health = Arc::new(HealthState::new());
    let admin_sessions = Arc::new(AdminSessions::new(Duration::from_secs(
        cfg.admin_session_ttl_secs,
    )));

    // --- Channels ---
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(CHANNEL_CAPACITY);

    // --- Spawn tasks ---

    // Session recorder: walks the minute grid
    let recorder = SessionRecorder::new(cfg.utc_offset, event_tx, Arc::clone(&health));
    tokio::spawn(async move { recorder.run().await });

    // DB writer: persists session opens and closes
    let writer = DbWriter::new(pool.clone(), event_rx, Arc::clone(&health));
    tokio::spawn(async move { writer.run().await });

    // Admin session sweeper
    let sweep_sessions = Arc::clone(&admin_sessions);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = sweep_sessions.purge_expired();
            if purged > 0 {
                debug!("Purged {purged} expired admin sessions");
            }
        }
    });

    // HTTP API server
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let api_state = ApiState {
        pool,
        config: Arc::new(cfg),
        health,
        latency: Arc::new(LatencyStats::new()),
        admin_sessions,
    };
    let app = router(api_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
