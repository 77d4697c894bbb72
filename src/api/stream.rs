//! `GET /api/sessions/stream`: pushes the classified current session once
//! per second so clients can animate the countdown without polling.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::{FixedOffset, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::STREAM_INTERVAL_MS;
use crate::error::{AppError, Result};
use crate::sessions::current_window;

use super::routes::ApiState;
use super::sessions::SessionView;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    pub session: SessionView,
    pub server_time: chrono::DateTime<Utc>,
}

pub async fn session_stream(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    let offset = state.config.utc_offset;
    ws.on_upgrade(move |socket| stream_sessions(socket, offset))
}

pub fn current_frame(offset: FixedOffset) -> Result<StreamFrame> {
    let server_time = Utc::now();
    let window = current_window(&server_time.with_timezone(&offset))?;
    Ok(StreamFrame {
        session: SessionView::at(window, server_time),
        server_time,
    })
}

async fn stream_sessions(socket: WebSocket, offset: FixedOffset) {
    let (mut sink, mut incoming) = socket.split();
    let mut ticker = tokio::time::interval(Duration::from_millis(STREAM_INTERVAL_MS));
    debug!("Session stream client connected");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payload = match current_frame(offset).and_then(|f| serde_json::to_string(&f).map_err(AppError::from)) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("Session stream frame error: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            msg = incoming.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!("Session stream client disconnected");
}
