use crate::config::HubConfig;
use crate::store::SessionStore;
use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use rv_core::channel::{decode_frame, MAX_SUBMISSION_BYTES};
use rv_core::{ClientFrame, SYSTEM_USER};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::Interval};
use tracing::{debug, info, warn};

pub const COMMAND_LINK_PATH: &str = "/api/v1/ws/command-link";
pub const DISPATCH_REPAIR_PATH: &str = "/api/v1/dispatch/repair";
pub const REPAIR_UNIT_ID: &str = "ROAD-BOT-01";
pub const REPAIR_ETA: &str = "15 minutes";
const OUTBOUND_QUEUE: usize = 256;

pub struct HubState {
    config: HubConfig,
    store: SessionStore,
}

impl HubState {
    pub fn new(config: HubConfig) -> Self {
        let store = SessionStore::new(config.history_capacity);
        Self { config, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let write_timeout = self.config.write_timeout;
        let ping_interval = self.config.ping_interval;
        let write_task = tokio::spawn(async move {
            let mut ping = (!ping_interval.is_zero()).then(|| ping_ticker(ping_interval));
            loop {
                let msg = tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(text) => Message::Text(text),
                        None => break,
                    },
                    _ = next_ping(&mut ping) => Message::Ping(Vec::new()),
                };
                let send = ws_sender.send(msg);
                match tokio::time::timeout(write_timeout, send).await {
                    Ok(Ok(())) => {}
                    // Dropping the queue receiver ends the read side too.
                    _ => return,
                }
            }
            let _ = ws_sender.close().await;
        });

        let conn_id = self.store.next_conn_id();
        info!(event = "client_connected", conn_id = %conn_id);
        let Some(mut evicted) = self.store.attach(&conn_id, tx.clone()).await else {
            drop(tx);
            let _ = write_task.await;
            return;
        };
        if self.config.announce_presence {
            self.store
                .accept(SYSTEM_USER, "Peer connected to Sentinel Command Link")
                .await;
        }

        loop {
            let result = tokio::select! {
                maybe = ws_receiver.next() => match maybe {
                    Some(result) => result,
                    None => break,
                },
                _ = &mut evicted => {
                    warn!(event = "session_evicted", conn_id = %conn_id);
                    break;
                }
                _ = tx.closed() => {
                    warn!(event = "write_stalled", conn_id = %conn_id);
                    break;
                }
            };
            let msg = match result {
                Ok(value) => value,
                Err(err) => {
                    warn!(event = "read_error", conn_id = %conn_id, error = %err);
                    break;
                }
            };
            let text = match msg {
                Message::Text(text) => text,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!(event = "message_not_utf8", conn_id = %conn_id);
                        continue;
                    }
                },
                Message::Close(_) => {
                    info!(event = "client_close", conn_id = %conn_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            if self.config.debug {
                debug!(event = "message_received", conn_id = %conn_id, raw = %text);
            }
            match decode_frame::<ClientFrame>(&text, MAX_SUBMISSION_BYTES) {
                Ok(ClientFrame::Message(submission)) => {
                    let entry = self
                        .store
                        .accept(&submission.user, &submission.message)
                        .await;
                    info!(event = "message_accepted", conn_id = %conn_id, id = %entry.id, user = %entry.user);
                }
                Err(err) => {
                    warn!(event = "message_invalid", conn_id = %conn_id, error = %err);
                }
            }
        }

        self.store.detach(&conn_id).await;
        info!(event = "client_disconnected", conn_id = %conn_id);
        if self.config.announce_presence {
            self.store
                .accept(SYSTEM_USER, "Peer disconnected from Command Link")
                .await;
        }
        drop(tx);
        let _ = write_task.await;
    }
}

pub fn router(hub: Arc<HubState>) -> Router {
    Router::new()
        .route(COMMAND_LINK_PATH, get(ws_handler))
        .route(DISPATCH_REPAIR_PATH, post(dispatch_repair))
        .route("/health", get(|| async { "ok" }))
        .with_state(hub)
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<HubState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        hub.handle_socket(socket).await;
    })
}

#[derive(Debug, Deserialize)]
pub struct DispatchQuery {
    pub pothole_id: i64,
    #[serde(default = "unknown_location")]
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: String,
    pub unit_id: String,
    pub eta: String,
    pub target_pothole: i64,
    pub message: String,
}

fn unknown_location() -> String {
    "Unknown".to_string()
}

/// Logs a repair dispatch into the command link as a system notice.
pub async fn dispatch_repair(
    State(hub): State<Arc<HubState>>,
    Query(query): Query<DispatchQuery>,
) -> Json<DispatchResponse> {
    let notice = format!(
        "Autonomous repair unit {REPAIR_UNIT_ID} dispatched to {} for pothole #{}",
        query.location, query.pothole_id
    );
    let entry = hub.store.accept(SYSTEM_USER, &notice).await;
    info!(event = "repair_dispatched", id = %entry.id, pothole_id = query.pothole_id, location = %query.location);
    Json(DispatchResponse {
        status: "dispatched".to_string(),
        unit_id: REPAIR_UNIT_ID.to_string(),
        eta: REPAIR_ETA.to_string(),
        target_pothole: query.pothole_id,
        message: notice,
    })
}

fn ping_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
