//! HTTP pull API and WebSocket push.
//!
//! | Route            | Response                                   |
//! |------------------|--------------------------------------------|
//! | `GET /api/nodes` | `[{id, queue, rate}]` in insertion order   |
//! | `GET /api/links` | `[{from, to, capacity, load}]`             |
//! | `GET /api/snapshot` | `{tick, nodes, links}`                  |
//! | `GET /ws`        | one `networkUpdate` text frame per tick    |
//!
//! Pull routes serve the latest published snapshot. Push clients that fall
//! behind skip the snapshots they missed.

use crate::driver::{DriverHandle, Shutdown};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use packetflow_core::snapshot::{LinkSnapshot, NetworkSnapshot, NodeSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tower_http::cors::CorsLayer;

/// Shared state for every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    latest: watch::Receiver<Arc<NetworkSnapshot>>,
    updates: broadcast::Sender<Arc<NetworkSnapshot>>,
    shutdown: Shutdown,
}

impl AppState {
    pub fn new(
        latest: watch::Receiver<Arc<NetworkSnapshot>>,
        updates: broadcast::Sender<Arc<NetworkSnapshot>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            latest,
            updates,
            shutdown,
        }
    }

    pub fn from_driver(driver: &DriverHandle) -> Self {
        Self::new(driver.latest_receiver(), driver.updates(), driver.shutdown())
    }

    fn snapshot(&self) -> Arc<NetworkSnapshot> {
        Arc::clone(&self.latest.borrow())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/nodes", get(nodes))
        .route("/api/links", get(links))
        .route("/api/snapshot", get(snapshot))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn nodes(State(state): State<AppState>) -> Json<Vec<NodeSnapshot>> {
    Json(state.snapshot().nodes.clone())
}

async fn links(State(state): State<AppState>) -> Json<Vec<LinkSnapshot>> {
    Json(state.snapshot().links.clone())
}

async fn snapshot(State(state): State<AppState>) -> Json<NetworkSnapshot> {
    Json(NetworkSnapshot::clone(&state.snapshot()))
}

// ---------------------------------------------------------------------------
// WebSocket push
// ---------------------------------------------------------------------------

/// Wire shape of one pushed snapshot.
#[derive(Serialize)]
struct NetworkUpdate<'a> {
    event: &'static str,
    #[serde(flatten)]
    snapshot: &'a NetworkSnapshot,
}

pub fn encode_update(snapshot: &NetworkSnapshot) -> serde_json::Result<String> {
    serde_json::to_string(&NetworkUpdate {
        event: "networkUpdate",
        snapshot,
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the upgrade so no tick slips between.
    let updates = state.updates.subscribe();
    ws.on_upgrade(move |socket| async move {
        tracing::debug!("websocket client connected");
        if let Err(error) = push_interface(socket, state, updates).await {
            tracing::debug!(%error, "websocket closed with error");
        }
        tracing::debug!("websocket client disconnected");
    })
}

async fn push_interface(
    ws: WebSocket,
    state: AppState,
    mut updates: broadcast::Receiver<Arc<NetworkSnapshot>>,
) -> anyhow::Result<()> {
    let (mut tx, mut rx) = ws.split();

    tx.send(Message::Text(encode_update(&state.snapshot())?.into()))
        .await?;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    tx.send(Message::Text(encode_update(&snapshot)?.into())).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "websocket client lagging, skipped snapshots");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = rx.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error.into()),
            },
            _ = state.shutdown.wait() => {
                let _ = tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
    Ok(())
}
