//! WebSocket endpoint and single-connection outbound gate
//!
//! The bridge serves one controller at a time: a new inbound connection
//! simply replaces the previous reference. Every outbound send checks
//! liveness first; with no live connection the frame is dropped and logged,
//! never queued or retried. Inbound frames are processed to completion, one
//! at a time, inside the connection task.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::protocol::OutboundMsg;
use crate::router::MessageRouter;

/// Clonable handle to the (at most one) live connection.
///
/// Components that produce outbound traffic hold one of these; the socket
/// task behind it changes as controllers reconnect. A pending debounce
/// timer from a dead connection fires into `send` and is suppressed by the
/// liveness check here.
#[derive(Clone, Default)]
pub struct Outbound {
    slot: Arc<RwLock<Option<mpsc::UnboundedSender<String>>>>,
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.slot.read().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Install the sender of a freshly accepted connection, replacing any
    /// previous one. The old connection's task notices its channel closing
    /// and winds down.
    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<String>) {
        let mut slot = self.slot.write();
        if slot.is_some() {
            info!("new connection replaces the previous client");
        }
        *slot = Some(tx);
    }

    /// Serialize and send one message if a live connection exists.
    pub fn send(&self, msg: &OutboundMsg) {
        let guard = self.slot.read();
        let Some(tx) = guard.as_ref() else {
            warn!("send {}: {}", msg.topic(), BridgeError::Disconnected);
            return;
        };
        match serde_json::to_string(msg) {
            Ok(json) => {
                debug!("send {}", json);
                if tx.send(json).is_err() {
                    warn!("send {}: {}", msg.topic(), BridgeError::Disconnected);
                }
            }
            Err(e) => warn!("send {}: serialization failed: {}", msg.topic(), e),
        }
    }
}

#[derive(Clone)]
struct WsState {
    router: Arc<MessageRouter>,
    outbound: Outbound,
}

/// Build the axum router exposing the WebSocket endpoint.
fn build_app(state: WsState) -> Router {
    Router::new().route("/", get(ws_upgrade)).with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection task: pumps inbound frames through the message router
/// (sequentially, no reentrancy) and drains the outbound channel.
async fn handle_socket(mut socket: WebSocket, state: WsState) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.outbound.attach(tx);
    info!("client connected");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        debug!("on message: {}", text);
                        state.router.handle_message(&text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary/pong frames are not part of the protocol
                    }
                    Some(Err(e)) => {
                        warn!("socket error: {}", e);
                        break;
                    }
                }
            }
            out = rx.recv() => {
                match out {
                    Some(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // Channel closed: a newer connection took the slot
                    None => break,
                }
            }
        }
    }

    info!("client disconnected");
}

/// Bind and serve the WebSocket endpoint until the process shuts down.
pub async fn serve(bind: &str, port: u16, router: Arc<MessageRouter>, outbound: Outbound) -> Result<()> {
    let state = WsState { router, outbound };
    let app = build_app(state);

    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address '{bind}:{port}'"))?;
    info!("listening on ws://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind WebSocket server")?;

    axum::serve(listener, app)
        .await
        .context("WebSocket server error")?;

    Ok(())
}
