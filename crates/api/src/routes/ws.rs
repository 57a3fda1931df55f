//! WebSocket endpoint for real-time notifications.
//!
//! GET /ws?token=<JWT>
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token may
//! come from the query string; an `Authorization: Bearer` header also works.
//! Connections without a valid token are guests and may only join table rooms.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use realtime::{Identity, RealtimeHub, Session};
use serde::Deserialize;
use store::OrderStore;
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::state::{AppState, header_token};

/// Frames buffered per connection before room forwarders wait.
const OUTBOUND_QUEUE: usize = 64;

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// GET /ws
pub async fn upgrade<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = query.token.as_deref().or_else(|| header_token(&headers));
    let identity = state.tokens.identify(token);
    let hub = state.hub.clone();

    ws.on_upgrade(move |socket| run_session(socket, hub, identity))
}

async fn run_session(socket: WebSocket, hub: RealtimeHub, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut outbound) = mpsc::channel(OUTBOUND_QUEUE);
    let mut session = Session::new(hub, identity, tx);

    tracing::info!(role = %identity.role, "WebSocket connected");

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = session.handle_text(text.as_str());
                        match reply.to_frame() {
                            Ok(frame) => {
                                if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Failed to encode reply"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket receive failed");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let rooms = session.rooms().len();
    drop(session);
    tracing::info!(role = %identity.role, rooms, "WebSocket disconnected");
}
