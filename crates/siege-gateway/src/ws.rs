//! `WebSocket` handler for the live attack-state stream.
//!
//! Clients connect to `GET /ws`. The connection is registered as an
//! observer, receives a `snapshot` event with the current state, and then
//! every [`ServerEvent`] published after that snapshot, as JSON
//! `{event, data}` text frames.
//!
//! Clients may also send commands as JSON text frames tagged by
//! `action` (see [`ClientMessage`]). Unparseable frames are logged and
//! ignored.
//!
//! If a client falls behind the broadcast buffer it is resubscribed and
//! sent a fresh snapshot, so it never sees an event without the state
//! that event applies to.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use siege_core::{CommandOutcome, EngineHandle, Subscription};
use siege_types::{ClientMessage, ConnectionId, ServerEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::state::AppState;

/// What a client frame asked the connection to do.
#[derive(Debug)]
pub enum Dispatch {
    /// A command went through the engine.
    Applied(CommandOutcome),
    /// The client asked for a fresh snapshot.
    Resync,
}

/// Upgrade an HTTP request to a `WebSocket` observer connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Parse one client text frame and run it against the engine.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for frames that are not a
/// known action, and [`GatewayError::Unavailable`] if the engine is gone.
pub async fn dispatch(engine: &EngineHandle, text: &str) -> Result<Dispatch, GatewayError> {
    let message: ClientMessage = serde_json::from_str(text)
        .map_err(|e| GatewayError::InvalidRequest(format!("unrecognized client frame: {e}")))?;

    let outcome = match message {
        ClientMessage::Attack(request) => engine.attack(&request).await?,
        ClientMessage::Defend(request) => engine.defend(&request).await?,
        ClientMessage::Reset => engine.reset().await?,
        ClientMessage::GetState => return Ok(Dispatch::Resync),
    };
    Ok(Dispatch::Applied(outcome))
}

/// Serialize and send one event. Returns `false` once the socket is dead.
async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(event = event.name(), "Failed to serialize server event: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Take a fresh subscription and send its snapshot to the client.
///
/// Returns `None` if the engine is gone or the socket is closed.
async fn resubscribe(
    socket: &mut WebSocket,
    state: &AppState,
    connection_id: ConnectionId,
) -> Option<Subscription> {
    let subscription = match state.engine.subscribe().await {
        Ok(s) => s,
        Err(e) => {
            warn!(%connection_id, "Subscribe failed: {e}");
            return None;
        }
    };

    let snapshot = ServerEvent::Snapshot(subscription.snapshot.clone());
    if send_event(socket, &snapshot).await {
        Some(subscription)
    } else {
        debug!(%connection_id, "WebSocket client disconnected (snapshot send failed)");
        None
    }
}

/// Handle the `WebSocket` lifecycle: register the observer, stream
/// events, run client commands, and deregister on the way out.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let sessions = Arc::clone(state.engine.sessions());
    let observer = sessions.connect();
    let connection_id = observer.connection_id;
    info!(%connection_id, users = sessions.count(), "Observer connected");

    stream(&mut socket, &state, connection_id).await;

    sessions.disconnect(connection_id);
    info!(%connection_id, users = sessions.count(), "Observer disconnected");
}

async fn stream(socket: &mut WebSocket, state: &AppState, connection_id: ConnectionId) {
    let Some(mut subscription) = resubscribe(socket, state, connection_id).await else {
        return;
    };

    loop {
        tokio::select! {
            result = subscription.receiver.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(socket, &event).await {
                            debug!(%connection_id, "WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%connection_id, skipped, "Observer lagged, resending snapshot");
                        match resubscribe(socket, state, connection_id).await {
                            Some(fresh) => subscription = fresh,
                            None => return,
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!(%connection_id, "Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%connection_id, "WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        match dispatch(&state.engine, text.as_str()).await {
                            Ok(Dispatch::Applied(outcome)) => {
                                debug!(%connection_id, applied = outcome.applied(), "Client command handled");
                            }
                            Ok(Dispatch::Resync) => {
                                match resubscribe(socket, state, connection_id).await {
                                    Some(fresh) => subscription = fresh,
                                    None => return,
                                }
                            }
                            Err(GatewayError::Unavailable(e)) => {
                                warn!(%connection_id, "Engine unavailable: {e}");
                                return;
                            }
                            Err(e) => debug!(%connection_id, "Ignoring client frame: {e}"),
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%connection_id, "WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }
}
