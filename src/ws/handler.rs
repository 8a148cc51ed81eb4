//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::body::ConnectionId;
use crate::game::lobby::LobbyEvent;
use crate::gateway::{ConnectionChannels, Outbound};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = futures::stream::SplitSink<WebSocket, Message>;
type WsStream = futures::stream::SplitStream<WebSocket>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let channels = state.gateway.connect(conn_id);

    run_session(conn_id, &state, ws_sink, ws_stream, channels).await;

    // A dropped socket is an implicit leave
    state.gateway.disconnect(conn_id);

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: ConnectionId,
    state: &AppState,
    ws_sink: WsSink,
    mut ws_stream: WsStream,
    channels: ConnectionChannels,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    // Spawn writer task: direct replies, lobby feed and lobby list -> WebSocket
    let writer_handle = tokio::spawn(run_writer(conn_id, ws_sink, channels));

    // Reader loop: WebSocket -> gateway
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited inbound message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => state.gateway.handle(conn_id, client_msg).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Forward everything addressed to this connection onto the socket.
/// Direct replies go first so `Init` always precedes the lobby feed it
/// subscribes to.
async fn run_writer(conn_id: ConnectionId, mut ws_sink: WsSink, channels: ConnectionChannels) {
    let ConnectionChannels {
        mut outbound_rx,
        mut lobby_list_rx,
    } = channels;
    let mut lobby_rx: Option<broadcast::Receiver<LobbyEvent>> = None;

    loop {
        let msg = tokio::select! {
            biased;

            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Msg(msg)) => msg,
                Some(Outbound::Subscribe(rx)) => {
                    lobby_rx = Some(rx);
                    continue;
                }
                Some(Outbound::Unsubscribe) => {
                    lobby_rx = None;
                    continue;
                }
                None => break,
            },

            event = next_lobby_event(&mut lobby_rx) => match event {
                Ok(event) if event.is_for(&conn_id) => event.msg,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} lobby messages", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Lobby channel closed");
                    lobby_rx = None;
                    continue;
                }
            },

            list = lobby_list_rx.recv() => match list {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Next event from the joined lobby, or never if not in one
async fn next_lobby_event(
    rx: &mut Option<broadcast::Receiver<LobbyEvent>>,
) -> Result<LobbyEvent, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
