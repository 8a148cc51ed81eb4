//! Session gateway - turns client intents into lobby operations and routes
//! replies back to connections

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::game::body::{sanitize_player_name, ConnectionId};
use crate::game::error::LobbyError;
use crate::game::lobby::{LobbyEvent, LobbyHandle};
use crate::game::registry::LobbyRegistry;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Strongest putt accepted; anything above is clamped
pub const MAX_POWER: f32 = 20.0;

/// Longest chat line kept, in characters
pub const MAX_CHAT_CHARS: usize = 200;

const OUTBOUND_CAPACITY: usize = 64;
const LOBBY_LIST_CAPACITY: usize = 16;

/// Work for a connection's writer task
#[derive(Debug)]
pub enum Outbound {
    /// Send this message to the client
    Msg(ServerMsg),
    /// Switch the lobby feed to this subscription
    Subscribe(broadcast::Receiver<LobbyEvent>),
    /// Drop the current lobby feed
    Unsubscribe,
}

/// Receiving ends handed to a connection's writer task
pub struct ConnectionChannels {
    pub outbound_rx: mpsc::Receiver<Outbound>,
    pub lobby_list_rx: broadcast::Receiver<ServerMsg>,
}

/// Session gateway
pub struct SessionGateway {
    registry: Arc<LobbyRegistry>,
    /// Open connections
    connections: DashMap<ConnectionId, mpsc::Sender<Outbound>>,
    /// Map of connection -> lobby it has joined
    memberships: DashMap<ConnectionId, String>,
    lobby_list_tx: broadcast::Sender<ServerMsg>,
}

impl SessionGateway {
    pub fn new(registry: Arc<LobbyRegistry>) -> Self {
        let (lobby_list_tx, _) = broadcast::channel(LOBBY_LIST_CAPACITY);
        Self {
            registry,
            connections: DashMap::new(),
            memberships: DashMap::new(),
            lobby_list_tx,
        }
    }

    /// Register a connection (called when the WebSocket opens). The current
    /// lobby list is queued as its first message.
    pub fn connect(&self, conn_id: ConnectionId) -> ConnectionChannels {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let lobby_list_rx = self.lobby_list_tx.subscribe();

        let _ = outbound_tx.try_send(Outbound::Msg(ServerMsg::LobbyList {
            names: self.registry.list_names(),
        }));
        self.connections.insert(conn_id, outbound_tx);

        info!(conn_id = %conn_id, connections = self.connections.len(), "Connection registered");

        ConnectionChannels {
            outbound_rx,
            lobby_list_rx,
        }
    }

    /// Unregister a connection (called when the WebSocket closes). Acts as
    /// a leave for whatever lobby it was in.
    pub fn disconnect(&self, conn_id: ConnectionId) {
        self.leave_current(conn_id);
        self.connections.remove(&conn_id);
        info!(conn_id = %conn_id, "Connection unregistered");
    }

    /// Apply one inbound message
    pub async fn handle(&self, conn_id: ConnectionId, msg: ClientMsg) {
        match msg {
            ClientMsg::CreateLobby { name } => self.create_lobby(conn_id, &name).await,
            ClientMsg::JoinLobby {
                lobby_name,
                player_name,
            } => self.join_lobby(conn_id, &lobby_name, &player_name).await,
            ClientMsg::HitBall {
                lobby_name,
                angle,
                power,
            } => self.hit_ball(conn_id, &lobby_name, angle, power),
            ClientMsg::ContinueNext { lobby_name } => self.continue_next(conn_id, &lobby_name),
            ClientMsg::ChatMessage {
                lobby_name,
                message,
                player_name,
            } => self.chat(conn_id, &lobby_name, &message, &player_name),
        }
    }

    async fn create_lobby(&self, conn_id: ConnectionId, name: &str) {
        match self.registry.create(name) {
            Ok(handle) => {
                self.broadcast_lobby_list();
                self.send(
                    conn_id,
                    ServerMsg::LobbyJoined {
                        lobby_name: handle.name().to_string(),
                    },
                )
                .await;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Create lobby rejected");
                self.send_error(conn_id, e).await;
            }
        }
    }

    async fn join_lobby(&self, conn_id: ConnectionId, lobby_name: &str, player_name: &str) {
        let handle = match self.registry.get(lobby_name) {
            Ok(handle) => handle,
            Err(e) => {
                self.send_error(conn_id, e).await;
                return;
            }
        };

        // One lobby per connection: switching lobbies leaves the old one
        let current = self.memberships.get(&conn_id).map(|m| m.value().clone());
        if current.as_deref().is_some_and(|name| name != handle.name()) {
            self.leave_current(conn_id);
            self.send_outbound(conn_id, Outbound::Unsubscribe).await;
        }

        match handle.join(conn_id, player_name) {
            Ok((init, events_rx)) => {
                self.memberships.insert(conn_id, handle.name().to_string());
                self.send(conn_id, init).await;
                self.send_outbound(conn_id, Outbound::Subscribe(events_rx))
                    .await;
            }
            Err(e) => {
                // Lobby was destroyed between lookup and join
                self.memberships.remove(&conn_id);
                self.send_error(conn_id, e).await;
            }
        }
    }

    fn hit_ball(&self, conn_id: ConnectionId, lobby_name: &str, angle: f32, power: f32) {
        if !angle.is_finite() || !power.is_finite() {
            warn!(conn_id = %conn_id, "Dropped hit with non-finite input");
            return;
        }
        let power = power.clamp(0.0, MAX_POWER);

        match self.joined_lobby(conn_id, lobby_name) {
            Ok(handle) => {
                handle.hit(&conn_id, angle, power);
            }
            Err(e) => debug!(conn_id = %conn_id, error = %e, "Hit ignored"),
        }
    }

    fn continue_next(&self, conn_id: ConnectionId, lobby_name: &str) {
        match self.joined_lobby(conn_id, lobby_name) {
            Ok(handle) => {
                handle.continue_round();
            }
            Err(e) => debug!(conn_id = %conn_id, error = %e, "Continue ignored"),
        }
    }

    fn chat(&self, conn_id: ConnectionId, lobby_name: &str, message: &str, player_name: &str) {
        let handle = match self.joined_lobby(conn_id, lobby_name) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Chat ignored");
                return;
            }
        };

        let message: String = message.trim().chars().take(MAX_CHAT_CHARS).collect();
        if message.is_empty() {
            return;
        }

        // Prefer the name the lobby knows over whatever the client claims
        let player_name = handle
            .inspect(|lobby| lobby.body(&conn_id).map(|b| b.name.clone()))
            .unwrap_or_else(|| sanitize_player_name(player_name));

        handle.chat(player_name, message);
    }

    /// Resolve a lobby the connection is allowed to act on
    fn joined_lobby(&self, conn_id: ConnectionId, lobby_name: &str) -> Result<LobbyHandle, LobbyError> {
        let member_of = self
            .memberships
            .get(&conn_id)
            .map(|m| m.value().clone())
            .ok_or(LobbyError::NotAuthorizedForAction)?;

        let handle = self.registry.get(lobby_name)?;
        if handle.name() != member_of {
            return Err(LobbyError::NotAuthorizedForAction);
        }
        Ok(handle)
    }

    /// Remove the connection from its lobby, destroying the lobby if it
    /// was the last player
    fn leave_current(&self, conn_id: ConnectionId) {
        let Some((_, lobby_name)) = self.memberships.remove(&conn_id) else {
            return;
        };
        let Ok(handle) = self.registry.get(&lobby_name) else {
            return;
        };

        if handle.leave(&conn_id) == Some(0) && self.registry.remove_if_empty(&handle) {
            self.broadcast_lobby_list();
        }
    }

    /// Send the lobby list to every open connection, including players
    /// already inside a lobby
    fn broadcast_lobby_list(&self) {
        let names = self.registry.list_names();
        debug!(lobbies = names.len(), "Broadcasting lobby list");
        // No receivers just means nobody is connected
        let _ = self.lobby_list_tx.send(ServerMsg::LobbyList { names });
    }

    async fn send_error(&self, conn_id: ConnectionId, error: LobbyError) {
        self.send(
            conn_id,
            ServerMsg::LobbyError {
                message: error.to_string(),
            },
        )
        .await;
    }

    async fn send(&self, conn_id: ConnectionId, msg: ServerMsg) {
        self.send_outbound(conn_id, Outbound::Msg(msg)).await;
    }

    async fn send_outbound(&self, conn_id: ConnectionId, outbound: Outbound) {
        // Clone the sender so no map guard is held across the await
        let Some(tx) = self.connections.get(&conn_id).map(|c| c.value().clone()) else {
            return;
        };
        if tx.send(outbound).await.is_err() {
            debug!(conn_id = %conn_id, "Outbound channel closed");
        }
    }

    /// Lobby a connection has joined, if any
    pub fn lobby_of(&self, conn_id: &ConnectionId) -> Option<String> {
        self.memberships.get(conn_id).map(|m| m.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
