//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::body::{Body, ConnectionId};
use crate::game::course::Course;

/// All bodies of a lobby keyed by connection id
pub type PlayerMap = HashMap<ConnectionId, Body>;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Create a new, empty lobby
    CreateLobby { name: String },

    /// Join an existing lobby with a display name
    JoinLobby {
        lobby_name: String,
        #[serde(default)]
        player_name: String,
    },

    /// Putt the ball
    HitBall {
        lobby_name: String,
        /// Direction in radians
        angle: f32,
        power: f32,
    },

    /// Start the next round after the scoreboard
    ContinueNext { lobby_name: String },

    /// Chat line for everyone in the lobby
    ChatMessage {
        lobby_name: String,
        message: String,
        #[serde(default)]
        player_name: String,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Names of every open lobby
    LobbyList { names: Vec<String> },

    /// A create or join request failed
    LobbyError { message: String },

    /// Lobby was created; the client may now join it
    LobbyJoined { lobby_name: String },

    /// Full snapshot for a connection that just joined
    Init {
        players: PlayerMap,
        course: Course,
        my_id: ConnectionId,
        lobby_name: String,
    },

    PlayerJoined { id: ConnectionId, player: Body },

    PlayerLeft { id: ConnectionId },

    /// Per-tick positions
    State { players: PlayerMap },

    /// Every ball is in the hole
    ScoreBoard {
        scoreboard: Vec<ScoreEntry>,
        winner: String,
    },

    /// A new round started on a fresh course
    NewMap { course: Course, players: PlayerMap },

    ChatMessage { player_name: String, message: String },
}

/// One scoreboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub shots: u32,
}
