//! The simulated ball owned by one joined connection

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed spawn point for every ball at the start of a round
pub const SPAWN_X: f32 = 100.0;
pub const SPAWN_Y: f32 = 300.0;

/// Ball radius
pub const BODY_RADIUS: f32 = 10.0;

/// Colors handed out to joining players
pub const BALL_COLORS: [&str; 9] = [
    "blue", "red", "purple", "orange", "yellow", "pink", "lime", "cyan", "magenta",
];

/// Name used when a player joins without one
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Longest display name kept, in characters
pub const MAX_PLAYER_NAME_CHARS: usize = 24;

/// Connection identity; doubles as the body id inside a lobby
pub type ConnectionId = Uuid;

/// Authoritative ball state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: ConnectionId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub color: String,
    pub name: String,
    pub shots: u32,
    pub finished: bool,
}

impl Body {
    pub fn new(id: ConnectionId, name: &str, color: &str) -> Self {
        Self {
            id,
            x: SPAWN_X,
            y: SPAWN_Y,
            vx: 0.0,
            vy: 0.0,
            radius: BODY_RADIUS,
            color: color.to_string(),
            name: sanitize_player_name(name),
            shots: 0,
            finished: false,
        }
    }

    /// Put the ball back on the tee for a new round
    pub fn reset_to_spawn(&mut self) {
        self.x = SPAWN_X;
        self.y = SPAWN_Y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.shots = 0;
        self.finished = false;
    }

    /// Drop into the hole. A sunk ball never moves again this round.
    pub fn sink(&mut self) {
        self.finished = true;
        self.vx = 0.0;
        self.vy = 0.0;
    }
}

/// Trim and cap a display name, falling back to the default
pub fn sanitize_player_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_PLAYER_NAME.to_string();
    }
    trimmed.chars().take(MAX_PLAYER_NAME_CHARS).collect()
}
