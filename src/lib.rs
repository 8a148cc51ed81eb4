//! Authoritative multiplayer mini-golf server.
//!
//! Lobbies each own a course and a set of balls. A single [`game::TickDriver`]
//! steps every lobby at a fixed rate, and the [`gateway::SessionGateway`]
//! maps WebSocket messages onto lobby operations and fans results back out.

pub mod app;
pub mod config;
pub mod game;
pub mod gateway;
pub mod http;
pub mod util;
pub mod ws;
