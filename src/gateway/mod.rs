//! Connection-facing side of the lobbies

pub mod service;

pub use service::{ConnectionChannels, Outbound, SessionGateway};
