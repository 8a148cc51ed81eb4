//! Lobby simulation modules

pub mod body;
pub mod collision;
pub mod course;
pub mod driver;
pub mod error;
pub mod lobby;
pub mod physics;
pub mod registry;

pub use driver::TickDriver;
pub use lobby::{LobbyHandle, RoundPhase};
pub use registry::LobbyRegistry;
