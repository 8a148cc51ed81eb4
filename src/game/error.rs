//! Per-intent failures. None of these are fatal to the server.

/// Errors raised by lobby and registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby name is invalid.")]
    InvalidName,

    #[error("Lobby name already taken.")]
    NameTaken,

    #[error("Lobby does not exist.")]
    LobbyNotFound,

    #[error("Not allowed to act on this lobby.")]
    NotAuthorizedForAction,
}
