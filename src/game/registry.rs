//! Registry of all open lobbies, keyed by name

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::error::LobbyError;
use super::lobby::{Lobby, LobbyHandle};

/// Longest accepted lobby name, in characters
pub const MAX_LOBBY_NAME_CHARS: usize = 32;

/// Registry of all open lobbies
pub struct LobbyRegistry {
    lobbies: DashMap<String, LobbyHandle>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self {
            lobbies: DashMap::new(),
        }
    }

    /// Open a new empty lobby with a random seed
    pub fn create(&self, name: &str) -> Result<LobbyHandle, LobbyError> {
        self.create_seeded(name, rand::random::<u64>())
    }

    /// Open a new empty lobby whose courses derive from `seed`
    pub fn create_seeded(&self, name: &str, seed: u64) -> Result<LobbyHandle, LobbyError> {
        let name = validate_name(name)?;

        match self.lobbies.entry(name.to_string()) {
            Entry::Occupied(_) => Err(LobbyError::NameTaken),
            Entry::Vacant(slot) => {
                let handle = LobbyHandle::new(Lobby::new(name, seed));
                slot.insert(handle.clone());
                info!(lobby = %name, "Lobby created");
                Ok(handle)
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<LobbyHandle, LobbyError> {
        self.lobbies
            .get(name.trim())
            .map(|l| l.value().clone())
            .ok_or(LobbyError::LobbyNotFound)
    }

    pub fn remove(&self, name: &str) -> Option<LobbyHandle> {
        let removed = self.lobbies.remove(name).map(|(_, h)| h);
        if removed.is_some() {
            info!(lobby = %name, "Lobby removed");
        }
        removed
    }

    /// Destroy the lobby behind `handle` if it has no players left. The
    /// emptiness check and the removal happen under the same shard lock, and
    /// the lobby is closed so a join racing with this call fails instead of
    /// reviving it. A newer lobby that reuses the name is left alone.
    pub fn remove_if_empty(&self, handle: &LobbyHandle) -> bool {
        let removed = self
            .lobbies
            .remove_if(handle.name(), |_, current| {
                current.is_same(handle) && current.close_if_empty()
            })
            .is_some();
        if removed {
            info!(lobby = %handle.name(), "Empty lobby removed");
        }
        removed
    }

    /// Lobby names in alphabetical order
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lobbies.iter().map(|l| l.key().clone()).collect();
        names.sort();
        names
    }

    /// Clone every handle so callers can work without holding shard locks
    pub fn handles(&self) -> Vec<LobbyHandle> {
        self.lobbies.iter().map(|l| l.value().clone()).collect()
    }

    pub fn active_lobbies(&self) -> usize {
        self.lobbies.len()
    }

    pub fn total_players(&self) -> usize {
        self.lobbies
            .iter()
            .map(|l| l.value().player_count())
            .sum()
    }
}

impl Default for LobbyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(raw: &str) -> Result<&str, LobbyError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_LOBBY_NAME_CHARS {
        return Err(LobbyError::InvalidName);
    }
    Ok(name)
}
