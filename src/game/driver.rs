//! Global fixed-rate tick driver

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{tick_duration, Timer};

use super::registry::LobbyRegistry;

/// Advances every lobby once per tick.
///
/// Each lobby is locked only for its own step, and publishing to a lobby's
/// channel never waits on receivers, so a slow connection cannot hold up
/// any other lobby.
pub struct TickDriver {
    registry: Arc<LobbyRegistry>,
    tick_rate: u32,
    tick: u64,
}

impl TickDriver {
    pub fn new(registry: Arc<LobbyRegistry>, tick_rate: u32) -> Self {
        Self {
            registry,
            tick_rate,
            tick: 0,
        }
    }

    /// Run one pass over every lobby. Returns how many lobbies stepped.
    pub fn tick_all(&mut self) -> usize {
        self.tick += 1;

        let mut stepped = 0;
        for handle in self.registry.handles() {
            if handle.tick() {
                stepped += 1;
            }
        }
        stepped
    }

    /// Tick until `shutdown` flips to true or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let budget = tick_duration(self.tick_rate);
        let mut tick_interval = interval(budget);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(tick_rate = self.tick_rate, "Tick driver started");

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let timer = Timer::new();
            let stepped = self.tick_all();
            let elapsed = timer.elapsed();

            if elapsed > budget {
                warn!(
                    tick = self.tick,
                    lobbies = stepped,
                    elapsed_micros = timer.elapsed_micros(),
                    "Tick pass overran its budget"
                );
            } else if self.tick % (u64::from(self.tick_rate) * 60) == 0 {
                debug!(tick = self.tick, lobbies = stepped, "Tick driver heartbeat");
            }
        }

        info!(tick = self.tick, "Tick driver stopped");
    }
}
