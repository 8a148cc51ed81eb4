//! Lobby state, round lifecycle and the locked handle shared by the driver
//! and the gateway

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::ws::protocol::{PlayerMap, ScoreEntry, ServerMsg};

use super::body::{Body, ConnectionId, BALL_COLORS};
use super::course::{self, Course};
use super::error::LobbyError;
use super::physics::PhysicsSystem;

/// Buffered fan-out messages per lobby before slow receivers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Balls are in play
    Active,
    /// Every ball is sunk; scoreboard shown until someone continues
    Ended,
}

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub body: Body,
    pub players: PlayerMap,
    pub course: Course,
}

/// Final standings for a round
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBoard {
    pub entries: Vec<ScoreEntry>,
    pub winner: String,
}

/// What one simulation step produced
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub players: PlayerMap,
    /// Set only on the tick the round ends
    pub scoreboard: Option<ScoreBoard>,
}

/// A freshly started round
#[derive(Debug, Clone)]
pub struct NewRound {
    pub course: Course,
    pub players: PlayerMap,
}

/// One game session. Pure state: no I/O, no locking.
#[derive(Debug)]
pub struct Lobby {
    name: String,
    course: Course,
    bodies: HashMap<ConnectionId, Body>,
    phase: RoundPhase,
    rng: ChaCha8Rng,
    closed: bool,
}

impl Lobby {
    /// Create a lobby whose courses and colors come from `seed`
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let course = course::generate(&mut rng);
        Self::from_parts(name.into(), course, rng)
    }

    /// Create a lobby on a fixed first course
    #[cfg(test)]
    pub fn with_course(name: impl Into<String>, course: Course, seed: u64) -> Self {
        Self::from_parts(name.into(), course, ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_parts(name: String, course: Course, rng: ChaCha8Rng) -> Self {
        Self {
            name,
            course,
            bodies: HashMap::new(),
            phase: RoundPhase::Active,
            rng,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn body(&self, id: &ConnectionId) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the lobby as destroyed so late joins are refused
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Copy of every body keyed by id
    pub fn players(&self) -> PlayerMap {
        self.bodies.clone()
    }

    /// Add a ball for `id` on the tee. Joining while the scoreboard is up
    /// parks the ball as sunk until the next round so the round stays ended.
    pub fn join(&mut self, id: ConnectionId, player_name: &str) -> Result<JoinOutcome, LobbyError> {
        if self.closed {
            return Err(LobbyError::LobbyNotFound);
        }

        let color = BALL_COLORS[self.rng.gen_range(0..BALL_COLORS.len())];
        let mut body = Body::new(id, player_name, color);
        if self.phase == RoundPhase::Ended {
            body.finished = true;
        }

        self.bodies.insert(id, body.clone());

        Ok(JoinOutcome {
            body,
            players: self.players(),
            course: self.course.clone(),
        })
    }

    /// Remove a ball. Unknown ids are ignored.
    pub fn leave(&mut self, id: &ConnectionId) -> Option<Body> {
        self.bodies.remove(id)
    }

    /// Putt. Returns false, changing nothing, when the round is over, the
    /// ball is already sunk, or the id is unknown.
    pub fn apply_impulse(&mut self, id: &ConnectionId, angle: f32, power: f32) -> bool {
        if self.phase != RoundPhase::Active {
            return false;
        }
        match self.bodies.get_mut(id) {
            Some(body) if !body.finished => {
                PhysicsSystem::apply_impulse(body, angle, power);
                body.shots += 1;
                true
            }
            _ => false,
        }
    }

    /// Advance every ball one step and end the round once all are sunk.
    /// Returns `None` for an empty lobby.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        if self.bodies.is_empty() {
            return None;
        }

        let course = &self.course;
        for body in self.bodies.values_mut() {
            PhysicsSystem::step_body(body, course);
        }

        let scoreboard = if self.phase == RoundPhase::Active && self.all_finished() {
            self.phase = RoundPhase::Ended;
            Some(self.scoreboard())
        } else {
            None
        };

        Some(TickOutcome {
            players: self.players(),
            scoreboard,
        })
    }

    /// Start the next round on a new course. No-op unless the round ended.
    pub fn continue_round(&mut self) -> Option<NewRound> {
        if self.phase != RoundPhase::Ended {
            return None;
        }

        self.course = course::generate(&mut self.rng);
        for body in self.bodies.values_mut() {
            body.reset_to_spawn();
        }
        self.phase = RoundPhase::Active;

        Some(NewRound {
            course: self.course.clone(),
            players: self.players(),
        })
    }

    fn all_finished(&self) -> bool {
        !self.bodies.is_empty() && self.bodies.values().all(|b| b.finished)
    }

    /// Fewest shots first. Equal shot counts keep map iteration order,
    /// which is arbitrary.
    fn scoreboard(&self) -> ScoreBoard {
        let mut ranked: Vec<&Body> = self.bodies.values().collect();
        ranked.sort_by_key(|b| b.shots);

        let entries: Vec<ScoreEntry> = ranked
            .iter()
            .map(|b| ScoreEntry {
                name: b.name.clone(),
                shots: b.shots,
            })
            .collect();
        let winner = entries.first().map(|e| e.name.clone()).unwrap_or_default();

        ScoreBoard { entries, winner }
    }
}

/// Message fanned out to every connection subscribed to a lobby
#[derive(Debug, Clone)]
pub struct LobbyEvent {
    /// Connection that must not receive this message
    pub skip: Option<ConnectionId>,
    pub msg: ServerMsg,
}

impl LobbyEvent {
    fn to_all(msg: ServerMsg) -> Self {
        Self { skip: None, msg }
    }

    /// Whether the connection `id` should receive this event
    pub fn is_for(&self, id: &ConnectionId) -> bool {
        self.skip.as_ref() != Some(id)
    }
}

/// Shared handle to a lobby.
///
/// Every operation runs inside the lobby's mutex and publishes its
/// broadcast before releasing it, so subscribers see events in the order
/// they were applied. The lock is never held across an await.
#[derive(Clone)]
pub struct LobbyHandle {
    name: Arc<str>,
    lobby: Arc<Mutex<Lobby>>,
    events_tx: broadcast::Sender<LobbyEvent>,
}

impl LobbyHandle {
    pub fn new(lobby: Lobby) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            name: Arc::from(lobby.name()),
            lobby: Arc::new(Mutex::new(lobby)),
            events_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn player_count(&self) -> usize {
        self.lobby.lock().len()
    }

    /// Whether both handles point at the same lobby instance, not just the
    /// same name
    pub fn is_same(&self, other: &LobbyHandle) -> bool {
        Arc::ptr_eq(&self.lobby, &other.lobby)
    }

    /// Run a read-only closure against the locked lobby
    pub fn inspect<T>(&self, f: impl FnOnce(&Lobby) -> T) -> T {
        f(&self.lobby.lock())
    }

    /// Add a player. Returns the `Init` message for the joiner plus a
    /// subscription that starts right after it; everyone else gets
    /// `PlayerJoined`.
    pub fn join(
        &self,
        id: ConnectionId,
        player_name: &str,
    ) -> Result<(ServerMsg, broadcast::Receiver<LobbyEvent>), LobbyError> {
        let mut lobby = self.lobby.lock();
        let outcome = lobby.join(id, player_name)?;

        self.publish(LobbyEvent {
            skip: Some(id),
            msg: ServerMsg::PlayerJoined {
                id,
                player: outcome.body.clone(),
            },
        });
        let events_rx = self.events_tx.subscribe();

        info!(
            lobby = %self.name,
            conn_id = %id,
            player_name = %outcome.body.name,
            player_count = lobby.len(),
            "Player joined lobby"
        );

        let init = ServerMsg::Init {
            players: outcome.players,
            course: outcome.course,
            my_id: id,
            lobby_name: self.name.to_string(),
        };
        Ok((init, events_rx))
    }

    /// Remove a player. Returns how many remain, or `None` if the id was not
    /// in this lobby.
    pub fn leave(&self, id: &ConnectionId) -> Option<usize> {
        let mut lobby = self.lobby.lock();
        lobby.leave(id)?;
        self.publish(LobbyEvent::to_all(ServerMsg::PlayerLeft { id: *id }));

        info!(
            lobby = %self.name,
            conn_id = %id,
            player_count = lobby.len(),
            "Player left lobby"
        );
        Some(lobby.len())
    }

    pub fn hit(&self, id: &ConnectionId, angle: f32, power: f32) -> bool {
        let mut lobby = self.lobby.lock();
        let applied = lobby.apply_impulse(id, angle, power);
        if !applied {
            debug!(lobby = %self.name, conn_id = %id, phase = ?lobby.phase(), "Hit ignored");
        }
        applied
    }

    /// One simulation step plus its broadcasts. Returns false when the lobby
    /// was empty and nothing ran.
    pub fn tick(&self) -> bool {
        let mut lobby = self.lobby.lock();
        let Some(outcome) = lobby.tick() else {
            return false;
        };

        self.publish(LobbyEvent::to_all(ServerMsg::State {
            players: outcome.players,
        }));

        if let Some(scoreboard) = outcome.scoreboard {
            info!(lobby = %self.name, winner = %scoreboard.winner, "Round ended");
            self.publish(LobbyEvent::to_all(ServerMsg::ScoreBoard {
                scoreboard: scoreboard.entries,
                winner: scoreboard.winner,
            }));
        }
        true
    }

    pub fn continue_round(&self) -> bool {
        let mut lobby = self.lobby.lock();
        let Some(round) = lobby.continue_round() else {
            return false;
        };

        info!(lobby = %self.name, "New round started");
        self.publish(LobbyEvent::to_all(ServerMsg::NewMap {
            course: round.course,
            players: round.players,
        }));
        true
    }

    /// Relay a chat line to everyone in the lobby, sender included
    pub fn chat(&self, player_name: String, message: String) {
        let _lobby = self.lobby.lock();
        self.publish(LobbyEvent::to_all(ServerMsg::ChatMessage {
            player_name,
            message,
        }));
    }

    /// Close the lobby if nobody is in it. Returns true if it was closed.
    pub fn close_if_empty(&self) -> bool {
        let mut lobby = self.lobby.lock();
        if lobby.is_empty() {
            lobby.close();
            true
        } else {
            false
        }
    }

    fn publish(&self, event: LobbyEvent) {
        // No receivers is fine: nobody is listening yet
        let _ = self.events_tx.send(event);
    }
}

impl fmt::Debug for LobbyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobbyHandle")
            .field("name", &self.name)
            .field("subscribers", &self.events_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::body::{SPAWN_X, SPAWN_Y};
    use crate::game::course::Hole;
    use uuid::Uuid;

    fn open_course() -> Course {
        Course::empty(
            800.0,
            600.0,
            Hole {
                x: 700.0,
                y: 300.0,
                radius: 15.0,
            },
        )
    }

    fn lobby() -> Lobby {
        Lobby::with_course("cup", open_course(), 3)
    }

    /// Drive a ball straight into the hole at (700, 300)
    fn sink(lobby: &mut Lobby, id: &ConnectionId) -> Option<TickOutcome> {
        assert!(lobby.apply_impulse(id, 0.0, 20.0));
        let mut last = None;
        for _ in 0..200 {
            last = lobby.tick();
            if lobby.body(id).map(|b| b.finished).unwrap_or(true) {
                break;
            }
            // Top up speed so the ball always reaches the hole
            if lobby.body(id).map(|b| b.vx < 2.0).unwrap_or(false) {
                lobby.apply_impulse(id, 0.0, 20.0);
            }
        }
        assert!(lobby.body(id).unwrap().finished);
        last
    }

    #[test]
    fn join_places_ball_on_tee() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        let outcome = lobby.join(ann, "Ann").unwrap();

        assert_eq!((outcome.body.x, outcome.body.y), (SPAWN_X, SPAWN_Y));
        assert_eq!(outcome.body.shots, 0);
        assert!(BALL_COLORS.contains(&outcome.body.color.as_str()));
        assert_eq!(outcome.players.len(), 1);
        assert_eq!(outcome.course, open_course());
    }

    #[test]
    fn hit_then_tick_moves_ball() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();

        assert!(lobby.apply_impulse(&ann, 0.0, 5.0));
        let outcome = lobby.tick().unwrap();

        let body = &outcome.players[&ann];
        assert!((body.x - 105.0).abs() < 1e-4);
        assert!((body.vx - 4.85).abs() < 1e-4);
        assert_eq!(body.shots, 1);
        assert!(outcome.scoreboard.is_none());
    }

    #[test]
    fn impulse_ignored_for_unknown_or_sunk_ball() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        lobby.join(bob, "Bob").unwrap();

        assert!(!lobby.apply_impulse(&Uuid::new_v4(), 0.0, 5.0));

        sink(&mut lobby, &ann);
        let before = lobby.body(&ann).cloned();
        assert!(!lobby.apply_impulse(&ann, 1.0, 5.0));
        assert_eq!(lobby.body(&ann).cloned(), before);
    }

    #[test]
    fn impulse_ignored_after_round_ends() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        sink(&mut lobby, &ann);
        assert_eq!(lobby.phase(), RoundPhase::Ended);

        let before = lobby.body(&ann).cloned();
        assert!(!lobby.apply_impulse(&ann, 0.0, 5.0));
        assert_eq!(lobby.body(&ann).cloned(), before);
    }

    #[test]
    fn round_ends_only_when_every_ball_is_sunk() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        lobby.join(bob, "Bob").unwrap();

        let outcome = sink(&mut lobby, &ann).unwrap();
        assert!(outcome.scoreboard.is_none());
        assert_eq!(lobby.phase(), RoundPhase::Active);

        // Extra putts for Bob so the winner is unambiguous
        assert!(lobby.apply_impulse(&bob, 0.0, 0.5));
        lobby.tick();
        let outcome = sink(&mut lobby, &bob).unwrap();

        let scoreboard = outcome.scoreboard.expect("scoreboard on final sink");
        assert_eq!(lobby.phase(), RoundPhase::Ended);
        assert_eq!(scoreboard.entries.len(), 2);
        assert_eq!(scoreboard.winner, "Ann");
        assert!(scoreboard.entries[0].shots <= scoreboard.entries[1].shots);

        // Scoreboard fires once
        for _ in 0..5 {
            assert!(lobby.tick().unwrap().scoreboard.is_none());
        }
    }

    #[test]
    fn empty_lobby_does_not_tick_or_end() {
        let mut lobby = lobby();
        assert!(lobby.tick().is_none());
        assert_eq!(lobby.phase(), RoundPhase::Active);
    }

    #[test]
    fn continue_is_noop_while_active() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        lobby.apply_impulse(&ann, 0.5, 3.0);
        lobby.tick();

        let before = lobby.body(&ann).cloned();
        assert!(lobby.continue_round().is_none());
        assert_eq!(lobby.body(&ann).cloned(), before);
        assert_eq!(lobby.course(), &open_course());
    }

    #[test]
    fn continue_resets_bodies_and_course() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        sink(&mut lobby, &ann);

        let round = lobby.continue_round().expect("round ended");

        assert_eq!(lobby.phase(), RoundPhase::Active);
        assert_ne!(round.course, open_course());
        assert_eq!(lobby.course(), &round.course);
        let body = &round.players[&ann];
        assert_eq!((body.x, body.y, body.vx, body.vy), (SPAWN_X, SPAWN_Y, 0.0, 0.0));
        assert_eq!(body.shots, 0);
        assert!(!body.finished);
    }

    #[test]
    fn late_joiner_waits_for_next_round() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        sink(&mut lobby, &ann);

        let bob = Uuid::new_v4();
        let outcome = lobby.join(bob, "Bob").unwrap();
        assert!(outcome.body.finished);
        assert_eq!(lobby.phase(), RoundPhase::Ended);

        let round = lobby.continue_round().unwrap();
        assert!(!round.players[&bob].finished);
    }

    #[test]
    fn leaving_last_unsunk_player_ends_round_on_next_tick() {
        let mut lobby = lobby();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        lobby.join(ann, "Ann").unwrap();
        lobby.join(bob, "Bob").unwrap();
        sink(&mut lobby, &ann);

        assert!(lobby.leave(&bob).is_some());
        assert!(lobby.leave(&bob).is_none());
        let outcome = lobby.tick().unwrap();
        assert_eq!(outcome.scoreboard.unwrap().winner, "Ann");
    }

    #[test]
    fn closed_lobby_refuses_joins() {
        let mut lobby = lobby();
        lobby.close();
        assert_eq!(
            lobby.join(Uuid::new_v4(), "Ann").unwrap_err(),
            LobbyError::LobbyNotFound
        );
    }

    #[tokio::test]
    async fn handle_publishes_in_order() {
        let handle = LobbyHandle::new(lobby());
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (init, mut ann_rx) = handle.join(ann, "Ann").unwrap();
        assert!(matches!(init, ServerMsg::Init { my_id, .. } if my_id == ann));

        let (_, _bob_rx) = handle.join(bob, "Bob").unwrap();
        let event = ann_rx.recv().await.unwrap();
        assert!(event.is_for(&ann));
        assert!(!event.is_for(&bob));
        assert!(matches!(event.msg, ServerMsg::PlayerJoined { id, .. } if id == bob));

        assert!(handle.hit(&ann, 0.0, 5.0));
        assert!(handle.tick());
        let event = ann_rx.recv().await.unwrap();
        match event.msg {
            ServerMsg::State { players } => assert_eq!(players[&ann].shots, 1),
            other => panic!("expected state, got {:?}", other),
        }

        handle.chat("Ann".to_string(), "hi".to_string());
        let event = ann_rx.recv().await.unwrap();
        assert!(matches!(event.msg, ServerMsg::ChatMessage { ref message, .. } if message == "hi"));

        assert_eq!(handle.leave(&bob), Some(1));
        let event = ann_rx.recv().await.unwrap();
        assert!(matches!(event.msg, ServerMsg::PlayerLeft { id } if id == bob));
        assert_eq!(handle.leave(&bob), None);
    }

    #[test]
    fn close_if_empty_only_closes_empty_lobbies() {
        let handle = LobbyHandle::new(lobby());
        let ann = Uuid::new_v4();
        handle.join(ann, "Ann").unwrap();
        assert!(!handle.close_if_empty());

        handle.leave(&ann);
        assert!(handle.close_if_empty());
        assert!(handle.inspect(|l| l.is_closed()));
        assert!(handle.join(Uuid::new_v4(), "Bob").is_err());
    }
}
