//! Relay-side game sessions: who plays whom with which colour, and how it
//! ended. Board state lives only on the clients.

use std::collections::HashMap;

use chapayev_shared::board::{Outcome, Team};
use chapayev_shared::protocol::GameResult;

use crate::broker::Pairing;
use crate::directory::ConnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    pub id: SessionId,
    pub white: ConnId,
    pub red: ConnId,
    /// First reported result; later conflicting reports are only logged
    pub outcome: Option<Outcome>,
}

impl GameSession {
    pub fn color_of(&self, player: ConnId) -> Option<Team> {
        if player == self.white {
            Some(Team::White)
        } else if player == self.red {
            Some(Team::Red)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, player: ConnId) -> Option<ConnId> {
        match self.color_of(player)? {
            Team::White => Some(self.red),
            Team::Red => Some(self.white),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

/// A result report to pass on to the other player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultForward {
    pub to: ConnId,
    /// The report mirrored to the receiver's point of view
    pub result: GameResult,
}

#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, GameSession>,
    by_player: HashMap<ConnId, SessionId>,
    next_id: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `player` is in a session that has not ended yet
    pub fn is_busy(&self, player: ConnId) -> bool {
        self.session_of(player).is_some_and(|s| !s.is_finished())
    }

    /// Open a session for a broker pairing. Finished sessions of either
    /// player are discarded; a player still in an unfinished one makes
    /// this fail with that player's id.
    pub fn start(&mut self, pairing: Pairing) -> Result<SessionId, ConnId> {
        if let Some(&busy) = pairing.players().iter().find(|&&p| self.is_busy(p)) {
            return Err(busy);
        }
        for player in pairing.players() {
            if let Some(old) = self.by_player.remove(&player) {
                self.drop_session(old);
            }
        }

        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.sessions.insert(
            id,
            GameSession {
                id,
                white: pairing.white,
                red: pairing.red,
                outcome: None,
            },
        );
        self.by_player.insert(pairing.white, id);
        self.by_player.insert(pairing.red, id);
        Ok(id)
    }

    pub fn session_of(&self, player: ConnId) -> Option<&GameSession> {
        self.by_player
            .get(&player)
            .and_then(|id| self.sessions.get(id))
    }

    pub fn opponent_of(&self, player: ConnId) -> Option<ConnId> {
        self.session_of(player)?.opponent_of(player)
    }

    /// Record `player`'s view of how the game ended. Returns the report to
    /// forward to the opponent, or `None` if `player` is not in a session.
    pub fn record_result(&mut self, player: ConnId, result: GameResult) -> Option<ResultForward> {
        let id = *self.by_player.get(&player)?;
        let session = self.sessions.get_mut(&id)?;
        let team = session.color_of(player)?;
        let to = session.opponent_of(player)?;

        let claimed = match result {
            GameResult::Won => Outcome::Winner(team),
            GameResult::Lost => Outcome::Winner(team.opponent()),
            GameResult::Draw => Outcome::Draw,
        };
        match session.outcome {
            None => {
                session.outcome = Some(claimed);
                tracing::info!(session = id.0, ?claimed, "game finished");
            }
            Some(recorded) if recorded != claimed => {
                tracing::warn!(session = id.0, ?recorded, ?claimed, "players disagree on the result");
            }
            Some(_) => {}
        }

        Some(ResultForward {
            to,
            result: result.mirrored(),
        })
    }

    /// Tear down `player`'s session. Returns the ended session and whoever
    /// is left in it.
    pub fn end_for(&mut self, player: ConnId) -> Option<(GameSession, ConnId)> {
        let id = self.by_player.remove(&player)?;
        let session = self.drop_session(id)?;
        let survivor = session.opponent_of(player)?;
        Some((session, survivor))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn drop_session(&mut self, id: SessionId) -> Option<GameSession> {
        let session = self.sessions.remove(&id)?;
        for player in [session.white, session.red] {
            if self.by_player.get(&player) == Some(&id) {
                self.by_player.remove(&player);
            }
        }
        Some(session)
    }
}
