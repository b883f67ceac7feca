//! Invite / accept / decline arbitration.
//!
//! Pending invites are directed edges `host -> guest`. Two players inviting
//! each other are paired on the spot; otherwise the guest has to accept.
//! Pairing clears every pending invite of both players.

use std::collections::BTreeSet;

use chapayev_shared::board::Team;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::directory::{ConnId, PlayerDirectory};

/// Two players about to start a game, colours assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub white: ConnId,
    pub red: ConnId,
}

impl Pairing {
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

    pub fn players(&self) -> [ConnId; 2] {
        [self.white, self.red]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteOutcome {
    /// Unknown player or self-invite; nothing recorded
    Rejected,
    /// Invite recorded; the guest has to answer
    Pending,
    /// The guest had already invited the host
    Paired(Pairing),
}

pub struct MatchBroker {
    edges: BTreeSet<(ConnId, ConnId)>,
    rng: ChaCha8Rng,
}

impl MatchBroker {
    pub fn new(rng_seed: u64) -> Self {
        Self {
            edges: BTreeSet::new(),
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
        }
    }

    pub fn invite(&mut self, dir: &PlayerDirectory, host: ConnId, guest: ConnId) -> InviteOutcome {
        if host == guest || !dir.contains(host) || !dir.contains(guest) {
            return InviteOutcome::Rejected;
        }
        if self.edges.contains(&(guest, host)) {
            return InviteOutcome::Paired(self.pair(guest, host));
        }
        self.edges.insert((host, guest));
        InviteOutcome::Pending
    }

    /// `guest` accepts `host`'s invite.
    pub fn accept(&mut self, host: ConnId, guest: ConnId) -> Option<Pairing> {
        if !self.edges.contains(&(host, guest)) {
            return None;
        }
        Some(self.pair(host, guest))
    }

    /// `guest` turns down `host`'s invite. Only that one edge goes away.
    pub fn decline(&mut self, host: ConnId, guest: ConnId) -> bool {
        self.edges.remove(&(host, guest))
    }

    /// Drop every invite to or from a player.
    pub fn forget(&mut self, player: ConnId) {
        self.edges.retain(|&(h, g)| h != player && g != player);
    }

    /// Hosts with a pending invite to `guest`
    pub fn pending_for(&self, guest: ConnId) -> Vec<ConnId> {
        self.edges
            .iter()
            .filter(|&&(_, g)| g == guest)
            .map(|&(h, _)| h)
            .collect()
    }

    pub fn is_pending(&self, host: ConnId, guest: ConnId) -> bool {
        self.edges.contains(&(host, guest))
    }

    pub fn pending_count(&self) -> usize {
        self.edges.len()
    }

    fn pair(&mut self, host: ConnId, guest: ConnId) -> Pairing {
        self.forget(host);
        self.forget(guest);
        if self.rng.gen_bool(0.5) {
            Pairing {
                white: host,
                red: guest,
            }
        } else {
            Pairing {
                white: guest,
                red: host,
            }
        }
    }
}
