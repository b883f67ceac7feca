//! Turn state machine driving launches and collision cascades.
//!
//! A launch schedules one motion leg for the launched piece. Each leg ends
//! either at the piece's stop point or at the first collision on its path.
//! Whoever animates the legs (a renderer, or [`TurnController::settle`])
//! reports completion with [`TurnController::complete_leg`]; completing a
//! collision leg resolves the impact and schedules new legs for both pieces.
//! The turn passes to the other team exactly once, when the last moving
//! piece has stopped.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::board::{Board, PieceId, Team};
use crate::collision::{nearest_collision, resolve_elastic_collision, Collision};
use crate::config::BoardConfig;
use crate::vec2::{add, scale, Vec2};

/// Duration of a full, unobstructed leg (ms)
pub const LEG_DURATION_MS: f64 = 1000.0;

pub type LegId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum LegKind {
    /// Piece glides to its stop point
    Stop,
    /// Piece glides to the contact point with `hit.obstacle`
    Collision(Collision),
}

/// One straight segment of a piece's motion, handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionLeg {
    pub id: LegId,
    pub piece: PieceId,
    pub from: Vec2,
    pub to: Vec2,
    /// Velocity the leg was computed from
    pub velocity: Vec2,
    pub duration_ms: f64,
    /// Virtual time at which the leg finishes
    pub ends_at_ms: f64,
    pub kind: LegKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Nothing launched yet this game
    Idle,
    /// At least one piece in motion
    Settling,
    /// The last cascade has finished
    Settled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    LegStarted(MotionLeg),
    Collided {
        striker: PieceId,
        target: PieceId,
        at: Vec2,
    },
    PieceStopped {
        piece: PieceId,
        at: Vec2,
    },
    /// Piece stopped off the board and was removed
    PieceCaptured {
        piece: PieceId,
        team: Team,
    },
    TurnFlipped {
        next: Team,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaunchError {
    #[error("a move is already in progress")]
    MoveInProgress,
    #[error("it is {current}'s turn")]
    NotYourTurn { current: Team },
    #[error("you play {local}, it is {current}'s turn")]
    NotYourColor { local: Team, current: Team },
    #[error("no piece {0} on the board")]
    UnknownPiece(PieceId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnError {
    #[error("no piece {0} on the board")]
    UnknownPiece(PieceId),
    #[error("cascade did not settle within {0} legs")]
    CascadeOverflow(u32),
}

/// Where a piece at `pos` launched with `vel` comes to rest if unobstructed.
///
/// Travel distance is linear in speed.
pub fn stop_point(config: &BoardConfig, pos: Vec2, vel: Vec2) -> Vec2 {
    let k = config.board_size() * config.push_power / config.piece_radius;
    add(pos, scale(vel, k))
}

/// Duration of a leg cut short at path parameter `t`.
///
/// Pieces decelerate along the leg, so the first part of the path takes
/// proportionally less time than the rest.
fn collision_leg_duration(t: f64) -> f64 {
    LEG_DURATION_MS * (1.0 - (1.0 - t).cbrt())
}

pub struct TurnController {
    board: Board,
    current_team: Team,
    move_in_progress: bool,
    moving: BTreeSet<PieceId>,
    pending: BTreeMap<LegId, MotionLeg>,
    next_leg_id: LegId,
    clock_ms: f64,
    phase: TurnPhase,
}

impl TurnController {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            current_team: Team::White,
            move_in_progress: false,
            moving: BTreeSet::new(),
            pending: BTreeMap::new(),
            next_leg_id: 1,
            clock_ms: 0.0,
            phase: TurnPhase::Idle,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_team(&self) -> Team {
        self.current_team
    }

    pub fn move_in_progress(&self) -> bool {
        self.move_in_progress
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn moving_pieces(&self) -> impl Iterator<Item = &str> {
        self.moving.iter().map(String::as_str)
    }

    pub fn pending_legs(&self) -> impl Iterator<Item = &MotionLeg> {
        self.pending.values()
    }

    /// Id the next scheduled leg will get
    pub fn next_leg_id(&self) -> LegId {
        self.next_leg_id
    }

    /// Continue leg numbering from a previous controller, so completions
    /// for its abandoned legs can never match a leg of this one.
    pub fn continue_leg_ids(&mut self, next: LegId) {
        self.next_leg_id = self.next_leg_id.max(next);
    }

    /// Fresh starting layout, white to move. Pending legs are dropped, so
    /// completions still in flight for them are ignored.
    pub fn reset(&mut self) {
        let config = *self.board.config();
        *self = Self {
            next_leg_id: self.next_leg_id,
            ..Self::new(Board::new(config))
        };
    }

    /// Check whether `piece` may be launched now.
    ///
    /// `local` is the colour this client plays in multiplayer mode, `None`
    /// for a shared-screen game.
    pub fn can_launch(&self, piece: &str, local: Option<Team>) -> Result<(), LaunchError> {
        if self.move_in_progress {
            return Err(LaunchError::MoveInProgress);
        }
        let team = self
            .board
            .piece(piece)
            .map(|p| p.team)
            .ok_or_else(|| LaunchError::UnknownPiece(piece.to_string()))?;
        if team != self.current_team {
            return Err(LaunchError::NotYourTurn {
                current: self.current_team,
            });
        }
        if let Some(local) = local {
            if local != self.current_team {
                return Err(LaunchError::NotYourColor {
                    local,
                    current: self.current_team,
                });
            }
        }
        Ok(())
    }

    /// Launch a piece of the team to move. Returns the first leg.
    pub fn launch(&mut self, piece: &str, velocity: Vec2, local: Option<Team>) -> Result<MotionLeg, LaunchError> {
        self.can_launch(piece, local)?;
        tracing::debug!(piece, vx = velocity.x, vy = velocity.y, "launch");
        self.start_piece(piece, velocity)
            .map_err(|_| LaunchError::UnknownPiece(piece.to_string()))
    }

    /// Put a piece in motion with `velocity` and schedule its next leg.
    ///
    /// A piece that already has a pending leg gets it replaced.
    pub fn start_piece(&mut self, id: &str, velocity: Vec2) -> Result<MotionLeg, TurnError> {
        let config = *self.board.config();
        let piece = self
            .board
            .piece_mut(id)
            .ok_or_else(|| TurnError::UnknownPiece(id.to_string()))?;
        piece.vel = velocity;
        let from = piece.pos;
        let stop = stop_point(&config, from, velocity);

        let (to, duration_ms, kind) =
            match nearest_collision(from, stop, self.board.pieces(), config.piece_radius) {
                Some(c) => (c.point, collision_leg_duration(c.t), LegKind::Collision(c)),
                None => (stop, LEG_DURATION_MS, LegKind::Stop),
            };

        self.pending.retain(|_, leg| leg.piece != id);

        let leg = MotionLeg {
            id: self.next_leg_id,
            piece: id.to_string(),
            from,
            to,
            velocity,
            duration_ms,
            ends_at_ms: self.clock_ms + duration_ms,
            kind,
        };
        self.next_leg_id += 1;
        self.pending.insert(leg.id, leg.clone());
        self.moving.insert(id.to_string());
        self.move_in_progress = true;
        self.phase = TurnPhase::Settling;
        Ok(leg)
    }

    /// Apply the end of a leg reported by the animator.
    ///
    /// Unknown leg ids (already completed, replaced, or from before a reset)
    /// are ignored and yield no events.
    pub fn complete_leg(&mut self, leg_id: LegId) -> Result<Vec<TurnEvent>, TurnError> {
        let Some(leg) = self.pending.remove(&leg_id) else {
            tracing::trace!(leg_id, "ignoring stale leg completion");
            return Ok(Vec::new());
        };
        self.clock_ms = self.clock_ms.max(leg.ends_at_ms);

        let mut events = Vec::new();
        match leg.kind {
            LegKind::Stop => {
                let piece = self
                    .board
                    .piece_mut(&leg.piece)
                    .ok_or_else(|| TurnError::UnknownPiece(leg.piece.clone()))?;
                piece.pos = leg.to;
                piece.vel = Vec2::ZERO;
                let team = piece.team;
                self.moving.remove(&leg.piece);
                events.push(TurnEvent::PieceStopped {
                    piece: leg.piece.clone(),
                    at: leg.to,
                });

                if self.board.is_out_of_bounds(leg.to) {
                    self.board.remove(&leg.piece);
                    tracing::debug!(piece = %leg.piece, %team, "piece captured");
                    events.push(TurnEvent::PieceCaptured {
                        piece: leg.piece,
                        team,
                    });
                }

                if self.moving.is_empty() {
                    self.current_team = self.current_team.opponent();
                    self.move_in_progress = false;
                    self.phase = TurnPhase::Settled;
                    events.push(TurnEvent::TurnFlipped {
                        next: self.current_team,
                    });
                }
            }
            LegKind::Collision(hit) => {
                let striker = self
                    .board
                    .piece_mut(&leg.piece)
                    .ok_or_else(|| TurnError::UnknownPiece(leg.piece.clone()))?;
                striker.pos = leg.to;
                let remaining = hit.remaining();
                let target = hit.obstacle;

                let Some(target_pos) = self.board.piece(&target).map(|p| p.pos) else {
                    // Target left the board meanwhile; finish the planned path.
                    let leg = self.start_piece(&leg.piece, scale(leg.velocity, remaining))?;
                    events.push(TurnEvent::LegStarted(leg));
                    return Ok(events);
                };

                let out = resolve_elastic_collision(leg.velocity, leg.to, target_pos, remaining);
                events.push(TurnEvent::Collided {
                    striker: leg.piece.clone(),
                    target: target.clone(),
                    at: leg.to,
                });

                let target_leg = self.start_piece(&target, out.target)?;
                let striker_leg = self.start_piece(&leg.piece, out.striker)?;
                events.push(TurnEvent::LegStarted(target_leg));
                events.push(TurnEvent::LegStarted(striker_leg));
            }
        }
        Ok(events)
    }

    /// Earliest-finishing pending leg, ties broken by leg id
    pub fn next_leg(&self) -> Option<&MotionLeg> {
        self.pending.values().min_by(|a, b| {
            a.ends_at_ms
                .total_cmp(&b.ends_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        })
    }

    /// Run every pending leg to completion in virtual-time order.
    ///
    /// This is the renderer-free driver: both clients of a match obtain the
    /// same cascade from the same launch. If the cascade exceeds
    /// `max_cascade_legs`, all pieces are halted where they are, the turn
    /// passes, and `CascadeOverflow` is returned.
    pub fn settle(&mut self) -> Result<Vec<TurnEvent>, TurnError> {
        let limit = self.board.config().max_cascade_legs;
        let mut events = Vec::new();
        let mut completed = 0u32;

        while let Some(leg_id) = self.next_leg().map(|l| l.id) {
            if completed >= limit {
                tracing::warn!(limit, "cascade overflow, halting all pieces");
                self.halt();
                return Err(TurnError::CascadeOverflow(limit));
            }
            events.extend(self.complete_leg(leg_id)?);
            completed += 1;
        }
        Ok(events)
    }

    /// Stop every moving piece at the start of its pending leg and pass the turn.
    fn halt(&mut self) {
        for leg in std::mem::take(&mut self.pending).into_values() {
            if let Some(piece) = self.board.piece_mut(&leg.piece) {
                piece.vel = Vec2::ZERO;
            }
        }
        self.moving.clear();
        if self.move_in_progress {
            self.current_team = self.current_team.opponent();
            self.move_in_progress = false;
            self.phase = TurnPhase::Settled;
        }
    }
}
