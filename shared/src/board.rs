//! Board state: the live pieces, the starting layout, bounds and outcome.

use crate::config::BoardConfig;
use crate::protocol::GameResult;
use crate::vec2::Vec2;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Team {
    White,
    Red,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::White => Team::Red,
            Team::Red => Team::White,
        }
    }

    /// Prefix of piece ids belonging to this team
    pub fn id_prefix(self) -> char {
        match self {
            Team::White => 'w',
            Team::Red => 'r',
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Team::White => f.write_str("white"),
            Team::Red => f.write_str("red"),
        }
    }
}

pub type PieceId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub team: Team,
    pub pos: Vec2,
    /// Launch velocity of the current leg; zero while at rest
    pub vel: Vec2,
}

/// How a finished game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Team),
    Draw,
}

impl Outcome {
    /// The result as seen by one side
    pub fn result_for(self, team: Team) -> GameResult {
        match self {
            Outcome::Draw => GameResult::Draw,
            Outcome::Winner(w) if w == team => GameResult::Won,
            Outcome::Winner(_) => GameResult::Lost,
        }
    }
}

/// Live pieces on a `rows x rows` grid.
///
/// Piece order is stable and identical on both clients: it is the order in
/// which obstacles are scanned, so it decides collision tie-breaks.
#[derive(Debug, Clone)]
pub struct Board {
    config: BoardConfig,
    pieces: Vec<Piece>,
}

impl Board {
    /// Board with the symmetric starting layout: red on the first row,
    /// white on the last, one piece per column.
    pub fn new(config: BoardConfig) -> Self {
        let cell = config.cell_size;
        let red_y = cell + cell / 2.0;
        let white_y = config.rows as f64 * cell + cell / 2.0;

        let mut pieces = Vec::with_capacity(config.rows as usize * 2);
        for i in 1..=config.rows {
            let x = cell * i as f64 + cell / 2.0;
            pieces.push(Piece {
                id: format!("{}{}", Team::Red.id_prefix(), i),
                team: Team::Red,
                pos: Vec2::new(x, red_y),
                vel: Vec2::ZERO,
            });
            pieces.push(Piece {
                id: format!("{}{}", Team::White.id_prefix(), i),
                team: Team::White,
                pos: Vec2::new(x, white_y),
                vel: Vec2::ZERO,
            });
        }

        Self { config, pieces }
    }

    /// Board holding exactly the given pieces (custom positions, puzzles, tests)
    pub fn with_pieces(config: BoardConfig, pieces: Vec<Piece>) -> Self {
        Self { config, pieces }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, id: &str) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == id)
    }

    pub fn piece_mut(&mut self, id: &str) -> Option<&mut Piece> {
        self.pieces.iter_mut().find(|p| p.id == id)
    }

    pub fn count(&self, team: Team) -> usize {
        self.pieces.iter().filter(|p| p.team == team).count()
    }

    /// Whether a piece centred at `pos` has left the playable grid
    pub fn is_out_of_bounds(&self, pos: Vec2) -> bool {
        let min = self.config.min_coord();
        let max = self.config.max_coord();
        pos.x < min || pos.x > max || pos.y < min || pos.y > max
    }

    /// Permanently removes a piece. Returns it if it was on the board.
    pub fn remove(&mut self, id: &str) -> Option<Piece> {
        let idx = self.pieces.iter().position(|p| p.id == id)?;
        Some(self.pieces.remove(idx))
    }

    /// Removes several pieces at once; the caller evaluates the outcome
    /// afterwards, so simultaneous captures can end in a draw.
    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Vec<Piece> {
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Game outcome implied by the remaining piece counts, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        let white = self.count(Team::White);
        let red = self.count(Team::Red);
        match (white, red) {
            (0, 0) => Some(Outcome::Draw),
            (0, _) => Some(Outcome::Winner(Team::Red)),
            (_, 0) => Some(Outcome::Winner(Team::White)),
            _ => None,
        }
    }
}
