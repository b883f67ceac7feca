//! Client-side session: reacts to relay messages, owns the current game,
//! and turns console input and clicks into outbound messages.
//!
//! Transport-agnostic; a browser or native front end feeds it decoded
//! [`ServerMsg`]s and sends whatever [`ClientMsg`]s it returns.

use std::collections::BTreeSet;

use crate::board::Team;
use crate::config::BoardConfig;
use crate::console::{parse_command, ConsoleCommand, ConsoleError};
use crate::game::{Game, GameError, Progress};
use crate::protocol::{ClientMsg, GameResult, ServerMsg};
use crate::turn::{LegId, MotionLeg};
use crate::vec2::Vec2;

/// Something the front end should show or animate
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Line for the console log
    Console(String),
    /// The board was replaced; redraw from scratch and drop running animations
    BoardReset,
    LegStarted(MotionLeg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

pub struct ClientSession {
    config: BoardConfig,
    state: ConnectionState,
    nick: Option<String>,
    opponent: Option<String>,
    roster: BTreeSet<String>,
    game: Game,
    /// Result claimed by the opponent for the current game
    opponent_report: Option<GameResult>,
}

impl ClientSession {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            nick: None,
            opponent: None,
            roster: BTreeSet::new(),
            game: Game::local(config),
            opponent_report: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    pub fn opponent(&self) -> Option<&str> {
        self.opponent.as_deref()
    }

    pub fn roster(&self) -> impl Iterator<Item = &str> {
        self.roster.iter().map(String::as_str)
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn opponent_report(&self) -> Option<GameResult> {
        self.opponent_report
    }

    /// Transport is up; returns the registration message.
    pub fn on_connect(&mut self, nick: Option<&str>) -> ClientMsg {
        self.state = ConnectionState::Connected;
        ClientMsg::Init {
            nick: nick.map(str::to_string),
        }
    }

    /// Transport went away. Any networked game is abandoned together with
    /// its pending legs, and a fresh local board takes its place.
    pub fn on_disconnect(&mut self) -> Vec<ClientEvent> {
        self.state = ConnectionState::Disconnected;
        self.roster.clear();
        let mut events = vec![ClientEvent::Console("disconnected from server".to_string())];
        if self.game.is_multiplayer() {
            self.leave_game();
            events.push(ClientEvent::BoardReset);
        }
        events
    }

    /// Handle one line typed into the console. Returns the message to send,
    /// if any.
    pub fn submit_line(&mut self, line: &str) -> Result<(Option<ClientMsg>, Vec<ClientEvent>), ConsoleError> {
        let command = parse_command(line)?;
        if command == ConsoleCommand::Reset {
            // Resetting mid-match would desync the two boards.
            if self.game.is_multiplayer() {
                let note = ClientEvent::Console("cannot reset during a network game".to_string());
                return Ok((None, vec![note]));
            }
            self.game.reset();
            return Ok((None, vec![ClientEvent::BoardReset]));
        }
        let mut events = Vec::new();
        if let ConsoleCommand::Chat(text) = &command {
            let me = self.nick.as_deref().unwrap_or("me");
            events.push(ClientEvent::Console(format!("{}: {}", me, text)));
        }
        Ok((command.to_client_msg(), events))
    }

    /// Launch a piece picked on the board.
    pub fn launch(&mut self, piece: &str, velocity: Vec2) -> Result<(MotionLeg, Option<ClientMsg>), GameError> {
        self.game.launch(piece, velocity)
    }

    /// The animator finished a leg. A held opponent move that starts here
    /// comes back in [`Progress::started`] and needs animating too.
    pub fn leg_completed(&mut self, leg_id: LegId) -> Result<Progress, GameError> {
        let progress = self.game.complete_leg(leg_id)?;
        self.check_reports(&progress);
        Ok(progress)
    }

    /// Run the current cascade to rest without animating it.
    pub fn settle(&mut self) -> Result<Progress, GameError> {
        let progress = self.game.settle()?;
        self.check_reports(&progress);
        Ok(progress)
    }

    pub fn handle(&mut self, msg: ServerMsg) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        let mut say = |line: String| events.push(ClientEvent::Console(line));

        match msg {
            ServerMsg::NickAck { nick, old_nick } => {
                match old_nick {
                    Some(old) => say(format!("you are now {} (was {})", nick, old)),
                    None => say(format!("you are {}", nick)),
                }
                self.nick = Some(nick);
            }
            ServerMsg::PlayersList { list } => {
                self.roster = list.into_iter().map(|entry| entry.nick).collect();
                let names: Vec<&str> = self.roster.iter().map(String::as_str).collect();
                say(format!("players: {}", names.join(", ")));
            }
            ServerMsg::New { who } => {
                say(format!("{} joined", who));
                self.roster.insert(who);
            }
            ServerMsg::Left { who } => {
                say(format!("{} left", who));
                self.roster.remove(&who);
            }
            ServerMsg::NickChange { old_nick, new_nick } => {
                say(format!("{} is now known as {}", old_nick, new_nick));
                self.roster.remove(&old_nick);
                if self.opponent.as_deref() == Some(old_nick.as_str()) {
                    self.opponent = Some(new_nick.clone());
                }
                self.roster.insert(new_nick);
            }
            ServerMsg::GameRequest { from } => {
                say(format!(
                    "{} invites you to play; /accept {} or /decline {}",
                    from, from, from
                ));
            }
            ServerMsg::Decline { from } => say(format!("{} declined your invitation", from)),
            ServerMsg::GameStart { opponent, color } => {
                say(format!("game against {} started, you play {}", opponent, color));
                if color == Team::White {
                    say("your move".to_string());
                }
                self.game = Game::multiplayer(self.config, color).succeed(&self.game);
                self.opponent = Some(opponent);
                self.opponent_report = None;
                events.push(ClientEvent::BoardReset);
            }
            ServerMsg::Move(m) => match self.game.apply_remote_move(&m) {
                Ok(Some(leg)) => events.push(ClientEvent::LegStarted(leg)),
                // Started from `leg_completed` once our cascade settles
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(piece = %m.piece, %err, "ignoring remote move");
                    say(format!("ignored opponent move: {}", err));
                }
            },
            ServerMsg::GameResult { result } => {
                self.opponent_report = Some(result);
                say(format!("opponent reports: you {}", result_word(result)));
                if let Some(ours) = self.our_result() {
                    if ours != result {
                        tracing::warn!(?ours, theirs = ?result, "boards disagree on the result");
                    }
                }
            }
            ServerMsg::ChatMessage { text, from } => {
                say(format!("{}: {}", from.as_deref().unwrap_or("?"), text));
            }
            ServerMsg::OpponentLeft { who } => {
                say(format!("{} left the game", who));
                if self.game.is_multiplayer() {
                    self.leave_game();
                    events.push(ClientEvent::BoardReset);
                }
            }
            ServerMsg::Error { text } => say(format!("server: {}", text)),
        }
        events
    }

    fn our_result(&self) -> Option<GameResult> {
        let local = self.game.local_color()?;
        self.game.outcome().map(|o| o.result_for(local))
    }

    fn check_reports(&self, progress: &Progress) {
        if let (Some(finished), Some(local), Some(theirs)) =
            (progress.finished, self.game.local_color(), self.opponent_report)
        {
            let ours = finished.result_for(local);
            if ours != theirs {
                tracing::warn!(?ours, ?theirs, "boards disagree on the result");
            }
        }
    }

    fn leave_game(&mut self) {
        self.game = Game::local(self.config).succeed(&self.game);
        self.opponent = None;
        self.opponent_report = None;
    }
}

fn result_word(result: GameResult) -> &'static str {
    match result {
        GameResult::Won => "won",
        GameResult::Lost => "lost",
        GameResult::Draw => "drew",
    }
}
