use std::collections::{BTreeSet, HashMap};

use chapayev_shared::board::Team;
use chapayev_shared::protocol::{ClientMsg, CmdName, GameResult, MoveMsg, ServerMsg};
use tokio::sync::{mpsc, oneshot};

use crate::broker::{InviteOutcome, MatchBroker, Pairing};
use crate::config::ServerConfig;
use crate::directory::{ConnId, PlayerDirectory};
use crate::session::SessionTable;

/// Nick given to players whose `init` carries none
const GUEST_NICK: &str = "guest";

/// Commands from client connections to the relay task
pub enum RelayCommand {
    Connect {
        outbox: mpsc::UnboundedSender<ServerMsg>,
        response: oneshot::Sender<ConnId>,
    },
    Message {
        id: ConnId,
        msg: ClientMsg,
    },
    Disconnect {
        id: ConnId,
    },
}

/// One message for one connection
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ConnId,
    pub msg: ServerMsg,
}

/// All relay state. Every inbound message is applied in arrival order and
/// turned into the messages to deliver.
pub struct Relay {
    connected: BTreeSet<ConnId>,
    directory: PlayerDirectory,
    broker: MatchBroker,
    sessions: SessionTable,
    next_conn_id: u32,
}

impl Relay {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            connected: BTreeSet::new(),
            directory: PlayerDirectory::new(config.max_nick_len),
            broker: MatchBroker::new(config.rng_seed),
            sessions: SessionTable::new(),
            next_conn_id: 1,
        }
    }

    pub fn directory(&self) -> &PlayerDirectory {
        &self.directory
    }

    pub fn broker(&self) -> &MatchBroker {
        &self.broker
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Allocate an id for a new connection
    pub fn connect(&mut self) -> ConnId {
        let id = ConnId(self.next_conn_id);
        self.next_conn_id += 1;
        self.connected.insert(id);
        id
    }

    pub fn handle(&mut self, from: ConnId, msg: ClientMsg) -> Vec<Outbound> {
        tracing::debug!(%from, ?msg, "dispatch");
        let mut out = Vec::new();

        if let ClientMsg::Init { nick } = &msg {
            self.on_init(from, nick.as_deref(), &mut out);
            return out;
        }
        let Some(me) = self.directory.nick_of(from).map(str::to_string) else {
            tracing::warn!(%from, "message before init");
            reply_error(&mut out, from, "send init first");
            return out;
        };

        match msg {
            ClientMsg::Init { .. } => {}
            ClientMsg::Cmd { name, arg } => self.on_cmd(from, &me, name, arg, &mut out),
            ClientMsg::Move(m) => self.on_move(from, m, &mut out),
            ClientMsg::GameResult { result } => self.on_result(from, result, &mut out),
            ClientMsg::ChatMessage { text } => {
                let msg = ServerMsg::ChatMessage {
                    text,
                    from: Some(me),
                };
                self.broadcast_except(from, msg, &mut out);
            }
        }
        out
    }

    pub fn disconnect(&mut self, id: ConnId) -> Vec<Outbound> {
        let mut out = Vec::new();
        if !self.connected.remove(&id) {
            return out;
        }
        self.broker.forget(id);

        let nick = self.directory.remove(id);
        if let Some((session, survivor)) = self.sessions.end_for(id) {
            if !session.is_finished() {
                tracing::info!(session = session.id.0, %survivor, "game abandoned");
                out.push(Outbound {
                    to: survivor,
                    msg: ServerMsg::OpponentLeft {
                        who: nick.clone().unwrap_or_default(),
                    },
                });
            }
        }
        if let Some(who) = nick {
            tracing::info!(%id, nick = %who, "player left");
            self.broadcast_except(id, ServerMsg::Left { who }, &mut out);
        }
        out
    }

    fn on_init(&mut self, from: ConnId, nick: Option<&str>, out: &mut Vec<Outbound>) {
        if self.directory.contains(from) {
            reply_error(out, from, "already registered; use /nick to rename");
            return;
        }
        let Some(nick) = self
            .directory
            .add(from, nick)
            .or_else(|| self.directory.add(from, Some(GUEST_NICK)))
        else {
            return;
        };
        tracing::info!(%from, %nick, "player registered");

        out.push(Outbound {
            to: from,
            msg: ServerMsg::NickAck {
                nick: nick.clone(),
                old_nick: None,
            },
        });
        out.push(Outbound {
            to: from,
            msg: ServerMsg::PlayersList {
                list: self.directory.list(),
            },
        });
        self.broadcast_except(from, ServerMsg::New { who: nick }, out);
    }

    fn on_cmd(&mut self, from: ConnId, me: &str, name: CmdName, arg: Option<String>, out: &mut Vec<Outbound>) {
        if name == CmdName::List {
            out.push(Outbound {
                to: from,
                msg: ServerMsg::PlayersList {
                    list: self.directory.list(),
                },
            });
            return;
        }
        let Some(arg) = arg else {
            reply_error(out, from, &format!("{} needs an argument", name.as_str()));
            return;
        };

        match name {
            CmdName::Nick => {
                let Some(change) = self.directory.update(from, Some(&arg)) else {
                    reply_error(out, from, "nick must not be empty");
                    return;
                };
                if change.is_rename() {
                    tracing::info!(%from, old = ?change.old, new = %change.new, "nick changed");
                    if let Some(old) = change.old.clone() {
                        let msg = ServerMsg::NickChange {
                            old_nick: old,
                            new_nick: change.new.clone(),
                        };
                        self.broadcast_except(from, msg, out);
                    }
                }
                out.push(Outbound {
                    to: from,
                    msg: ServerMsg::NickAck {
                        nick: change.new,
                        old_nick: change.old,
                    },
                });
            }
            CmdName::Invite => {
                let Some(guest) = self.directory.id_of(&arg) else {
                    tracing::warn!(%from, guest = %arg, "invite for unknown player");
                    return;
                };
                if !self.check_free(from, guest, &arg, out) {
                    return;
                }
                match self.broker.invite(&self.directory, from, guest) {
                    InviteOutcome::Rejected => {
                        tracing::warn!(%from, %guest, "invite rejected");
                    }
                    InviteOutcome::Pending => {
                        tracing::debug!(host = %me, guest = %arg, "invite pending");
                        out.push(Outbound {
                            to: guest,
                            msg: ServerMsg::GameRequest {
                                from: me.to_string(),
                            },
                        });
                    }
                    InviteOutcome::Paired(pairing) => {
                        tracing::debug!(host = %me, guest = %arg, "mutual invite");
                        self.start_game(from, pairing, out);
                    }
                }
            }
            CmdName::Accept => {
                let Some(host) = self.directory.id_of(&arg) else {
                    tracing::warn!(%from, host = %arg, "accept for unknown player");
                    return;
                };
                if !self.broker.is_pending(host, from) {
                    tracing::warn!(%from, %host, "accept without invite");
                    return;
                }
                if !self.check_free(from, host, &arg, out) {
                    return;
                }
                if let Some(pairing) = self.broker.accept(host, from) {
                    self.start_game(from, pairing, out);
                }
            }
            CmdName::Decline => {
                let Some(host) = self.directory.id_of(&arg) else {
                    tracing::warn!(%from, host = %arg, "decline for unknown player");
                    return;
                };
                if self.broker.decline(host, from) {
                    tracing::debug!(%from, %host, "invite declined");
                    out.push(Outbound {
                        to: host,
                        msg: ServerMsg::Decline {
                            from: me.to_string(),
                        },
                    });
                } else {
                    tracing::warn!(%from, %host, "decline without invite");
                }
            }
            CmdName::List => {}
        }
    }

    /// Neither player may be in an unfinished game.
    fn check_free(&self, me: ConnId, other: ConnId, other_nick: &str, out: &mut Vec<Outbound>) -> bool {
        if self.sessions.is_busy(me) {
            reply_error(out, me, "finish your current game first");
            false
        } else if self.sessions.is_busy(other) {
            reply_error(out, me, &format!("{} is already playing", other_nick));
            false
        } else {
            true
        }
    }

    fn start_game(&mut self, requester: ConnId, pairing: Pairing, out: &mut Vec<Outbound>) {
        if let Err(busy) = self.sessions.start(pairing) {
            tracing::warn!(%busy, "pairing with a player who is still in a game");
            reply_error(out, requester, "a player is still in a game");
            return;
        }
        let white = self.directory.nick_of(pairing.white).unwrap_or_default().to_string();
        let red = self.directory.nick_of(pairing.red).unwrap_or_default().to_string();
        tracing::info!(%white, %red, "game started");

        out.push(Outbound {
            to: pairing.white,
            msg: ServerMsg::GameStart {
                opponent: red.clone(),
                color: Team::White,
            },
        });
        out.push(Outbound {
            to: pairing.red,
            msg: ServerMsg::GameStart {
                opponent: white,
                color: Team::Red,
            },
        });
    }

    fn on_move(&mut self, from: ConnId, m: MoveMsg, out: &mut Vec<Outbound>) {
        match self.sessions.opponent_of(from) {
            Some(opponent) => out.push(Outbound {
                to: opponent,
                msg: ServerMsg::Move(m),
            }),
            None => {
                tracing::warn!(%from, "move outside a game");
                reply_error(out, from, "not in a game");
            }
        }
    }

    fn on_result(&mut self, from: ConnId, result: GameResult, out: &mut Vec<Outbound>) {
        match self.sessions.record_result(from, result) {
            Some(fwd) => out.push(Outbound {
                to: fwd.to,
                msg: ServerMsg::GameResult { result: fwd.result },
            }),
            None => tracing::warn!(%from, ?result, "result outside a game"),
        }
    }

    /// Send to every registered player other than `except`
    fn broadcast_except(&self, except: ConnId, msg: ServerMsg, out: &mut Vec<Outbound>) {
        out.extend(
            self.connected
                .iter()
                .filter(|&&id| id != except && self.directory.contains(id))
                .map(|&to| Outbound {
                    to,
                    msg: msg.clone(),
                }),
        );
    }
}

fn reply_error(out: &mut Vec<Outbound>, to: ConnId, text: &str) {
    out.push(Outbound {
        to,
        msg: ServerMsg::Error {
            text: text.to_string(),
        },
    });
}

/// Run the relay. Owns all directory, invite and session state; connection
/// tasks talk to it only through `cmd_rx`.
pub async fn run_relay(mut cmd_rx: mpsc::Receiver<RelayCommand>, config: ServerConfig) {
    let mut relay = Relay::new(&config);
    let mut outboxes: HashMap<ConnId, mpsc::UnboundedSender<ServerMsg>> = HashMap::new();

    while let Some(cmd) = cmd_rx.recv().await {
        let out = match cmd {
            RelayCommand::Connect { outbox, response } => {
                let id = relay.connect();
                if response.send(id).is_err() {
                    // Connection task went away before learning its id.
                    relay.disconnect(id)
                } else {
                    outboxes.insert(id, outbox);
                    Vec::new()
                }
            }
            RelayCommand::Message { id, msg } => relay.handle(id, msg),
            RelayCommand::Disconnect { id } => {
                outboxes.remove(&id);
                relay.disconnect(id)
            }
        };

        for Outbound { to, msg } in out {
            if let Some(outbox) = outboxes.get(&to) {
                // A closed outbox means that connection is already tearing down.
                let _ = outbox.send(msg);
            }
        }
    }

    tracing::info!("Relay ended");
}
