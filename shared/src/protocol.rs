use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::board::Team;

// === Shared payloads ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Won,
    Lost,
    Draw,
}

impl GameResult {
    /// The same result seen from the other side of the board
    pub fn mirrored(self) -> Self {
        match self {
            GameResult::Won => GameResult::Lost,
            GameResult::Lost => GameResult::Won,
            GameResult::Draw => GameResult::Draw,
        }
    }
}

/// Launch propagated to the opponent so both clients replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct MoveMsg {
    pub piece: String,
    pub vector: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct RosterEntry {
    pub nick: String,
}

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "nickack")]
    NickAck {
        nick: String,
        #[serde(rename = "oldNick", default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        old_nick: Option<String>,
    },
    #[serde(rename = "playerslist")]
    PlayersList { list: Vec<RosterEntry> },
    #[serde(rename = "new")]
    New { who: String },
    #[serde(rename = "left")]
    Left { who: String },
    #[serde(rename = "gamerequest")]
    GameRequest { from: String },
    #[serde(rename = "decline")]
    Decline { from: String },
    #[serde(rename = "gamestart")]
    GameStart { opponent: String, color: Team },
    #[serde(rename = "move")]
    Move(MoveMsg),
    #[serde(rename = "gameresult")]
    GameResult { result: GameResult },
    #[serde(rename = "chatmessage")]
    ChatMessage {
        text: String,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        from: Option<String>,
    },
    #[serde(rename = "nickchange")]
    NickChange {
        #[serde(rename = "oldNick")]
        old_nick: String,
        #[serde(rename = "newNick")]
        new_nick: String,
    },
    #[serde(rename = "opponentleft")]
    OpponentLeft { who: String },
    #[serde(rename = "error")]
    Error { text: String },
}

// === Client -> Server ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "lowercase")]
pub enum CmdName {
    Nick,
    Invite,
    Accept,
    Decline,
    List,
}

impl CmdName {
    pub fn as_str(self) -> &'static str {
        match self {
            CmdName::Nick => "nick",
            CmdName::Invite => "invite",
            CmdName::Accept => "accept",
            CmdName::Decline => "decline",
            CmdName::List => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "init")]
    Init {
        #[serde(default)]
        nick: Option<String>,
    },
    #[serde(rename = "cmd")]
    Cmd {
        name: CmdName,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        arg: Option<String>,
    },
    #[serde(rename = "move")]
    Move(MoveMsg),
    #[serde(rename = "gameresult")]
    GameResult { result: GameResult },
    #[serde(rename = "chatmessage")]
    ChatMessage { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickack_uses_camel_case_and_omits_missing_old_nick() {
        let msg = ServerMsg::NickAck {
            nick: "vasya".into(),
            old_nick: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"nickack","nick":"vasya"}"#);

        let msg = ServerMsg::NickAck {
            nick: "petya".into(),
            old_nick: Some("vasya".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"oldNick\":\"vasya\""));
    }

    #[test]
    fn omitted_fields_are_optional_in_typescript() {
        let server = ServerMsg::decl();
        assert!(server.contains("oldNick?: string"), "{}", server);
        assert!(server.contains("from?: string"), "{}", server);
        assert!(!server.contains("string | null"), "{}", server);

        let client = ClientMsg::decl();
        assert!(client.contains("arg?: string"), "{}", client);
    }

    #[test]
    fn gamestart_color_is_lowercase() {
        let msg = ServerMsg::GameStart {
            opponent: "petya".into(),
            color: Team::Red,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"gamestart\""));
        assert!(json.contains("\"color\":\"red\""));
    }

    #[test]
    fn move_is_flat_with_vector_pair() {
        let json = r#"{"type":"move","piece":"w3","vector":[12.5,-40.0]}"#;
        let parsed: ClientMsg = serde_json::from_str(json).unwrap();
        match &parsed {
            ClientMsg::Move(m) => {
                assert_eq!(m.piece, "w3");
                assert_eq!(m.vector, [12.5, -40.0]);
            }
            other => panic!("Expected Move, got {:?}", other),
        }
        let relayed = ServerMsg::Move(MoveMsg {
            piece: "w3".into(),
            vector: [12.5, -40.0],
        });
        assert_eq!(serde_json::to_string(&relayed).unwrap(), json);
    }

    #[test]
    fn cmd_with_and_without_arg() {
        let parsed: ClientMsg =
            serde_json::from_str(r#"{"type":"cmd","name":"invite","arg":"petya"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMsg::Cmd {
                name: CmdName::Invite,
                arg: Some("petya".into())
            }
        );
        let parsed: ClientMsg = serde_json::from_str(r#"{"type":"cmd","name":"list"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMsg::Cmd {
                name: CmdName::List,
                arg: None
            }
        );
    }

    #[test]
    fn unknown_cmd_name_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"cmd","name":"debug"}"#).is_err());
    }

    #[test]
    fn init_without_nick_parses() {
        let parsed: ClientMsg = serde_json::from_str(r#"{"type":"init"}"#).unwrap();
        assert_eq!(parsed, ClientMsg::Init { nick: None });
    }

    #[test]
    fn gameresult_values() {
        let json = serde_json::to_string(&ClientMsg::GameResult {
            result: GameResult::Draw,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"gameresult","result":"draw"}"#);
        assert_eq!(GameResult::Won.mirrored(), GameResult::Lost);
        assert_eq!(GameResult::Draw.mirrored(), GameResult::Draw);
    }

    #[test]
    fn nickchange_and_playerslist_shapes() {
        let json = serde_json::to_string(&ServerMsg::NickChange {
            old_nick: "a".into(),
            new_nick: "b".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"nickchange","oldNick":"a","newNick":"b"}"#);

        let json = serde_json::to_string(&ServerMsg::PlayersList {
            list: vec![RosterEntry { nick: "a".into() }],
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"playerslist","list":[{"nick":"a"}]}"#);
    }
}
