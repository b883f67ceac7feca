//! Registry of connected players, keyed both ways: connection -> nick and
//! nick -> connection. Nicknames are unique across the directory.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chapayev_shared::protocol::RosterEntry;

/// Identity of one WebSocket connection, assigned by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u32);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickChange {
    /// `None` when the connection had no nick yet
    pub old: Option<String>,
    pub new: String,
}

impl NickChange {
    pub fn is_rename(&self) -> bool {
        self.old.as_deref().is_some_and(|old| old != self.new)
    }
}

pub struct PlayerDirectory {
    nicks: BTreeMap<ConnId, String>,
    ids: HashMap<String, ConnId>,
    max_nick_len: usize,
}

impl PlayerDirectory {
    pub fn new(max_nick_len: usize) -> Self {
        Self {
            nicks: BTreeMap::new(),
            ids: HashMap::new(),
            max_nick_len,
        }
    }

    /// Register a connection. Returns the nick actually recorded, which may
    /// carry a `_N` suffix if the requested one is taken. An absent or blank
    /// nick registers nothing.
    pub fn add(&mut self, conn: ConnId, nick: Option<&str>) -> Option<String> {
        self.update(conn, nick).map(|change| change.new)
    }

    /// Change (or set) a connection's nick.
    ///
    /// Absent or blank nicks leave everything as it was. Asking for the nick
    /// one already holds keeps it; the change then has `old == new`.
    pub fn update(&mut self, conn: ConnId, nick: Option<&str>) -> Option<NickChange> {
        let wanted = self.clean(nick?)?;
        let old = self.nicks.get(&conn).cloned();

        if old.as_deref() == Some(wanted.as_str()) {
            return Some(NickChange {
                new: wanted,
                old,
            });
        }

        let new = self.unique(conn, &wanted);
        if let Some(old) = &old {
            self.ids.remove(old);
        }
        self.ids.insert(new.clone(), conn);
        self.nicks.insert(conn, new.clone());
        Some(NickChange { old, new })
    }

    /// Forget a connection. Returns its nick if it had one.
    pub fn remove(&mut self, conn: ConnId) -> Option<String> {
        let nick = self.nicks.remove(&conn)?;
        self.ids.remove(&nick);
        Some(nick)
    }

    pub fn nick_of(&self, conn: ConnId) -> Option<&str> {
        self.nicks.get(&conn).map(String::as_str)
    }

    pub fn id_of(&self, nick: &str) -> Option<ConnId> {
        self.ids.get(nick).copied()
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.nicks.contains_key(&conn)
    }

    pub fn len(&self) -> usize {
        self.nicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nicks.is_empty()
    }

    /// Roster snapshot in connection order
    pub fn list(&self) -> Vec<RosterEntry> {
        self.nicks
            .values()
            .map(|nick| RosterEntry { nick: nick.clone() })
            .collect()
    }

    fn clean(&self, nick: &str) -> Option<String> {
        let nick: String = nick.trim().chars().take(self.max_nick_len).collect();
        let nick = nick.trim_end();
        (!nick.is_empty()).then(|| nick.to_string())
    }

    /// `wanted`, or `wanted_N` with the smallest free N. The base is cut
    /// short so the suffixed nick still fits `max_nick_len`. A nick held by
    /// `conn` itself counts as free.
    fn unique(&self, conn: ConnId, wanted: &str) -> String {
        let free = |nick: &str| self.ids.get(nick).map_or(true, |&owner| owner == conn);
        if free(wanted) {
            return wanted.to_string();
        }
        (1u32..)
            .map(|n| {
                let suffix = format!("_{}", n);
                let room = self.max_nick_len.saturating_sub(suffix.len());
                let base: String = wanted.chars().take(room).collect();
                format!("{}{}", base, suffix)
            })
            .find(|candidate| free(candidate))
            .unwrap_or_else(|| wanted.to_string())
    }
}
