//! Chapayev relay server library.
//!
//! Player directory, invite broker and session table, owned by a single
//! relay task and reached over WebSocket. Exposed for tests and binaries.

pub mod broker;
pub mod config;
pub mod directory;
pub mod relay;
pub mod session;
pub mod ws;
