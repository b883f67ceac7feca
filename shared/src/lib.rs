//! Chapayev core shared by the relay server and game clients.
//!
//! Geometry, the collision resolver, the board and its turn state machine,
//! the client-side game session, and the JSON wire protocol.

pub mod board;
pub mod client;
pub mod collision;
pub mod config;
pub mod console;
pub mod game;
pub mod protocol;
pub mod turn;
pub mod vec2;
