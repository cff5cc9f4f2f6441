//! Conecta shared protocol
//!
//! Domain entities (users, tasks, teams, channels, messages, reminders, posts)
//! and the assistant chat types exchanged between the server, the media crate
//! and clients.

pub mod messages;
pub mod types;

pub use messages::*;
pub use types::*;
