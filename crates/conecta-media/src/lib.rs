//! Media capture for Conecta
//!
//! Voice notes are recorded from a microphone behind the [`AudioInput`]
//! trait and attached to messages as audio attachments. Environments without
//! microphone access still produce an attachment: a labeled placeholder.

pub mod recorder;

pub use recorder::*;
