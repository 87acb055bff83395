//! MIDI functionality
//!
//! This module is the capability boundary between the engine and the
//! outside world:
//! - [`NoteOutput`] / [`NoteInput`] traits the session talks to
//! - [`MidiMessage`] encoding and parsing
//! - [`MidirOutput`] / [`MidirInput`] for real devices via midir
//! - [`MockOutput`] / [`MockInput`] for tests
//!
//! A session runs without either capability; it just stays silent.
mod engine;
pub mod midir_engine;
pub mod mock_engine;

pub use engine::{
    InputHit, MidiError, MidiMessage, NoteInput, NoteOutput, Result, ALL_NOTES_OFF,
};
pub use midir_engine::{MidirInput, MidirOutput};
pub use mock_engine::{MockInput, MockOutput};
