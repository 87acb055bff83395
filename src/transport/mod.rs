//! Transport functionality
//!
//! This module turns the step grid into timed note triggers and places live
//! input back onto it:
//! - [`TransportScheduler`] - drift-free step clock with count-in and loop scope
//! - [`NoteOffQueue`] - pending note releases, ordered by due time
//! - [`Metronome`] / [`CountIn`] - click decisions per step
//! - [`InputQuantizer`] - snaps live hits to the nearest intended step
//!
//! Nothing here blocks or sleeps. Every entry point takes the current
//! `Instant` so the whole transport can be driven from a single poll loop
//! (or from a test with synthetic time).

mod input;
mod metronome;
mod note_off;
mod scheduler;
pub mod timing;

pub use input::{snap_step, AuditionReason, HitOutcome, InputQuantizer};
pub use metronome::{ClickAccent, ClickSettings, CountIn, Metronome};
pub use note_off::{DeferredNoteOff, NoteOffQueue};
pub use scheduler::{LoopScope, TransportScheduler, TransportState, Trigger, TriggerKind};
