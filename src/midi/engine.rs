use std::time::Instant;
use thiserror::Error;

/// Custom error type for MIDI operations
#[derive(Debug, Error)]
pub enum MidiError {
    /// Error when sending a MIDI message
    #[error("MIDI send error: {0}")]
    SendError(String),
    /// Error when connecting to a MIDI device
    #[error("MIDI connection error: {0}")]
    ConnectionError(String),
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// Channel messages the engine sends or understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

/// Controller number of "All Notes Off".
pub const ALL_NOTES_OFF: u8 = 123;

impl MidiMessage {
    pub fn all_notes_off(channel: u8) -> Self {
        MidiMessage::ControlChange {
            channel,
            controller: ALL_NOTES_OFF,
            value: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
        }
    }

    /// Parses a raw channel message. A note-on with velocity 0 is reported
    /// as a note-off, as the running-status convention intends.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }
        let channel = data[0] & 0x0F;
        match data[0] & 0xF0 {
            0x90 if data[2] == 0 => Some(MidiMessage::NoteOff {
                channel,
                note: data[1],
                velocity: 0,
            }),
            0x90 => Some(MidiMessage::NoteOn {
                channel,
                note: data[1],
                velocity: data[2],
            }),
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: data[1],
                velocity: data[2],
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                controller: data[1],
                value: data[2],
            }),
            _ => None,
        }
    }
}

/// A live note-on, stamped when it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHit {
    pub note: u8,
    pub velocity: u8,
    pub arrival: Instant,
}

/// Where triggered notes go. Implementations must not block.
pub trait NoteOutput: Send {
    fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()>;

    fn send_note_off(&mut self, channel: u8, note: u8) -> Result<()>;

    /// Silences everything on `channel`.
    fn all_notes_off(&mut self, _channel: u8) -> Result<()> {
        Ok(())
    }
}

/// Where live hits come from.
pub trait NoteInput: Send {
    /// Every hit received since the last call, oldest first. Never blocks.
    fn poll_pending(&mut self) -> Vec<InputHit>;
}
