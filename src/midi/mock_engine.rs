use crate::midi::{InputHit, MidiError, MidiMessage, NoteInput, NoteOutput, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Output that records every message. Clones share the same log, so a test
/// can keep one and hand the other to a session.
#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    sent: Arc<Mutex<Vec<MidiMessage>>>,
    failing: bool,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// An output whose every send fails, like a device that went away.
    pub fn failing() -> Self {
        MockOutput {
            sent: Arc::default(),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<MidiMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn note_ons(&self) -> Vec<(u8, u8)> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                MidiMessage::NoteOn { note, velocity, .. } => Some((note, velocity)),
                _ => None,
            })
            .collect()
    }

    pub fn note_offs(&self) -> Vec<u8> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                MidiMessage::NoteOff { note, .. } => Some(note),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn record(&mut self, message: MidiMessage) -> Result<()> {
        if self.failing {
            return Err(MidiError::SendError("mock device unavailable".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| MidiError::SendError(e.to_string()))?
            .push(message);
        Ok(())
    }
}

impl NoteOutput for MockOutput {
    fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.record(MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    fn send_note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        self.record(MidiMessage::NoteOff {
            channel,
            note,
            velocity: 0,
        })
    }

    fn all_notes_off(&mut self, channel: u8) -> Result<()> {
        self.record(MidiMessage::all_notes_off(channel))
    }
}

/// Input fed by hand through the paired [`Sender`].
#[derive(Debug)]
pub struct MockInput {
    rx: Receiver<InputHit>,
}

impl MockInput {
    pub fn new() -> (Sender<InputHit>, Self) {
        let (tx, rx) = unbounded();
        (tx, MockInput { rx })
    }
}

impl NoteInput for MockInput {
    fn poll_pending(&mut self) -> Vec<InputHit> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_clones_share_the_log() {
        let sink = MockOutput::new();
        let mut output = sink.clone();
        output.send_note_on(9, 36, 100).unwrap();
        output.send_note_off(9, 36).unwrap();
        assert_eq!(sink.note_ons(), vec![(36, 100)]);
        assert_eq!(sink.note_offs(), vec![36]);
    }

    #[test]
    fn test_failing_output_reports_send_error() {
        let mut output = MockOutput::failing();
        assert!(matches!(
            output.send_note_on(9, 36, 100),
            Err(MidiError::SendError(_))
        ));
    }

    #[test]
    fn test_mock_input_drains_in_order() {
        let (tx, mut input) = MockInput::new();
        let now = Instant::now();
        for note in [36, 38] {
            tx.send(InputHit {
                note,
                velocity: 100,
                arrival: now,
            })
            .unwrap();
        }
        let notes: Vec<u8> = input.poll_pending().iter().map(|h| h.note).collect();
        assert_eq!(notes, vec![36, 38]);
        assert!(input.poll_pending().is_empty());
    }
}
