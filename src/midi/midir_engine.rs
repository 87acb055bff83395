use crate::midi::{InputHit, MidiError, MidiMessage, NoteInput, NoteOutput, Result};
use crossbeam::channel::{unbounded, Receiver};
use log::{debug, info, trace};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::time::Instant;

const CLIENT_NAME: &str = "stepseqrs";

/// Output port opened through midir.
pub struct MidirOutput {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirOutput {
    /// Connects to the first output port whose name contains `device_name`.
    pub fn connect(device_name: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let out_ports = midi_out.ports();
        let port = out_ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .unwrap_or_default()
                    .contains(device_name)
            })
            .ok_or_else(|| {
                MidiError::ConnectionError(format!("output device '{}' not found", device_name))
            })?;
        let port_name = midi_out
            .port_name(port)
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        info!("Connecting to MIDI output port: {}", port_name);
        let connection = midi_out
            .connect(port, &format!("{}-output", CLIENT_NAME))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        Ok(MidirOutput {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send(&mut self, message: MidiMessage) -> Result<()> {
        trace!("Sending {:?}", message);
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| MidiError::SendError(e.to_string()))
    }
}

impl NoteOutput for MidirOutput {
    fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send(MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    fn send_note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        self.send(MidiMessage::NoteOff {
            channel,
            note,
            velocity: 0,
        })
    }

    fn all_notes_off(&mut self, channel: u8) -> Result<()> {
        self.send(MidiMessage::all_notes_off(channel))
    }
}

/// Input port opened through midir. The midir callback only stamps each
/// note-on and queues it; the poll loop collects them with `poll_pending`.
pub struct MidirInput {
    #[allow(dead_code)]
    connection: MidiInputConnection<()>,
    rx: Receiver<InputHit>,
    port_name: String,
}

impl MidirInput {
    /// Connects to the first input port whose name contains `device_name`.
    pub fn connect(device_name: &str) -> Result<Self> {
        let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        midi_in.ignore(Ignore::All);

        let in_ports = midi_in.ports();
        let port = in_ports
            .iter()
            .find(|p| midi_in.port_name(p).unwrap_or_default().contains(device_name))
            .ok_or_else(|| {
                MidiError::ConnectionError(format!("input device '{}' not found", device_name))
            })?;
        let port_name = midi_in
            .port_name(port)
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let (tx, rx) = unbounded();
        info!("Connecting to MIDI input port: {}", port_name);
        let connection = midi_in
            .connect(
                port,
                &format!("{}-input", CLIENT_NAME),
                move |_stamp, message, _| {
                    let arrival = Instant::now();
                    if let Some(MidiMessage::NoteOn { note, velocity, .. }) =
                        MidiMessage::parse(message)
                    {
                        let _ = tx.send(InputHit {
                            note,
                            velocity,
                            arrival,
                        });
                    }
                },
                (),
            )
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        Ok(MidirInput {
            connection,
            rx,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl NoteInput for MidirInput {
    fn poll_pending(&mut self) -> Vec<InputHit> {
        let hits: Vec<InputHit> = self.rx.try_iter().collect();
        if !hits.is_empty() {
            debug!("Collected {} input hits from {}", hits.len(), self.port_name);
        }
        hits
    }
}
