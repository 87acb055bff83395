use stepseqrs::midi::{
    InputHit, MidiError, MidiMessage, MockInput, MockOutput, NoteInput, NoteOutput, ALL_NOTES_OFF,
};
use std::time::Instant;

#[test]
fn test_channel_message_parsing() {
    assert_eq!(
        MidiMessage::parse(&[0x99, 36, 100]),
        Some(MidiMessage::NoteOn {
            channel: 9,
            note: 36,
            velocity: 100
        })
    );
    assert_eq!(
        MidiMessage::parse(&[0x89, 36, 64]),
        Some(MidiMessage::NoteOff {
            channel: 9,
            note: 36,
            velocity: 64
        })
    );
    assert_eq!(
        MidiMessage::parse(&[0xB0, 7, 127]),
        Some(MidiMessage::ControlChange {
            channel: 0,
            controller: 7,
            value: 127
        })
    );
}

#[test]
fn test_zero_velocity_note_on_is_note_off() {
    assert_eq!(
        MidiMessage::parse(&[0x99, 38, 0]),
        Some(MidiMessage::NoteOff {
            channel: 9,
            note: 38,
            velocity: 0
        })
    );
}

#[test]
fn test_short_and_system_messages_are_ignored() {
    assert_eq!(MidiMessage::parse(&[0xF8]), None);
    assert_eq!(MidiMessage::parse(&[0x90, 36]), None);
    assert_eq!(MidiMessage::parse(&[0xF0, 1, 2]), None);
}

#[test]
fn test_encoding() {
    let on = MidiMessage::NoteOn {
        channel: 9,
        note: 42,
        velocity: 88,
    };
    assert_eq!(on.to_bytes(), [0x99, 42, 88]);
    assert_eq!(MidiMessage::parse(&on.to_bytes()), Some(on));
    assert_eq!(
        MidiMessage::all_notes_off(9).to_bytes(),
        [0xB9, ALL_NOTES_OFF, 0]
    );
}

#[test]
fn test_mock_output_records_all_notes_off() {
    let sink = MockOutput::new();
    let mut output: Box<dyn NoteOutput> = Box::new(sink.clone());
    output.send_note_on(9, 36, 120).unwrap();
    output.all_notes_off(9).unwrap();
    assert_eq!(
        sink.sent(),
        vec![
            MidiMessage::NoteOn {
                channel: 9,
                note: 36,
                velocity: 120
            },
            MidiMessage::all_notes_off(9),
        ]
    );
    sink.clear();
    assert!(sink.sent().is_empty());
}

#[test]
fn test_mock_input_is_non_blocking() {
    let (tx, input) = MockInput::new();
    let mut input: Box<dyn NoteInput> = Box::new(input);
    assert!(input.poll_pending().is_empty());
    tx.send(InputHit {
        note: 46,
        velocity: 70,
        arrival: Instant::now(),
    })
    .unwrap();
    assert_eq!(input.poll_pending().len(), 1);
}

#[test]
fn test_midi_errors_cover_send_and_connect() {
    let mut output = MockOutput::failing();
    let err = output.send_note_on(9, 36, 100).unwrap_err();
    let kind = match &err {
        MidiError::SendError(_) => "send",
        MidiError::ConnectionError(_) => "connect",
    };
    assert_eq!(kind, "send");
    assert_eq!(err.to_string(), "MIDI send error: mock device unavailable");

    let err = MidiError::ConnectionError("output device 'x' not found".to_string());
    assert_eq!(
        err.to_string(),
        "MIDI connection error: output device 'x' not found"
    );
}
