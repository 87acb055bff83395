use crate::event_loop::{EngineMessage, TransportAction};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Tempo in beats per minute
    #[arg(long)]
    pub bpm: Option<f64>,

    /// Steps in the grid (24, 32 or 48)
    #[arg(long)]
    pub steps: Option<usize>,

    /// Send notes to the first MIDI output whose name contains this text
    #[arg(long)]
    pub output: Option<String>,

    /// Record from the first MIDI input whose name contains this text
    #[arg(long)]
    pub input: Option<String>,

    /// Arm recording; playback starts with a one-bar count-in
    #[arg(long)]
    pub record: bool,

    /// Click on every beat during playback
    #[arg(long)]
    pub metronome: bool,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Also log to the terminal
    #[arg(short, long)]
    pub verbose: bool,
}

/// Maps one line typed on stdin to a command.
pub fn parse_command(line: &str) -> Option<EngineMessage> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();
    match command.as_str() {
        "p" | "play" => Some(EngineMessage::TransportCommand(TransportAction::Toggle)),
        "s" | "stop" => Some(EngineMessage::TransportCommand(TransportAction::Stop)),
        "r" | "rec" => Some(EngineMessage::ToggleRecord),
        "m" | "metro" => Some(EngineMessage::ToggleMetronome),
        "b" | "loop" => Some(EngineMessage::ToggleLoopScope),
        "a" | "accent" => Some(EngineMessage::CycleAccent),
        "t" | "bpm" => words
            .next()?
            .parse::<f64>()
            .ok()
            .filter(|bpm| bpm.is_finite())
            .map(EngineMessage::SetBpm),
        "q" | "quit" => Some(EngineMessage::Quit),
        _ => None,
    }
}
