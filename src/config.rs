// config.rs

use crate::cli::Args;
use crate::error::{ConfigError, Result};
use crate::pattern::PatternMeta;
use crate::transport::ClickSettings;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exchange resolution (standard MIDI file PPQ).
pub const TICKS_PER_BEAT: u32 = 480;
pub const DEFAULT_BEATS_PER_BAR: usize = 4;
pub const DEFAULT_BPM: f64 = 120.0;
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;
/// Zero-based GM percussion channel (channel 10).
pub const DRUM_CHANNEL: u8 = 9;

pub const DEFAULT_GATE_RATIO: f64 = 0.6;
pub const DEFAULT_GATE_MAX_MS: u64 = 80;
/// Consistent input latency compensation, applied to every live hit.
pub const DEFAULT_RECORD_OFFSET_MS: i64 = -20;
pub const DEFAULT_SNAP_WINDOW_MS: u64 = 30;
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 2;
pub const DEFAULT_CLICK_NOTE: u8 = 42;

const ENV_PREFIX: &str = "STEPSEQ";

/// User-facing settings, layered from defaults, an optional config file,
/// `STEPSEQ_*` environment variables and finally the command line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bpm: f64,
    /// One-based MIDI channel.
    pub channel: u8,
    pub steps: usize,
    pub bars: usize,
    pub beats_per_bar: usize,
    pub gate_ratio: f64,
    pub gate_max_ms: u64,
    pub record_offset_ms: i64,
    pub snap_window_ms: u64,
    pub max_poll_interval_ms: u64,
    pub click_note: u8,
    pub click_velocity_strong: u8,
    pub click_velocity_weak: u8,
    pub metronome: bool,
    pub record: bool,
    pub advance_cursor_on_hit: bool,
    pub input_accent: u8,
    pub midi_output: Option<String>,
    pub midi_input: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bpm: DEFAULT_BPM,
            channel: DRUM_CHANNEL + 1,
            steps: 32,
            bars: 2,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            gate_ratio: DEFAULT_GATE_RATIO,
            gate_max_ms: DEFAULT_GATE_MAX_MS,
            record_offset_ms: DEFAULT_RECORD_OFFSET_MS,
            snap_window_ms: DEFAULT_SNAP_WINDOW_MS,
            max_poll_interval_ms: DEFAULT_MAX_POLL_INTERVAL_MS,
            click_note: DEFAULT_CLICK_NOTE,
            click_velocity_strong: 120,
            click_velocity_weak: 88,
            metronome: false,
            record: false,
            advance_cursor_on_hit: true,
            input_accent: 2,
            midi_output: None,
            midi_input: None,
            log_dir: None,
        }
    }
}

/// Timing and behaviour knobs consumed by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub gate_ratio: f64,
    pub gate_max: Duration,
    /// Signed seconds added to every live hit's arrival time.
    pub record_offset_secs: f64,
    pub snap_window: Duration,
    pub max_poll_interval: Duration,
    pub click: ClickSettings,
    pub metronome: bool,
    pub advance_cursor_on_hit: bool,
    pub input_accent: u8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            gate_ratio: DEFAULT_GATE_RATIO,
            gate_max: Duration::from_millis(DEFAULT_GATE_MAX_MS),
            record_offset_secs: DEFAULT_RECORD_OFFSET_MS as f64 / 1000.0,
            snap_window: Duration::from_millis(DEFAULT_SNAP_WINDOW_MS),
            max_poll_interval: Duration::from_millis(DEFAULT_MAX_POLL_INTERVAL_MS),
            click: ClickSettings::default(),
            metronome: false,
            advance_cursor_on_hit: true,
            input_accent: 2,
        }
    }
}

impl Config {
    /// Loads defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Command-line flags win over every other source.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(bpm) = args.bpm {
            debug!("BPM overridden from command line: {}", bpm);
            self.bpm = bpm;
        }
        if let Some(steps) = args.steps {
            self.steps = steps;
        }
        if let Some(output) = &args.output {
            self.midi_output = Some(output.clone());
        }
        if let Some(input) = &args.input {
            self.midi_input = Some(input.clone());
        }
        if args.record {
            info!("Record arm requested from command line");
            self.record = true;
        }
        if args.metronome {
            self.metronome = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !crate::grid::SUPPORTED_STEPS.contains(&self.steps) {
            return Err(ConfigError::UnsupportedSteps(self.steps));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(ConfigError::TempoOutOfRange {
                bpm: self.bpm,
                min: MIN_BPM,
                max: MAX_BPM,
            });
        }
        if !(1..=16).contains(&self.channel) {
            return Err(ConfigError::InvalidChannel(self.channel));
        }
        if !(1..=2).contains(&self.bars) {
            return Err(ConfigError::Invalid {
                field: "bars",
                reason: format!("{} (expected 1 or 2)", self.bars),
            });
        }
        if self.beats_per_bar == 0 {
            return Err(ConfigError::Invalid {
                field: "beats_per_bar",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.gate_ratio) {
            return Err(ConfigError::Invalid {
                field: "gate_ratio",
                reason: format!("{} (expected 0.0..=1.0)", self.gate_ratio),
            });
        }
        if self.click_note > 127 {
            return Err(ConfigError::Invalid {
                field: "click_note",
                reason: format!("{} is not a MIDI note", self.click_note),
            });
        }
        if !(1..=3).contains(&self.input_accent) {
            return Err(ConfigError::Invalid {
                field: "input_accent",
                reason: format!("{} (expected 1..=3)", self.input_accent),
            });
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        self.validate()?;
        Ok(EngineSettings {
            gate_ratio: self.gate_ratio,
            gate_max: Duration::from_millis(self.gate_max_ms),
            record_offset_secs: self.record_offset_ms as f64 / 1000.0,
            snap_window: Duration::from_millis(self.snap_window_ms),
            max_poll_interval: Duration::from_millis(self.max_poll_interval_ms.max(1)),
            click: ClickSettings {
                note: self.click_note,
                strong_velocity: self.click_velocity_strong.min(127),
                weak_velocity: self.click_velocity_weak.min(127),
            },
            metronome: self.metronome,
            advance_cursor_on_hit: self.advance_cursor_on_hit,
            input_accent: self.input_accent,
        })
    }

    pub fn pattern_meta(&self, name: &str) -> Result<PatternMeta> {
        self.validate()?;
        let mut meta = PatternMeta::new(name, self.bpm, self.steps);
        meta.channel = self.channel - 1;
        meta.bars = self.bars;
        meta.beats_per_bar = self.beats_per_bar;
        meta.loop_len_ticks = TICKS_PER_BEAT * (self.beats_per_bar as u32) * 2;
        Ok(meta.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.snap_window, Duration::from_millis(30));
        assert!(settings.record_offset_secs < 0.0);
    }

    #[test]
    fn test_rejects_unsupported_steps() {
        let config = Config {
            steps: 16,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedSteps(16))
        ));
    }

    #[test]
    fn test_pattern_meta_uses_zero_based_channel() {
        let meta = Config::default().pattern_meta("demo").unwrap();
        assert_eq!(meta.channel, 9);
        assert_eq!(meta.loop_len_ticks, 3840);
    }
}
