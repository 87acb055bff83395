//! Pattern metadata and the tempo/meter math derived from it.

use crate::config::{DEFAULT_BEATS_PER_BAR, DEFAULT_BPM, DRUM_CHANNEL, TICKS_PER_BEAT};
use crate::grid::{StepGrid, SUPPORTED_STEPS};
use std::ops::Range;
use std::time::Duration;

/// Named step ranges of a pattern.
pub trait SectionRanges {
    /// Half-open `(start, end)` step range for `name`.
    fn get_range(&self, name: &str) -> Option<(usize, usize)>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMeta {
    pub name: String,
    pub bpm: f64,
    /// Zero-based MIDI channel.
    pub channel: u8,
    pub loop_len_ticks: u32,
    pub loop_start_tick: u32,
    /// Bars that actually play: 2 for a full pattern, 1 for a half pattern.
    pub bars: usize,
    pub steps: usize,
    pub steps_per_bar: usize,
    pub beats_per_bar: usize,
}

impl Default for PatternMeta {
    fn default() -> Self {
        PatternMeta::new("untitled", DEFAULT_BPM, 32)
    }
}

impl PatternMeta {
    /// A two-bar pattern of `steps` steps in 4/4.
    pub fn new(name: impl Into<String>, bpm: f64, steps: usize) -> Self {
        PatternMeta {
            name: name.into(),
            bpm,
            channel: DRUM_CHANNEL,
            loop_len_ticks: TICKS_PER_BEAT * (DEFAULT_BEATS_PER_BAR as u32) * 2,
            loop_start_tick: 0,
            bars: 2,
            steps,
            steps_per_bar: steps / 2,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
        }
        .normalized()
    }

    /// Brings out-of-domain values back to something playable: unsupported
    /// step counts fall back to 32, the grid always spans two bars, and
    /// a half pattern plays exactly one of them.
    pub fn normalized(mut self) -> Self {
        if !SUPPORTED_STEPS.contains(&self.steps) {
            log::warn!("Unsupported step count {}, using 32", self.steps);
            self.steps = 32;
        }
        if self.steps_per_bar * 2 != self.steps {
            self.steps_per_bar = self.steps / 2;
        }
        self.bars = self.bars.clamp(1, 2);
        if self.beats_per_bar == 0 {
            self.beats_per_bar = DEFAULT_BEATS_PER_BAR;
        }
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            self.bpm = DEFAULT_BPM;
        }
        if self.loop_len_ticks == 0 {
            self.loop_len_ticks = TICKS_PER_BEAT * (self.beats_per_bar as u32) * 2;
        }
        self.channel &= 0x0F;
        self
    }

    pub fn empty_grid(&self) -> StepGrid {
        StepGrid::with_default_lanes(self.steps, self.steps_per_bar)
    }

    /// Steps that play, i.e. one bar for a half pattern.
    pub fn play_steps(&self) -> usize {
        (self.steps_per_bar * self.bars).min(self.steps)
    }

    /// Steps per beat, or `None` when the bar does not split evenly into beats.
    pub fn steps_per_beat(&self) -> Option<usize> {
        if self.beats_per_bar == 0 || self.steps_per_bar % self.beats_per_bar != 0 {
            None
        } else {
            Some(self.steps_per_bar / self.beats_per_bar)
        }
    }

    pub fn step_duration(&self) -> Duration {
        let bar_secs = 60.0 / self.bpm * self.beats_per_bar as f64;
        Duration::from_secs_f64(bar_secs / self.steps_per_bar as f64)
    }

    /// How long a triggered note is held: `ratio` of a step, capped at `max`.
    pub fn gate_duration(&self, ratio: f64, max: Duration) -> Duration {
        self.step_duration().mul_f64(ratio.clamp(0.0, 1.0)).min(max)
    }

    pub fn step_ticks(&self) -> f64 {
        f64::from(self.loop_len_ticks.max(1)) / self.steps as f64
    }

    /// Bar index containing `step`.
    pub fn bar_of(&self, step: usize) -> usize {
        step / self.steps_per_bar
    }

    /// Playable step range of bar `bar`.
    pub fn bar_range(&self, bar: usize) -> Option<Range<usize>> {
        if bar >= self.bars {
            return None;
        }
        let start = bar * self.steps_per_bar;
        Some(start..(start + self.steps_per_bar).min(self.steps))
    }
}

impl SectionRanges for PatternMeta {
    fn get_range(&self, name: &str) -> Option<(usize, usize)> {
        let range = match name.trim().to_ascii_uppercase().as_str() {
            "A" => self.bar_range(0)?,
            "B" => self.bar_range(1)?,
            "ALL" | "AB" => 0..self.play_steps(),
            _ => return None,
        };
        Some((range.start, range.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_duration_sixteenths() {
        let meta = PatternMeta::new("t", 120.0, 32);
        assert_eq!(meta.steps_per_bar, 16);
        assert!((meta.step_duration().as_secs_f64() - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_gate_is_capped() {
        let meta = PatternMeta::new("t", 60.0, 32);
        let gate = meta.gate_duration(0.6, Duration::from_millis(80));
        assert_eq!(gate, Duration::from_millis(80));
    }

    #[test]
    fn test_normalizes_unsupported_steps() {
        let mut meta = PatternMeta::default();
        meta.steps = 20;
        meta.steps_per_bar = 7;
        let meta = meta.normalized();
        assert_eq!(meta.steps, 32);
        assert_eq!(meta.steps_per_bar, 16);
    }

    #[test]
    fn test_triplet_grid_has_no_even_beat_split() {
        let mut meta = PatternMeta::new("t", 120.0, 48);
        assert_eq!(meta.steps_per_beat(), Some(6));
        meta.beats_per_bar = 5;
        assert_eq!(meta.steps_per_beat(), None);
    }

    #[test]
    fn test_half_pattern_only_has_bar_a() {
        let mut meta = PatternMeta::new("half", 120.0, 32);
        meta.bars = 1;
        assert_eq!(meta.get_range("A"), Some((0, 16)));
        assert_eq!(meta.get_range("b"), None);
        assert_eq!(meta.get_range("ALL"), Some((0, 16)));
        assert_eq!(meta.play_steps(), 16);
    }

    #[test]
    fn test_named_ranges_full_pattern() {
        let meta = PatternMeta::new("full", 120.0, 24);
        assert_eq!(meta.get_range("B"), Some((12, 24)));
        assert_eq!(meta.get_range("ALL"), Some((0, 24)));
        assert_eq!(meta.get_range("C"), None);
    }
}
