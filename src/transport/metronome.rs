// Metronome - click decisions for playback and the count-in pre-roll

use crate::config::DEFAULT_CLICK_NOTE;
use crate::pattern::PatternMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAccent {
    /// First step of a bar.
    Strong,
    /// Any other beat boundary.
    Weak,
}

/// Note and velocities used to sound a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickSettings {
    pub note: u8,
    pub strong_velocity: u8,
    pub weak_velocity: u8,
}

impl Default for ClickSettings {
    fn default() -> Self {
        ClickSettings {
            note: DEFAULT_CLICK_NOTE,
            strong_velocity: 120,
            weak_velocity: 88,
        }
    }
}

impl ClickSettings {
    pub fn velocity(&self, accent: ClickAccent) -> u8 {
        match accent {
            ClickAccent::Strong => self.strong_velocity,
            ClickAccent::Weak => self.weak_velocity,
        }
    }
}

/// Accent schedule for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metronome {
    steps_per_bar: usize,
    /// `None` when the bar does not divide evenly into beats; only bar
    /// starts click then.
    steps_per_beat: Option<usize>,
    enabled: bool,
}

impl Metronome {
    pub fn new(steps_per_bar: usize, steps_per_beat: Option<usize>) -> Self {
        Metronome {
            steps_per_bar: steps_per_bar.max(1),
            steps_per_beat: steps_per_beat.filter(|&n| n > 0),
            enabled: false,
        }
    }

    pub fn for_meta(meta: &PatternMeta) -> Self {
        Self::new(meta.steps_per_bar, meta.steps_per_beat())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn steps_per_bar(&self) -> usize {
        self.steps_per_bar
    }

    /// Click for `step`, counted from the start of a bar-aligned sequence.
    pub fn click_at(&self, step: usize) -> Option<ClickAccent> {
        let in_bar = step % self.steps_per_bar;
        if in_bar == 0 {
            return Some(ClickAccent::Strong);
        }
        match self.steps_per_beat {
            Some(per_beat) if in_bar % per_beat == 0 => Some(ClickAccent::Weak),
            _ => None,
        }
    }

    /// Playback click, silent unless the metronome is enabled.
    pub fn playback_click(&self, step: usize) -> Option<ClickAccent> {
        if self.enabled {
            self.click_at(step)
        } else {
            None
        }
    }
}

/// One bar of click-only pre-roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountIn {
    step: usize,
    length: usize,
}

impl CountIn {
    pub fn new(length: usize) -> Self {
        CountIn { step: 0, length }
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Moves past the current step. Returns `true` once the pre-roll is over.
    pub fn advance(&mut self) -> bool {
        self.step += 1;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.step >= self.length
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }
}
