use super::scheduler::TransportScheduler;
use super::timing::signed_secs_since;
use crate::config::EngineSettings;
use crate::grid::{velocity_to_level, StepGrid};
use crate::midi::InputHit;
use log::debug;
use std::ops::Range;
use std::time::Duration;

/// Why a hit was only auditioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditionReason {
    NotArmed,
    CountIn,
    NoEmptySlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Played back to the performer, grid untouched.
    Auditioned(AuditionReason),
    Recorded { lane: usize, step: usize, level: u8 },
    /// A zero-velocity note-on; nothing to do.
    Ignored,
}

/// Places live hits onto the grid.
#[derive(Debug, Clone)]
pub struct InputQuantizer {
    record_armed: bool,
    advance_cursor_on_hit: bool,
    record_offset_secs: f64,
    snap_window: Duration,
}

impl InputQuantizer {
    pub fn new(settings: &EngineSettings) -> Self {
        InputQuantizer {
            record_armed: false,
            advance_cursor_on_hit: settings.advance_cursor_on_hit,
            record_offset_secs: settings.record_offset_secs,
            snap_window: settings.snap_window,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.record_armed
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.record_armed = armed;
    }

    pub fn advance_cursor_on_hit(&self) -> bool {
        self.advance_cursor_on_hit
    }

    pub fn set_advance_cursor_on_hit(&mut self, advance: bool) {
        self.advance_cursor_on_hit = advance;
    }

    /// Half-width of the window around a step boundary that belongs to the
    /// neighbouring step.
    pub fn snap_for(&self, step_duration: Duration) -> Duration {
        self.snap_window.min(step_duration / 2)
    }

    /// Handles one hit. `cursor` is the edit cursor step, used (and maybe
    /// advanced) while the transport is stopped.
    pub fn process(
        &self,
        hit: &InputHit,
        grid: &mut StepGrid,
        transport: &TransportScheduler,
        cursor: &mut usize,
    ) -> HitOutcome {
        if hit.velocity == 0 {
            return HitOutcome::Ignored;
        }
        if !self.record_armed {
            return HitOutcome::Auditioned(AuditionReason::NotArmed);
        }
        if transport.is_counting_in() {
            return HitOutcome::Auditioned(AuditionReason::CountIn);
        }
        let playing = transport.is_playing();
        let step = if playing {
            match self.quantize(hit, transport) {
                Some(step) => step,
                None => return HitOutcome::Auditioned(AuditionReason::CountIn),
            }
        } else {
            (*cursor).min(grid.steps.saturating_sub(1))
        };
        let Some(lane) = grid.ensure_lane_for_note(hit.note) else {
            debug!("No empty lane for note {}", hit.note);
            return HitOutcome::Auditioned(AuditionReason::NoEmptySlot);
        };

        let level = velocity_to_level(hit.velocity).max(1);
        if !grid.stamp(lane, step, level) {
            return HitOutcome::Auditioned(AuditionReason::NoEmptySlot);
        }
        if !playing && self.advance_cursor_on_hit && grid.steps > 0 {
            *cursor = (step + 1) % grid.steps;
        }
        debug!(
            "Recorded note {} vel {} into lane {} step {} (level {})",
            hit.note, hit.velocity, lane, step, level
        );
        HitOutcome::Recorded { lane, step, level }
    }

    /// Step a hit belongs to while playing, snapped against the step under
    /// the play cursor. `None` until the first playable step has fired: the
    /// hand-off from the count-in still belongs to the count-in.
    pub fn quantize(&self, hit: &InputHit, transport: &TransportScheduler) -> Option<usize> {
        let step = transport.current_step()?;
        let started = transport.current_step_time()?;
        let duration = transport.step_duration();
        let phase = signed_secs_since(hit.arrival, started) + self.record_offset_secs;
        Some(snap_step(
            phase,
            duration.as_secs_f64(),
            self.snap_for(duration).as_secs_f64(),
            step,
            transport.loop_range(),
        ))
    }
}

/// Picks the previous, current or next step from the hit's phase inside the
/// current step, wrapping within `range`.
pub fn snap_step(phase: f64, step_secs: f64, snap: f64, step: usize, range: Range<usize>) -> usize {
    if range.is_empty() {
        return step;
    }
    if phase < snap {
        if step <= range.start {
            range.end - 1
        } else {
            step - 1
        }
    } else if phase > step_secs - snap {
        if step + 1 >= range.end {
            range.start
        } else {
            step + 1
        }
    } else {
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_step_regions() {
        assert_eq!(snap_step(0.01, 0.125, 0.03, 5, 0..32), 4);
        assert_eq!(snap_step(0.06, 0.125, 0.03, 5, 0..32), 5);
        assert_eq!(snap_step(0.11, 0.125, 0.03, 5, 0..32), 6);
    }

    #[test]
    fn test_snap_step_wraps_in_range() {
        assert_eq!(snap_step(-0.01, 0.125, 0.03, 16, 16..32), 31);
        assert_eq!(snap_step(0.12, 0.125, 0.03, 31, 16..32), 16);
    }

    #[test]
    fn test_no_step_before_first_playable_step_fires() {
        let settings = EngineSettings::default();
        let quantizer = InputQuantizer::new(&settings);
        let meta = crate::pattern::PatternMeta::new("hand-off", 120.0, 32);
        let grid = meta.empty_grid();
        let mut transport = TransportScheduler::new(&meta, &settings);
        let t0 = std::time::Instant::now();
        let d = transport.step_duration();
        transport.start(t0, 0, true);
        for n in 0..16u32 {
            transport.tick(t0 + d * n, &grid);
        }
        assert!(transport.is_playing());

        let hit = InputHit {
            note: 38,
            velocity: 100,
            arrival: t0 + d * 16 - Duration::from_millis(5),
        };
        assert_eq!(quantizer.quantize(&hit, &transport), None);
        transport.tick(t0 + d * 16, &grid);
        let on_downbeat = InputHit {
            arrival: t0 + d * 16 + Duration::from_millis(60),
            ..hit
        };
        assert_eq!(quantizer.quantize(&on_downbeat, &transport), Some(0));
    }

    #[test]
    fn test_snap_is_capped_at_half_a_step() {
        let settings = EngineSettings {
            snap_window: Duration::from_millis(100),
            ..EngineSettings::default()
        };
        let quantizer = InputQuantizer::new(&settings);
        assert_eq!(
            quantizer.snap_for(Duration::from_millis(60)),
            Duration::from_millis(30)
        );
    }
}
