use super::metronome::{ClickAccent, ClickSettings, CountIn, Metronome};
use super::note_off::{DeferredNoteOff, NoteOffQueue};
use super::timing::until;
use crate::config::EngineSettings;
use crate::grid::{level_to_velocity, StepGrid};
use crate::pattern::PatternMeta;
use log::{debug, info, trace, warn};
use std::ops::Range;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    /// One bar of clicks before recording starts. The grid is neither
    /// played nor written.
    CountIn,
    Playing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopScope {
    /// Wrap at the end of the playable range.
    #[default]
    Full,
    /// Wrap at the end of the bar playback started in.
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Step { lane: usize },
    Click(ClickAccent),
}

/// A note-on fired by the scheduler. Its note-off is already queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub note: u8,
    pub velocity: u8,
    /// Grid step for playback, pre-roll step for count-in clicks.
    pub step: usize,
    pub scheduled_at: Instant,
    pub fired_at: Instant,
}

/// Absolute-time step clock driving count-in and playback.
///
/// Step times are accumulated from the previous scheduled time, never from
/// the time a poll happened to arrive, so poll jitter does not turn into
/// drift. A stall longer than a step resynchronises instead of firing a
/// burst of catch-up steps.
#[derive(Debug)]
pub struct TransportScheduler {
    state: TransportState,
    scope: LoopScope,
    scope_overridden: bool,
    active_scope: LoopScope,
    step_duration: Duration,
    gate: Duration,
    steps_per_bar: usize,
    bars: usize,
    play_steps: usize,
    loop_range: Range<usize>,
    next_step_time: Option<Instant>,
    /// Next grid step to fire.
    play_step: usize,
    /// Step under the play cursor and the time it started.
    current: Option<(usize, Instant)>,
    count_in: CountIn,
    metronome: Metronome,
    click: ClickSettings,
    note_offs: NoteOffQueue,
    resyncs: u64,
}

impl TransportScheduler {
    pub fn new(meta: &PatternMeta, settings: &EngineSettings) -> Self {
        let mut metronome = Metronome::for_meta(meta);
        metronome.set_enabled(settings.metronome);
        let play_steps = meta.play_steps();
        TransportScheduler {
            state: TransportState::Stopped,
            scope: LoopScope::Full,
            scope_overridden: false,
            active_scope: LoopScope::Full,
            step_duration: meta.step_duration(),
            gate: meta.gate_duration(settings.gate_ratio, settings.gate_max),
            steps_per_bar: meta.steps_per_bar,
            bars: meta.bars,
            play_steps,
            loop_range: 0..play_steps,
            next_step_time: None,
            play_step: 0,
            current: None,
            count_in: CountIn::new(meta.steps_per_bar),
            metronome,
            click: settings.click,
            note_offs: NoteOffQueue::new(),
            resyncs: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == TransportState::Stopped
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_counting_in(&self) -> bool {
        self.state == TransportState::CountIn
    }

    pub fn loop_scope(&self) -> LoopScope {
        self.scope
    }

    /// Scope in effect for the current run, including the record-arm
    /// auto-selection.
    pub fn active_scope(&self) -> LoopScope {
        self.active_scope
    }

    pub fn loop_range(&self) -> Range<usize> {
        self.loop_range.clone()
    }

    pub fn step_duration(&self) -> Duration {
        self.step_duration
    }

    pub fn gate(&self) -> Duration {
        self.gate
    }

    pub fn next_step_time(&self) -> Option<Instant> {
        self.next_step_time
    }

    pub fn play_step(&self) -> usize {
        self.play_step
    }

    /// Step under the play cursor, once playback has fired one.
    pub fn current_step(&self) -> Option<usize> {
        self.current.map(|(step, _)| step)
    }

    pub fn current_step_time(&self) -> Option<Instant> {
        self.current.map(|(_, at)| at)
    }

    pub fn count_in_step(&self) -> usize {
        self.count_in.current_step()
    }

    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    pub fn metronome(&self) -> &Metronome {
        &self.metronome
    }

    pub fn set_metronome(&mut self, enabled: bool) {
        info!("Metronome {}", if enabled { "on" } else { "off" });
        self.metronome.set_enabled(enabled);
    }

    /// Explicit operator choice; disables the record-arm auto-selection for
    /// the rest of the session.
    pub fn set_loop_scope(&mut self, scope: LoopScope) {
        self.scope = scope;
        self.scope_overridden = true;
        if !self.is_stopped() {
            self.active_scope = scope;
            let anchor = self.current_step().unwrap_or(self.play_step);
            self.loop_range = self.range_for(scope, anchor);
            if !self.loop_range.contains(&self.play_step) {
                self.play_step = self.loop_range.start;
            }
        }
        info!(
            "Loop scope set to {:?} (range {:?})",
            scope, self.loop_range
        );
    }

    /// Applies a tempo change from the next scheduled step on.
    pub fn retime(&mut self, meta: &PatternMeta, settings: &EngineSettings) {
        self.step_duration = meta.step_duration();
        self.gate = meta.gate_duration(settings.gate_ratio, settings.gate_max);
        debug!(
            "Transport retimed: step={:?}, gate={:?}",
            self.step_duration, self.gate
        );
    }

    fn range_for(&self, scope: LoopScope, step: usize) -> Range<usize> {
        match scope {
            LoopScope::Full => 0..self.play_steps,
            LoopScope::Bar => {
                let bar = (step / self.steps_per_bar).min(self.bars.saturating_sub(1));
                let start = bar * self.steps_per_bar;
                start..(start + self.steps_per_bar).min(self.play_steps)
            }
        }
    }

    /// Starts the transport at `now`. With `record_armed` a one-bar count-in
    /// runs first. Returns the loop range that will play.
    pub fn start(&mut self, now: Instant, start_step: usize, record_armed: bool) -> Range<usize> {
        if !self.is_stopped() {
            debug!("Start ignored, transport already {:?}", self.state);
            return self.loop_range();
        }
        self.active_scope = if record_armed && !self.scope_overridden {
            LoopScope::Bar
        } else {
            self.scope
        };
        self.loop_range = self.range_for(self.active_scope, start_step);
        self.play_step = self.loop_range.start;
        self.current = None;
        self.count_in.reset();
        self.next_step_time = Some(now);
        self.state = if record_armed {
            TransportState::CountIn
        } else {
            TransportState::Playing
        };
        info!(
            "Transport started: {:?}, scope {:?}, range {:?}, step {:?}",
            self.state, self.active_scope, self.loop_range, self.step_duration
        );
        self.loop_range()
    }

    /// Stops immediately. Every pending note-off is returned so the caller
    /// can release it right away.
    pub fn stop(&mut self) -> Vec<DeferredNoteOff> {
        let flushed = self.note_offs.flush_all();
        if !self.is_stopped() {
            info!(
                "Transport stopped, flushing {} pending note-offs",
                flushed.len()
            );
        }
        self.state = TransportState::Stopped;
        self.next_step_time = None;
        self.current = None;
        self.count_in.reset();
        self.play_step = self.loop_range.start;
        flushed
    }

    /// Runs one poll cycle of the step clock.
    pub fn tick(&mut self, now: Instant, grid: &StepGrid) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        let Some(due) = self.next_step_time else {
            return triggers;
        };
        if self.is_stopped() || now < due {
            return triggers;
        }

        match self.state {
            TransportState::CountIn => {
                let step = self.count_in.current_step();
                if let Some(accent) = self.metronome.click_at(step) {
                    triggers.push(self.fire_click(accent, step, due, now));
                }
                trace!("Count-in step {} fired", step);
                let complete = self.count_in.advance();
                self.advance_schedule(due, now);
                if complete {
                    self.state = TransportState::Playing;
                    self.play_step = self.loop_range.start;
                    self.current = None;
                    info!("Count-in complete, playing from step {}", self.play_step);
                }
            }
            TransportState::Playing => {
                let step = self.play_step;
                for (lane_index, lane) in grid.lanes.iter().enumerate() {
                    let Some(cell) = lane.cells.get(step) else {
                        continue;
                    };
                    if !cell.on {
                        continue;
                    }
                    self.note_offs.schedule(lane.note, now + self.gate);
                    triggers.push(Trigger {
                        kind: TriggerKind::Step { lane: lane_index },
                        note: lane.note,
                        velocity: level_to_velocity(cell.level),
                        step,
                        scheduled_at: due,
                        fired_at: now,
                    });
                }
                if let Some(accent) = self.metronome.playback_click(step) {
                    triggers.push(self.fire_click(accent, step, due, now));
                }
                trace!("Step {} fired with {} triggers", step, triggers.len());

                self.play_step = if step + 1 >= self.loop_range.end {
                    self.loop_range.start
                } else {
                    step + 1
                };
                let resynced = self.advance_schedule(due, now);
                self.current = Some((step, if resynced { now } else { due }));
            }
            TransportState::Stopped => {}
        }
        triggers
    }

    fn fire_click(&mut self, accent: ClickAccent, step: usize, due: Instant, now: Instant) -> Trigger {
        self.note_offs.schedule(self.click.note, now + self.gate);
        Trigger {
            kind: TriggerKind::Click(accent),
            note: self.click.note,
            velocity: self.click.velocity(accent),
            step,
            scheduled_at: due,
            fired_at: now,
        }
    }

    /// Moves the schedule one step on from the previous scheduled time.
    /// Returns `true` when it had to resynchronise to `now`.
    fn advance_schedule(&mut self, due: Instant, now: Instant) -> bool {
        let next = due + self.step_duration;
        if next <= now {
            self.resyncs += 1;
            warn!(
                "Transport fell {:?} behind schedule, resynchronising",
                now.duration_since(due)
            );
            self.next_step_time = Some(now + self.step_duration);
            true
        } else {
            self.next_step_time = Some(next);
            false
        }
    }

    pub fn schedule_note_off(&mut self, note: u8, due_time: Instant) {
        self.note_offs.schedule(note, due_time);
    }

    pub fn drain_due_note_offs(&mut self, now: Instant) -> Vec<DeferredNoteOff> {
        self.note_offs.drain_due(now)
    }

    pub fn pending_note_offs(&self) -> usize {
        self.note_offs.len()
    }

    /// Earliest moment the scheduler has work: the next step or note-off.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_step_time, self.note_offs.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn time_until_next_step(&self, now: Instant) -> Option<Duration> {
        self.next_step_time.map(|t| until(t, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TransportScheduler, StepGrid, PatternMeta) {
        let meta = PatternMeta::new("t", 120.0, 32);
        let grid = meta.empty_grid();
        (
            TransportScheduler::new(&meta, &EngineSettings::default()),
            grid,
            meta,
        )
    }

    #[test]
    fn test_stopped_tick_is_silent() {
        let (mut transport, grid, _) = setup();
        assert!(transport.tick(Instant::now(), &grid).is_empty());
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn test_nothing_fires_before_due() {
        let (mut transport, mut grid, _) = setup();
        grid.set_level(7, 1, 2);
        let t0 = Instant::now();
        transport.start(t0, 0, false);
        transport.tick(t0, &grid);
        let early = t0 + transport.step_duration() - Duration::from_millis(1);
        assert!(transport.tick(early, &grid).is_empty());
        assert_eq!(transport.play_step(), 1);
    }

    #[test]
    fn test_armed_start_selects_bar_scope() {
        let (mut transport, _, _) = setup();
        let range = transport.start(Instant::now(), 20, true);
        assert_eq!(range, 16..32);
        assert_eq!(transport.active_scope(), LoopScope::Bar);
        assert_eq!(transport.state(), TransportState::CountIn);
    }

    #[test]
    fn test_explicit_scope_beats_auto_selection() {
        let (mut transport, _, _) = setup();
        transport.set_loop_scope(LoopScope::Full);
        let range = transport.start(Instant::now(), 20, true);
        assert_eq!(range, 0..32);
    }

    #[test]
    fn test_bar_scope_wraps_inside_bar() {
        let (mut transport, grid, _) = setup();
        transport.set_loop_scope(LoopScope::Bar);
        let t0 = Instant::now();
        let d = transport.step_duration();
        transport.start(t0, 3, false);
        for n in 0..16u32 {
            transport.tick(t0 + d * n, &grid);
        }
        assert_eq!(transport.current_step(), Some(15));
        assert_eq!(transport.play_step(), 0);
    }

    #[test]
    fn test_stall_resynchronises_instead_of_bursting() {
        let (mut transport, mut grid, _) = setup();
        for step in 0..32 {
            grid.set_level(7, step, 2);
        }
        let t0 = Instant::now();
        let d = transport.step_duration();
        transport.start(t0, 0, false);
        assert_eq!(transport.tick(t0, &grid).len(), 1);

        let late = t0 + d * 10;
        assert_eq!(transport.tick(late, &grid).len(), 1);
        assert_eq!(transport.resync_count(), 1);
        assert_eq!(transport.next_step_time(), Some(late + d));
        assert!(transport.tick(late + d / 2, &grid).is_empty());
    }

    #[test]
    fn test_stop_flushes_pending_note_offs() {
        let (mut transport, mut grid, _) = setup();
        grid.set_level(7, 0, 3);
        grid.set_level(6, 0, 3);
        let t0 = Instant::now();
        transport.start(t0, 0, false);
        transport.tick(t0, &grid);
        assert_eq!(transport.pending_note_offs(), 2);
        let flushed = transport.stop();
        assert_eq!(flushed.len(), 2);
        assert_eq!(transport.pending_note_offs(), 0);
        assert!(transport.is_stopped());
    }
}
