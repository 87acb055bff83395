//! The live session: one grid, one transport and the I/O it talks to.
//!
//! [`Session::poll`] is the whole runtime. Each call drains pending input,
//! runs the step clock and releases due note-offs, in that order, and
//! reports how long the caller may wait before the next call.

use crate::config::{EngineSettings, MAX_BPM, MIN_BPM};
use crate::error::{ConfigError, Result};
use crate::exchange::{events_to_grid, grid_to_events, DrumEvent};
use crate::grid::{Selection, StepCell, StepGrid, MAX_LEVEL, MIN_ON_LEVEL};
use crate::midi::{InputHit, NoteInput, NoteOutput};
use crate::pattern::PatternMeta;
use crate::transport::timing::until;
use crate::transport::{
    AuditionReason, HitOutcome, InputQuantizer, LoopScope, TransportScheduler, Trigger,
};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::time::{Duration, Instant};

/// Unread statuses kept before the oldest is dropped.
const MAX_PENDING_STATUS: usize = 16;

/// Non-fatal conditions worth showing to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    OutputUnavailable,
    InputUnavailable,
    SendFailed(String),
    NoEmptySlot { note: u8 },
    ClipboardEmpty,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::OutputUnavailable => write!(f, "no MIDI output, playing silently"),
            Status::InputUnavailable => write!(f, "no MIDI input, live recording disabled"),
            Status::SendFailed(reason) => write!(f, "MIDI send failed: {}", reason),
            Status::NoEmptySlot { note } => write!(f, "no empty slot for note {}", note),
            Status::ClipboardEmpty => write!(f, "nothing copied yet"),
        }
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    pub triggers: Vec<Trigger>,
    /// Notes released this cycle.
    pub released: Vec<u8>,
    pub hits: Vec<HitOutcome>,
    /// How long the caller may sleep before polling again.
    pub wait: Duration,
}

pub struct Session {
    grid: StepGrid,
    meta: PatternMeta,
    settings: EngineSettings,
    transport: TransportScheduler,
    quantizer: InputQuantizer,
    cursor_lane: usize,
    cursor_step: usize,
    input_accent: u8,
    clipboard: Option<Vec<Vec<StepCell>>>,
    baseline: Vec<(bool, u8)>,
    leftover: Vec<DrumEvent>,
    status: VecDeque<Status>,
    output: Option<Box<dyn NoteOutput>>,
    input: Option<Box<dyn NoteInput>>,
    output_failing: bool,
}

impl Session {
    /// A session over an empty grid laid out for `meta`.
    pub fn new(meta: PatternMeta, settings: EngineSettings) -> Self {
        let grid = meta.empty_grid();
        Self::with_grid(meta, grid, settings)
    }

    pub fn with_grid(meta: PatternMeta, grid: StepGrid, settings: EngineSettings) -> Self {
        let meta = meta.normalized();
        let transport = TransportScheduler::new(&meta, &settings);
        let quantizer = InputQuantizer::new(&settings);
        let baseline = grid.signature();
        info!(
            "Session '{}' ready: {} steps, {} bars, {} BPM",
            meta.name, meta.steps, meta.bars, meta.bpm
        );
        Session {
            input_accent: settings.input_accent.clamp(MIN_ON_LEVEL, MAX_LEVEL),
            grid,
            meta,
            settings,
            transport,
            quantizer,
            cursor_lane: 0,
            cursor_step: 0,
            clipboard: None,
            baseline,
            leftover: Vec::new(),
            status: VecDeque::new(),
            output: None,
            input: None,
            output_failing: false,
        }
    }

    /// Builds the grid from exchange events. Events the grid cannot hold are
    /// kept and written back by [`Session::export_events`].
    pub fn from_events(events: &[DrumEvent], meta: PatternMeta, settings: EngineSettings) -> Self {
        let meta = meta.normalized();
        let (grid, leftover) = events_to_grid(events, &meta);
        let mut session = Self::with_grid(meta, grid, settings);
        session.leftover = leftover;
        session
    }

    pub fn attach_output(&mut self, output: Box<dyn NoteOutput>) {
        self.output = Some(output);
        self.output_failing = false;
    }

    pub fn attach_input(&mut self, input: Box<dyn NoteInput>) {
        self.input = Some(input);
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn grid(&self) -> &StepGrid {
        &self.grid
    }

    pub fn meta(&self) -> &PatternMeta {
        &self.meta
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn transport(&self) -> &TransportScheduler {
        &self.transport
    }

    /// Queues a status for the operator. The oldest entries go once
    /// `MAX_PENDING_STATUS` are waiting.
    pub fn report(&mut self, status: Status) {
        debug!("Status: {}", status);
        if self.status.len() >= MAX_PENDING_STATUS {
            self.status.pop_front();
        }
        self.status.push_back(status);
    }

    /// Oldest unread status.
    pub fn take_status(&mut self) -> Option<Status> {
        self.status.pop_front()
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_lane, self.cursor_step)
    }

    /// Moves the edit cursor, clamped to the grid.
    pub fn set_cursor(&mut self, lane: usize, step: usize) {
        self.cursor_lane = lane.min(self.grid.lanes.len().saturating_sub(1));
        self.cursor_step = step.min(self.grid.steps.saturating_sub(1));
    }

    pub fn input_accent(&self) -> u8 {
        self.input_accent
    }

    /// 1 → 2 → 3 → 1.
    pub fn cycle_input_accent(&mut self) -> u8 {
        self.input_accent = if self.input_accent >= MAX_LEVEL {
            MIN_ON_LEVEL
        } else {
            self.input_accent + 1
        };
        info!("Input accent level {}", self.input_accent);
        self.input_accent
    }

    pub fn is_record_armed(&self) -> bool {
        self.quantizer.is_armed()
    }

    /// Takes effect on live input immediately; the count-in only happens on
    /// the next start.
    pub fn set_record_armed(&mut self, armed: bool) {
        info!("Record {}", if armed { "armed" } else { "disarmed" });
        self.quantizer.set_armed(armed);
    }

    pub fn toggle_record_armed(&mut self) -> bool {
        let armed = !self.is_record_armed();
        self.set_record_armed(armed);
        armed
    }

    pub fn set_metronome(&mut self, enabled: bool) {
        self.settings.metronome = enabled;
        self.transport.set_metronome(enabled);
    }

    pub fn toggle_metronome(&mut self) -> bool {
        let enabled = !self.transport.metronome().is_enabled();
        self.set_metronome(enabled);
        enabled
    }

    pub fn set_loop_scope(&mut self, scope: LoopScope) {
        self.transport.set_loop_scope(scope);
    }

    pub fn toggle_loop_scope(&mut self) -> LoopScope {
        let scope = match self.transport.active_scope() {
            LoopScope::Full => LoopScope::Bar,
            LoopScope::Bar => LoopScope::Full,
        };
        self.set_loop_scope(scope);
        scope
    }

    pub fn set_advance_cursor_on_hit(&mut self, advance: bool) {
        self.settings.advance_cursor_on_hit = advance;
        self.quantizer.set_advance_cursor_on_hit(advance);
    }

    /// Changes the tempo from the next scheduled step on.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(ConfigError::TempoOutOfRange {
                bpm,
                min: MIN_BPM,
                max: MAX_BPM,
            });
        }
        self.meta.bpm = bpm;
        self.transport.retime(&self.meta, &self.settings);
        info!("Tempo set to {} BPM", bpm);
        Ok(())
    }

    /// Starts playback from the bar under the edit cursor. With record armed
    /// a one-bar count-in runs first.
    pub fn start(&mut self, now: Instant) -> Range<usize> {
        let armed = self.quantizer.is_armed();
        self.transport.start(now, self.cursor_step, armed)
    }

    /// Stops and releases every sounding note right away.
    pub fn stop(&mut self) {
        let flushed = self.transport.stop();
        let channel = self.meta.channel;
        for off in flushed {
            self.send_note_off(off.note);
        }
        if let Some(output) = self.output.as_mut() {
            if let Err(e) = output.all_notes_off(channel) {
                warn!("All notes off failed: {}", e);
            }
        }
    }

    /// Returns `true` when the transport is running afterwards.
    pub fn toggle_play(&mut self, now: Instant) -> bool {
        if self.transport.is_stopped() {
            self.start(now);
            true
        } else {
            self.stop();
            false
        }
    }

    /// One cooperative cycle: input, step clock, note releases.
    pub fn poll(&mut self, now: Instant) -> PollReport {
        let mut report = PollReport::default();

        let pending = match self.input.as_mut() {
            Some(input) => input.poll_pending(),
            None => Vec::new(),
        };
        for hit in pending {
            report.hits.push(self.handle_hit(&hit, now));
        }

        let triggers = self.transport.tick(now, &self.grid);
        for trigger in &triggers {
            self.send_note_on(trigger.note, trigger.velocity);
        }
        report.triggers = triggers;

        for off in self.transport.drain_due_note_offs(now) {
            self.send_note_off(off.note);
            report.released.push(off.note);
        }

        let max_wait = self.settings.max_poll_interval;
        report.wait = self
            .transport
            .next_deadline()
            .map_or(max_wait, |deadline| until(deadline, now).min(max_wait));
        report
    }

    /// Quantizes or auditions a single live hit.
    pub fn handle_hit(&mut self, hit: &InputHit, now: Instant) -> HitOutcome {
        let outcome = self.quantizer.process(
            hit,
            &mut self.grid,
            &self.transport,
            &mut self.cursor_step,
        );
        if outcome == HitOutcome::Ignored {
            return outcome;
        }
        if outcome == HitOutcome::Auditioned(AuditionReason::NoEmptySlot) {
            self.report(Status::NoEmptySlot { note: hit.note });
        }
        self.send_note_on(hit.note, hit.velocity);
        self.transport
            .schedule_note_off(hit.note, now + self.transport.gate());
        outcome
    }

    fn send_note_on(&mut self, note: u8, velocity: u8) {
        let channel = self.meta.channel;
        let Some(output) = self.output.as_mut() else {
            return;
        };
        let result = output.send_note_on(channel, note, velocity);
        self.note_send_result(result);
    }

    fn send_note_off(&mut self, note: u8) {
        let channel = self.meta.channel;
        let Some(output) = self.output.as_mut() else {
            return;
        };
        let result = output.send_note_off(channel, note);
        self.note_send_result(result);
    }

    fn note_send_result(&mut self, result: crate::midi::Result<()>) {
        match result {
            Ok(()) => self.output_failing = false,
            Err(e) => {
                if !self.output_failing {
                    warn!("{}", e);
                    self.report(Status::SendFailed(e.to_string()));
                }
                self.output_failing = true;
            }
        }
    }

    pub fn toggle_cell(&mut self, lane: usize, step: usize) -> bool {
        self.grid.toggle(lane, step, self.input_accent)
    }

    pub fn toggle_at_cursor(&mut self) -> bool {
        self.toggle_cell(self.cursor_lane, self.cursor_step)
    }

    pub fn adjust_level(&mut self, lane: usize, step: usize, delta: i8) -> bool {
        self.grid.adjust_level(lane, step, delta)
    }

    pub fn clear(&mut self, selection: Selection) -> bool {
        self.grid.clear(selection)
    }

    pub fn copy_bar(&mut self, src_page: usize, dst_page: usize) -> bool {
        self.grid.copy_bar(src_page, dst_page)
    }

    /// Copies bar `page` to the clipboard.
    pub fn yank_bar(&mut self, page: usize) -> bool {
        match self.grid.bar_cells(page) {
            Some(cells) => {
                self.clipboard = Some(cells);
                true
            }
            None => false,
        }
    }

    pub fn paste_bar(&mut self, page: usize) -> bool {
        match self.clipboard.as_ref() {
            Some(cells) => self.grid.paste_bar(page, cells),
            None => {
                self.report(Status::ClipboardEmpty);
                false
            }
        }
    }

    pub fn is_modified(&self) -> bool {
        self.grid.signature() != self.baseline
    }

    pub fn mark_saved(&mut self) {
        self.baseline = self.grid.signature();
    }

    /// The grid as exchange events, merged with whatever the import left over.
    pub fn export_events(&self) -> Vec<DrumEvent> {
        grid_to_events(&self.grid, &self.meta, &self.leftover)
    }
}
