//! Conversion between the step grid and flat drum event lists, used when a
//! session starts from or ends into a pattern file owned by someone else.

use crate::grid::{level_to_velocity, velocity_to_level, StepGrid, DEFAULT_DRUM_LANES};
use crate::pattern::PatternMeta;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrumEvent {
    pub tick: i64,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub kind: EventKind,
}

impl DrumEvent {
    pub fn on(tick: i64, channel: u8, note: u8, velocity: u8) -> Self {
        DrumEvent {
            tick,
            channel,
            note,
            velocity,
            kind: EventKind::On,
        }
    }

    pub fn off(tick: i64, channel: u8, note: u8) -> Self {
        DrumEvent {
            tick,
            channel,
            note,
            velocity: 0,
            kind: EventKind::Off,
        }
    }
}

/// Pattern file formats known to the surrounding tools. Resolved once from
/// the file name; the engine itself never parses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFormat {
    /// Text drum pattern.
    Adt,
    /// Binary drum pattern.
    Adp,
    /// Arrangement (pattern chain).
    Arr,
}

impl PatternFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "adt" | "apt" => Some(PatternFormat::Adt),
            "adp" => Some(PatternFormat::Adp),
            "arr" => Some(PatternFormat::Arr),
            _ => None,
        }
    }
}

/// Note-off length written for every exported hit, as a fraction of the loop.
const NOTE_LEN_DIVISOR: u32 = 16;

/// Projects `events` onto a grid with the default lane layout. Events the grid
/// cannot hold are returned untouched as leftovers.
pub fn events_to_grid(events: &[DrumEvent], meta: &PatternMeta) -> (StepGrid, Vec<DrumEvent>) {
    events_to_grid_with_layout(events, meta, &DEFAULT_DRUM_LANES)
}

/// Like [`events_to_grid`] with an explicit `(label, note)` lane layout.
///
/// Only note-ons on the pattern channel whose note has a lane and whose tick
/// rounds to a step inside the grid land in the grid; several hits on the
/// same cell keep the loudest. A note-off that closes one of those note-ons
/// is consumed with it, since export writes a fresh one.
pub fn events_to_grid_with_layout<S: AsRef<str>>(
    events: &[DrumEvent],
    meta: &PatternMeta,
    layout: &[(S, u8)],
) -> (StepGrid, Vec<DrumEvent>) {
    let layout: Vec<(&str, u8)> = layout.iter().map(|(l, n)| (l.as_ref(), *n)).collect();
    let mut grid = StepGrid::new(&layout, meta.steps, meta.steps_per_bar);
    let step_ticks = meta.step_ticks();
    let mut leftover = Vec::new();
    // (note, tick) of every note-on that went into the grid and is still open.
    let mut open: Vec<(u8, i64)> = Vec::new();

    for event in events {
        let level = velocity_to_level(event.velocity);
        if event.kind != EventKind::On || event.channel != meta.channel || level == 0 {
            leftover.push(event.clone());
            continue;
        }
        let Some(lane) = grid.lane_for_note(event.note) else {
            leftover.push(event.clone());
            continue;
        };
        let relative = event.tick - i64::from(meta.loop_start_tick);
        if relative < 0 {
            leftover.push(event.clone());
            continue;
        }
        let step = (relative as f64 / step_ticks).round() as usize;
        if step >= grid.steps {
            leftover.push(event.clone());
            continue;
        }
        grid.stamp(lane, step, level);
        open.push((event.note, event.tick));
    }

    leftover.retain(|event| {
        if event.kind != EventKind::Off || event.channel != meta.channel {
            return true;
        }
        let closes = open
            .iter()
            .enumerate()
            .filter(|(_, (note, tick))| *note == event.note && *tick <= event.tick)
            .min_by_key(|(_, (_, tick))| *tick)
            .map(|(index, _)| index);
        match closes {
            Some(index) => {
                open.swap_remove(index);
                false
            }
            None => true,
        }
    });

    log::debug!(
        "Imported {} hits from {} events ({} leftover)",
        grid.hit_count(),
        events.len(),
        leftover.len()
    );
    (grid, leftover)
}

/// Flattens `grid` back into note-on/note-off pairs, merged with `leftover`
/// and sorted by tick.
pub fn grid_to_events(grid: &StepGrid, meta: &PatternMeta, leftover: &[DrumEvent]) -> Vec<DrumEvent> {
    let loop_len = meta.loop_len_ticks.max(1);
    let step_ticks = f64::from(loop_len) / grid.steps.max(1) as f64;
    let note_len = i64::from(loop_len / NOTE_LEN_DIVISOR);
    let start = i64::from(meta.loop_start_tick);

    let mut events = Vec::with_capacity(grid.hit_count() * 2 + leftover.len());
    for lane in &grid.lanes {
        for (step, cell) in lane.cells.iter().enumerate() {
            if !cell.on {
                continue;
            }
            let on_tick = start + (step as f64 * step_ticks).round() as i64;
            events.push(DrumEvent::on(
                on_tick,
                meta.channel,
                lane.note,
                level_to_velocity(cell.level),
            ));
            events.push(DrumEvent::off(on_tick + note_len, meta.channel, lane.note));
        }
    }
    events.extend(leftover.iter().cloned());
    events.sort_by_key(|e| e.tick);
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            PatternFormat::from_path(Path::new("rock_p001.ADT")),
            Some(PatternFormat::Adt)
        );
        assert_eq!(
            PatternFormat::from_path(Path::new("set.arr")),
            Some(PatternFormat::Arr)
        );
        assert_eq!(PatternFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(PatternFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_export_writes_on_off_pairs() {
        let meta = PatternMeta::new("t", 120.0, 32);
        let mut grid = meta.empty_grid();
        grid.set_level(7, 4, 3);
        let events = grid_to_events(&grid, &meta, &[]);
        assert_eq!(
            events,
            vec![
                DrumEvent::on(480, 9, 36, 120),
                DrumEvent::off(480 + 240, 9, 36)
            ]
        );
    }

    #[test]
    fn test_loudest_duplicate_wins() {
        let meta = PatternMeta::new("t", 120.0, 32);
        let events = vec![
            DrumEvent::on(0, 9, 38, 50),
            DrumEvent::on(10, 9, 38, 115),
            DrumEvent::on(-5, 9, 38, 70),
        ];
        let (grid, leftover) = events_to_grid(&events, &meta);
        assert_eq!(grid.cell(6, 0).map(|c| c.level), Some(3));
        assert_eq!(leftover, vec![DrumEvent::on(-5, 9, 38, 70)]);
    }

    #[test]
    fn test_note_offs_of_imported_hits_are_consumed() {
        let meta = PatternMeta::new("t", 120.0, 32);
        let events = vec![
            DrumEvent::on(0, 9, 36, 120),
            DrumEvent::off(240, 9, 36),
            DrumEvent::off(300, 9, 36),
            DrumEvent::on(3900, 9, 38, 100),
            DrumEvent::off(4000, 9, 38),
            DrumEvent::off(240, 3, 36),
        ];
        let (grid, leftover) = events_to_grid(&events, &meta);
        assert_eq!(grid.hit_count(), 1);
        assert_eq!(
            leftover,
            vec![
                DrumEvent::off(300, 9, 36),
                DrumEvent::on(3900, 9, 38, 100),
                DrumEvent::off(4000, 9, 38),
                DrumEvent::off(240, 3, 36),
            ]
        );
    }
}
