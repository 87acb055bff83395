//! Step grid model
//!
//! The grid is a set of lanes (one per drum note) by a fixed number of steps.
//! Every edit here is synchronous and touches nothing but the grid. Addressing
//! outside the grid is rejected and reported with a `false` return instead of
//! a panic; callers clamp their cursor before calling.

pub mod drum_map;
mod selection;

pub use drum_map::{
    clamp_on_level, drum_label, is_core_note, level_to_velocity, velocity_to_level,
    DEFAULT_DRUM_LANES, MAX_LEVEL, MIN_ON_LEVEL,
};
pub use selection::{Selection, SelectionBounds};

use std::ops::Range;

/// Grid lengths the engine supports.
pub const SUPPORTED_STEPS: [usize; 3] = [24, 32, 48];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCell {
    pub on: bool,
    pub level: u8,
}

impl StepCell {
    pub const REST: StepCell = StepCell { on: false, level: 0 };

    pub fn hit(level: u8) -> Self {
        StepCell {
            on: true,
            level: clamp_on_level(level),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLane {
    pub label: String,
    pub note: u8,
    pub cells: Vec<StepCell>,
    /// Core lanes are never rebound to another note.
    pub core: bool,
}

impl StepLane {
    pub fn new(label: impl Into<String>, note: u8, steps: usize) -> Self {
        StepLane {
            label: label.into(),
            note,
            cells: vec![StepCell::REST; steps],
            core: is_core_note(note),
        }
    }

    /// A lane is assigned once it holds at least one hit.
    pub fn is_assigned(&self) -> bool {
        self.cells.iter().any(|c| c.on)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepGrid {
    pub lanes: Vec<StepLane>,
    pub steps: usize,
    pub steps_per_bar: usize,
}

impl StepGrid {
    pub fn new(layout: &[(&str, u8)], steps: usize, steps_per_bar: usize) -> Self {
        StepGrid {
            lanes: layout
                .iter()
                .map(|(label, note)| StepLane::new(*label, *note, steps))
                .collect(),
            steps,
            steps_per_bar: steps_per_bar.clamp(1, steps.max(1)),
        }
    }

    pub fn with_default_lanes(steps: usize, steps_per_bar: usize) -> Self {
        Self::new(&DEFAULT_DRUM_LANES, steps, steps_per_bar)
    }

    pub fn cell(&self, lane: usize, step: usize) -> Option<StepCell> {
        self.lanes.get(lane)?.cells.get(step).copied()
    }

    fn cell_mut(&mut self, lane: usize, step: usize) -> Option<&mut StepCell> {
        self.lanes.get_mut(lane)?.cells.get_mut(step)
    }

    pub fn lane_for_note(&self, note: u8) -> Option<usize> {
        self.lanes.iter().position(|l| l.note == note)
    }

    pub fn bar_count(&self) -> usize {
        self.steps.div_ceil(self.steps_per_bar)
    }

    /// Step range covered by bar `page`, `None` past the last bar.
    pub fn bar_range(&self, page: usize) -> Option<Range<usize>> {
        let start = page.checked_mul(self.steps_per_bar)?;
        if start >= self.steps {
            return None;
        }
        Some(start..(start + self.steps_per_bar).min(self.steps))
    }

    /// Turns an off cell on at `accent`, or an on cell off.
    pub fn toggle(&mut self, lane: usize, step: usize, accent: u8) -> bool {
        match self.cell_mut(lane, step) {
            Some(cell) => {
                *cell = if cell.on {
                    StepCell::REST
                } else {
                    StepCell::hit(accent)
                };
                true
            }
            None => false,
        }
    }

    /// Moves the level of an on cell by `delta`, clamped to 1..=3.
    pub fn adjust_level(&mut self, lane: usize, step: usize, delta: i8) -> bool {
        match self.cell_mut(lane, step) {
            Some(cell) if cell.on => {
                let level = (i16::from(cell.level) + i16::from(delta))
                    .clamp(i16::from(MIN_ON_LEVEL), i16::from(MAX_LEVEL));
                cell.level = level as u8;
                true
            }
            _ => false,
        }
    }

    /// Sets a cell directly. Level 0 turns it off.
    pub fn set_level(&mut self, lane: usize, step: usize, level: u8) -> bool {
        match self.cell_mut(lane, step) {
            Some(cell) => {
                *cell = if level == 0 {
                    StepCell::REST
                } else {
                    StepCell::hit(level)
                };
                true
            }
            None => false,
        }
    }

    /// Turns a cell on keeping the stronger of its current and the new level.
    pub fn stamp(&mut self, lane: usize, step: usize, level: u8) -> bool {
        match self.cell_mut(lane, step) {
            Some(cell) => {
                let existing = if cell.on { cell.level } else { 0 };
                *cell = StepCell::hit(existing.max(level));
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, selection: Selection) -> bool {
        let Some(bounds) = selection.bounds(self) else {
            return false;
        };
        for lane in &mut self.lanes[bounds.lanes] {
            for cell in &mut lane.cells[bounds.steps.clone()] {
                *cell = StepCell::REST;
            }
        }
        true
    }

    pub fn clear_bar(&mut self, page: usize) -> bool {
        self.clear(Selection::Bar { page })
    }

    pub fn clear_lane_in_bar(&mut self, lane: usize, page: usize) -> bool {
        self.clear(Selection::LaneInBar { lane, page })
    }

    pub fn clear_step_in_bar(&mut self, step: usize, page: usize) -> bool {
        self.clear(Selection::StepInBar { step, page })
    }

    /// Copies every lane of bar `src_page` onto bar `dst_page`.
    pub fn copy_bar(&mut self, src_page: usize, dst_page: usize) -> bool {
        let (Some(src), Some(dst)) = (self.bar_range(src_page), self.bar_range(dst_page)) else {
            return false;
        };
        if src.len() != dst.len() {
            return false;
        }
        if src == dst {
            return true;
        }
        for lane in &mut self.lanes {
            lane.cells.copy_within(src.clone(), dst.start);
        }
        true
    }

    /// Cells of bar `page` for every lane, in lane order.
    pub fn bar_cells(&self, page: usize) -> Option<Vec<Vec<StepCell>>> {
        let range = self.bar_range(page)?;
        Some(
            self.lanes
                .iter()
                .map(|lane| lane.cells[range.clone()].to_vec())
                .collect(),
        )
    }

    /// Writes cells captured by [`StepGrid::bar_cells`] into bar `page`.
    pub fn paste_bar(&mut self, page: usize, cells: &[Vec<StepCell>]) -> bool {
        let Some(range) = self.bar_range(page) else {
            return false;
        };
        if cells.len() != self.lanes.len() || cells.iter().any(|c| c.len() != range.len()) {
            return false;
        }
        for (lane, src) in self.lanes.iter_mut().zip(cells) {
            lane.cells[range.clone()].copy_from_slice(src);
        }
        true
    }

    /// Resolves the lane a recorded `note` goes to.
    ///
    /// A lane already bound to the note wins. Otherwise the first completely
    /// empty, non-core lane is rebound to the note. `None` when no such lane
    /// is left.
    pub fn ensure_lane_for_note(&mut self, note: u8) -> Option<usize> {
        if let Some(index) = self.lane_for_note(note) {
            return Some(index);
        }
        let index = self
            .lanes
            .iter()
            .position(|lane| !lane.core && !lane.is_assigned())?;
        let lane = &mut self.lanes[index];
        log::debug!(
            "Rebinding lane {} from {} ({}) to {} ({})",
            index,
            lane.label,
            lane.note,
            drum_label(note),
            note
        );
        lane.note = note;
        lane.label = drum_label(note);
        Some(index)
    }

    pub fn hit_count(&self) -> usize {
        self.lanes
            .iter()
            .map(|lane| lane.cells.iter().filter(|c| c.on).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hit_count() == 0
    }

    /// (on, level) projection of every cell, lane-major. Two grids with the
    /// same signature sound the same.
    pub fn signature(&self) -> Vec<(bool, u8)> {
        self.lanes
            .iter()
            .flat_map(|lane| {
                lane.cells
                    .iter()
                    .map(|c| (c.on, if c.on { c.level } else { 0 }))
            })
            .collect()
    }

    pub fn layout(&self) -> Vec<(String, u8)> {
        self.lanes
            .iter()
            .map(|lane| (lane.label.clone(), lane.note))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> StepGrid {
        StepGrid::with_default_lanes(32, 16)
    }

    #[test]
    fn test_toggle_uses_accent_and_turns_off() {
        let mut g = grid();
        assert!(g.toggle(0, 5, 3));
        assert_eq!(g.cell(0, 5), Some(StepCell { on: true, level: 3 }));
        assert!(g.toggle(0, 5, 3));
        assert_eq!(g.cell(0, 5), Some(StepCell::REST));
    }

    #[test]
    fn test_toggle_never_stores_level_zero() {
        let mut g = grid();
        g.toggle(1, 1, 0);
        assert_eq!(g.cell(1, 1), Some(StepCell { on: true, level: 1 }));
    }

    #[test]
    fn test_adjust_level_ignores_rest_cells() {
        let mut g = grid();
        assert!(!g.adjust_level(0, 0, 1));
        assert_eq!(g.cell(0, 0), Some(StepCell::REST));
    }

    #[test]
    fn test_out_of_range_edits_are_rejected() {
        let mut g = grid();
        let before = g.clone();
        assert!(!g.toggle(99, 0, 2));
        assert!(!g.toggle(0, 32, 2));
        assert!(!g.set_level(0, 40, 2));
        assert!(!g.clear_bar(2));
        assert!(!g.copy_bar(0, 5));
        assert_eq!(g, before);
    }

    #[test]
    fn test_copy_bar_within_lanes() {
        let mut g = grid();
        g.set_level(7, 0, 3);
        g.set_level(6, 4, 2);
        g.set_level(6, 20, 1);
        assert!(g.copy_bar(0, 1));
        assert_eq!(g.cell(7, 16), Some(StepCell { on: true, level: 3 }));
        assert_eq!(g.cell(6, 20), Some(StepCell { on: true, level: 2 }));
    }

    #[test]
    fn test_clear_step_in_bar_clears_column() {
        let mut g = grid();
        for lane in 0..g.lanes.len() {
            g.set_level(lane, 18, 2);
        }
        g.set_level(0, 2, 2);
        assert!(g.clear_step_in_bar(2, 1));
        assert!((0..g.lanes.len()).all(|l| !g.cell(l, 18).unwrap().on));
        assert!(g.cell(0, 2).unwrap().on);
    }

    #[test]
    fn test_ensure_lane_prefers_existing_binding() {
        let mut g = grid();
        assert_eq!(g.ensure_lane_for_note(36), Some(7));
    }

    #[test]
    fn test_ensure_lane_rebinds_first_empty_non_core_lane() {
        let mut g = grid();
        g.set_level(0, 0, 2);
        let lane = g.ensure_lane_for_note(39).unwrap();
        assert_eq!(lane, 1);
        assert_eq!(g.lanes[1].note, 39);
        assert_eq!(g.lanes[1].label, "CLAP");
    }

    #[test]
    fn test_ensure_lane_reports_no_slot() {
        let mut g = grid();
        for lane in 0..4 {
            g.set_level(lane, 0, 2);
        }
        assert_eq!(g.ensure_lane_for_note(39), None);
    }

    #[test]
    fn test_paste_bar_checks_shape() {
        let mut g = grid();
        g.set_level(2, 3, 2);
        let clip = g.bar_cells(0).unwrap();
        assert!(g.paste_bar(1, &clip));
        assert_eq!(g.cell(2, 19), Some(StepCell { on: true, level: 2 }));
        assert!(!g.paste_bar(1, &clip[..3]));
    }
}
