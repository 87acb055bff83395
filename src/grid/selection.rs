use super::StepGrid;
use std::ops::Range;

/// A rectangular region of the grid an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Cell { lane: usize, step: usize },
    /// One lane across one bar.
    LaneInBar { lane: usize, page: usize },
    /// One step column (every lane) inside one bar. `step` is bar-relative.
    StepInBar { step: usize, page: usize },
    Bar { page: usize },
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionBounds {
    pub lanes: Range<usize>,
    pub steps: Range<usize>,
}

impl Selection {
    /// Resolves the selection against `grid`. `None` when any part of it
    /// falls outside the grid.
    pub fn bounds(&self, grid: &StepGrid) -> Option<SelectionBounds> {
        let lane_count = grid.lanes.len();
        let all_lanes = 0..lane_count;
        match *self {
            Selection::Cell { lane, step } => {
                (lane < lane_count && step < grid.steps).then(|| SelectionBounds {
                    lanes: lane..lane + 1,
                    steps: step..step + 1,
                })
            }
            Selection::LaneInBar { lane, page } => {
                let steps = grid.bar_range(page)?;
                (lane < lane_count).then(|| SelectionBounds {
                    lanes: lane..lane + 1,
                    steps,
                })
            }
            Selection::StepInBar { step, page } => {
                let bar = grid.bar_range(page)?;
                let absolute = bar.start.checked_add(step)?;
                (absolute < bar.end).then(|| SelectionBounds {
                    lanes: all_lanes,
                    steps: absolute..absolute + 1,
                })
            }
            Selection::Bar { page } => Some(SelectionBounds {
                lanes: all_lanes,
                steps: grid.bar_range(page)?,
            }),
            Selection::All => Some(SelectionBounds {
                lanes: all_lanes,
                steps: 0..grid.steps,
            }),
        }
    }
}
