pub mod cli;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod exchange;
pub mod grid;
pub mod logging;
pub mod midi;
pub mod pattern;
pub mod session;
pub mod transport;

pub use crate::config::{Config, EngineSettings};
pub use error::ConfigError;
pub use event_loop::{EngineMessage, EventLoop, TransportAction};
pub use exchange::{events_to_grid, grid_to_events, DrumEvent, EventKind, PatternFormat};
pub use grid::{Selection, StepCell, StepGrid, StepLane};
pub use pattern::{PatternMeta, SectionRanges};
pub use session::{PollReport, Session, Status};
pub use transport::{LoopScope, TransportScheduler, TransportState};
