// event_loop.rs

use crate::session::Session;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    Start,
    Stop,
    Toggle,
}

/// Commands the host sends into a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineMessage {
    TransportCommand(TransportAction),
    ToggleRecord,
    ToggleMetronome,
    ToggleLoopScope,
    CycleAccent,
    SetBpm(f64),
    Quit,
}

/// Single cooperative driver: polls the session and applies host commands
/// between polls. The wait between polls is spent blocked on the command
/// channel so a command is handled as soon as it arrives.
pub struct EventLoop {
    session: Session,
    command_rx: Receiver<EngineMessage>,
    polls: u64,
}

impl EventLoop {
    pub fn new(session: Session, command_rx: Receiver<EngineMessage>) -> Self {
        EventLoop {
            session,
            command_rx,
            polls: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn poll_count(&self) -> u64 {
        self.polls
    }

    /// Runs until `Quit` or until every command sender is gone.
    pub fn run(&mut self) {
        self.run_until(None);
    }

    /// Runs for `duration`, or less if `Quit` arrives first.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(Some(Instant::now() + duration));
    }

    fn run_until(&mut self, deadline: Option<Instant>) {
        info!("Event loop running");
        let mut commands_open = true;
        loop {
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                info!("Event loop reached its deadline");
                break;
            }
            let report = self.session.poll(now);
            self.polls += 1;
            while let Some(status) = self.session.take_status() {
                warn!("{}", status);
            }

            let mut wait = report.wait;
            if let Some(d) = deadline {
                wait = wait.min(d.saturating_duration_since(now));
            }

            if !commands_open {
                thread::sleep(wait);
                continue;
            }
            match self.command_rx.recv_timeout(wait) {
                Ok(message) => {
                    if !self.handle(message, Instant::now()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if deadline.is_none() {
                        info!("Command channel closed, leaving event loop");
                        break;
                    }
                    debug!("Command channel closed, running until deadline");
                    commands_open = false;
                }
            }
        }
        self.session.stop();
        info!("Event loop stopped after {} polls", self.polls);
    }

    /// Applies one command. Returns `false` when the loop should exit.
    pub fn handle(&mut self, message: EngineMessage, now: Instant) -> bool {
        debug!("Handling {:?}", message);
        match message {
            EngineMessage::TransportCommand(TransportAction::Start) => {
                if self.session.transport().is_stopped() {
                    self.session.start(now);
                }
            }
            EngineMessage::TransportCommand(TransportAction::Stop) => self.session.stop(),
            EngineMessage::TransportCommand(TransportAction::Toggle) => {
                self.session.toggle_play(now);
            }
            EngineMessage::ToggleRecord => {
                self.session.toggle_record_armed();
            }
            EngineMessage::ToggleMetronome => {
                self.session.toggle_metronome();
            }
            EngineMessage::ToggleLoopScope => {
                self.session.toggle_loop_scope();
            }
            EngineMessage::CycleAccent => {
                self.session.cycle_input_accent();
            }
            EngineMessage::SetBpm(bpm) => {
                if let Err(e) = self.session.set_bpm(bpm) {
                    warn!("{}", e);
                }
            }
            EngineMessage::Quit => {
                info!("Quit requested");
                return false;
            }
        }
        true
    }
}
