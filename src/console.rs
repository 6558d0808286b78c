//! Foreground side of the link: sends commands, consumes reader events and keeps
//! the instrument state and communication log current.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::command::Command;
use crate::dispatch::{classify, Dispatch};
use crate::error::LinkError;
use crate::journal::{Direction, Journal};
use crate::monitor::MonitorSchedule;
use crate::pattern::{LedPattern, PatternPlayer};
use crate::state::InstrumentState;
use crate::transport::{DisconnectReason, Endpoint, LinkConfig, LinkEvent, Port, SerialLink};

pub struct Console {
    link: SerialLink,
    events: Receiver<LinkEvent>,
    state: InstrumentState,
    journal: Journal,
    monitor: MonitorSchedule,
    pattern: Option<PatternPlayer>,
}

impl Console {
    pub fn new(config: LinkConfig, monitor: MonitorSchedule) -> Self {
        let (link, events) = SerialLink::new(config);
        Self {
            link,
            events,
            state: InstrumentState::new(),
            journal: Journal::new(),
            monitor,
            pattern: None,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn monitor(&self) -> &MonitorSchedule {
        &self.monitor
    }

    /// The LED pattern still playing, if any.
    pub fn pattern(&self) -> Option<LedPattern> {
        self.pattern.as_ref().map(PatternPlayer::pattern)
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.link.endpoint()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Adds an error line to the log, e.g. for a command that failed validation.
    pub fn log_error(&mut self, text: impl Into<String>) {
        self.journal.push(Direction::Error, text);
    }

    /// Opens `path` at `baud`, closing any current connection first.
    pub fn connect(&mut self, path: &str, baud: u32) -> Result<(), LinkError> {
        self.disconnect();
        match self.link.connect(path, baud) {
            Ok(_) => {
                self.journal
                    .push(Direction::Info, format!("Connected to {} at {} baud", path, baud));
                Ok(())
            }
            Err(e) => {
                self.journal.push(Direction::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Starts a session over an already-open port.
    pub fn attach(&mut self, endpoint: Endpoint, port: Box<dyn Port>) {
        self.disconnect();
        let text = format!("Connected to {} at {} baud", endpoint.path, endpoint.baud);
        self.link.attach(endpoint, port);
        self.journal.push(Direction::Info, text);
    }

    /// Closes the connection. Does nothing when already closed.
    pub fn disconnect(&mut self) {
        if self.link.endpoint().is_none() {
            return;
        }
        self.link.disconnect();
        self.monitor.halt();
        self.pattern = None;
        // Lines read before the stop request are still handled, in order.
        self.drain();
        self.journal.push(Direction::Info, "Disconnected");
    }

    /// Writes a command. Outputs are updated only once the write succeeded.
    pub fn send(&mut self, command: Command) -> Result<(), LinkError> {
        let text = command.to_string();
        match self.link.send(&text) {
            Ok(()) => {
                self.journal.push(Direction::Sent, text);
                self.state.outputs.record(&command);
                Ok(())
            }
            Err(e) => {
                warn!("Could not send '{}': {}", text, e);
                self.journal.push(Direction::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Sends several commands, stopping at the first failure.
    pub fn send_all(&mut self, commands: impl IntoIterator<Item = Command>) -> Result<(), LinkError> {
        for command in commands {
            self.send(command)?;
        }
        Ok(())
    }

    /// Turns monitoring on or off, sending `MON:START` / `MON:STOP`.
    pub fn toggle_monitoring(&mut self, now: Instant) -> Result<(), LinkError> {
        if self.monitor.is_running() {
            let stop = self.monitor.stop();
            return self.send(stop);
        }
        let start = self.monitor.start(now);
        let result = self.send(start);
        if result.is_err() {
            self.monitor.halt();
        }
        result
    }

    /// Starts an LED pattern, replacing one already playing. Its first step goes
    /// out immediately.
    pub fn play_pattern(&mut self, pattern: LedPattern, now: Instant) -> Result<(), LinkError> {
        self.pattern = Some(PatternPlayer::new(pattern, now));
        self.advance_pattern(now)
    }

    /// Sends the monitoring polls and pattern steps that are due.
    pub fn tick(&mut self, now: Instant) -> Result<(), LinkError> {
        if let Some(polls) = self.monitor.due(now) {
            self.send_all(polls)?;
        }
        self.advance_pattern(now)
    }

    fn advance_pattern(&mut self, now: Instant) -> Result<(), LinkError> {
        let Some(player) = self.pattern.as_mut() else {
            return Ok(());
        };
        let steps = player.due(now);
        if player.is_finished() {
            self.pattern = None;
        }
        let result = self.send_all(steps);
        if result.is_err() {
            self.pattern = None;
        }
        result
    }

    /// Handles every event already waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        self.drain()
    }

    /// Waits up to `timeout` for an event, then handles everything waiting.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.handle(event);
                1 + self.drain()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Line(line) => {
                self.journal.push(Direction::Received, line.as_str());
                if let Dispatch::Update(update) = classify(&line) {
                    self.state.apply(&update);
                }
            }
            LinkEvent::Disconnected(DisconnectReason::User) => {}
            LinkEvent::Disconnected(DisconnectReason::Lost(reason)) => {
                info!("Connection lost: {}", reason);
                self.journal
                    .push(Direction::Error, format!("Read error: {}", reason));
                self.disconnect();
            }
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(LinkConfig::default(), MonitorSchedule::default())
    }
}
