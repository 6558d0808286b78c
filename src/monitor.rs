//! Periodic polling of the board's inputs while monitoring is on.

use std::time::{Duration, Instant};

use crate::command::Command;

pub const MONITOR_INTERVAL_MIN: Duration = Duration::from_millis(100);
pub const MONITOR_INTERVAL_MAX: Duration = Duration::from_millis(5000);
pub const MONITOR_INTERVAL_DEFAULT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct MonitorSchedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Default for MonitorSchedule {
    fn default() -> Self {
        Self::new(MONITOR_INTERVAL_DEFAULT)
    }
}

impl MonitorSchedule {
    /// The interval is clamped to 100 ms..=5 s.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.clamp(MONITOR_INTERVAL_MIN, MONITOR_INTERVAL_MAX),
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Starts polling; the first poll is due one interval from `now`.
    pub fn start(&mut self, now: Instant) -> Command {
        self.next_due = Some(now + self.interval);
        Command::MonitorStart
    }

    pub fn stop(&mut self) -> Command {
        self.next_due = None;
        Command::MonitorStop
    }

    /// Stops without producing a command, for when the link is already gone.
    pub fn halt(&mut self) {
        self.next_due = None;
    }

    /// Returns the poll commands when a poll is due.
    ///
    /// Missed intervals are not replayed: at most one poll per call.
    pub fn due(&mut self, now: Instant) -> Option<[Command; 2]> {
        let next_due = self.next_due?;
        if now < next_due {
            return None;
        }
        let mut next = next_due + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_due = Some(next);
        Some([Command::DigitalAll, Command::AnalogAll])
    }
}
