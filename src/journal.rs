//! Append-only communication log.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    Error,
    Info,
}

/// One log line. Never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    timestamp: DateTime<Local>,
    direction: Direction,
    text: String,
}

impl LogEntry {
    pub fn new(direction: Direction, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            text: text.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `HH:MM:SS.mmm`
    pub fn time_text(&self) -> String {
        self.timestamp.format("%H:%M:%S%.3f").to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.time_text())?;
        match self.direction {
            Direction::Sent => write!(f, "TX: {}", self.text),
            Direction::Received => write!(f, "RX: {}", self.text),
            Direction::Error => write!(f, "Error: {}", self.text),
            Direction::Info => f.write_str(&self.text),
        }
    }
}

/// Entries in receipt order. With a capacity set, the oldest entries are dropped
/// first once it is reached.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: VecDeque<LogEntry>,
    capacity: Option<usize>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn push(&mut self, direction: Direction, text: impl Into<String>) -> &LogEntry {
        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(LogEntry::new(direction, text));
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
