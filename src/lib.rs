//! # ESP32 SCPI Link Library
//!
//! This library contains the host side of the line protocol spoken by the ESP32
//! GPIO controller firmware. It owns the serial connection, turns the inbound byte
//! stream into lines, classifies each response, and keeps the last-known state of
//! the board's inputs and outputs along with a log of the exchange.
//!
//! Data flows one way in (reader thread -> dispatcher -> state) and one way out
//! (command -> port). Commands are fire-and-forget; there is no acknowledgment
//! tracking and no automatic reconnection.

pub mod command;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod journal;
pub mod monitor;
pub mod pattern;
pub mod state;
pub mod transport;

pub use command::Command;
pub use console::Console;
pub use dispatch::{classify, Dispatch, Update};
pub use error::{CommandError, LinkError, ParseError};
pub use journal::{Direction, Journal, LogEntry};
pub use monitor::MonitorSchedule;
pub use pattern::LedPattern;
pub use state::{AnalogReading, DigitalInput, InstrumentState, OutputState};
pub use transport::{DisconnectReason, Endpoint, LinkConfig, LinkEvent, Port, SerialLink};
