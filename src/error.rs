//! Error types shared by the transport, dispatcher and command layers.

use std::io;
use std::num::ParseIntError;

use thiserror::Error;

/// Failures of the serial link itself.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The port could not be opened; no connection was established.
    #[error("Failed to open '{path}' at {baud} baud: {source}")]
    Connection {
        path: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },
    /// A write was attempted while no connection is open.
    #[error("Not connected: open a port before sending commands")]
    NotConnected,
    /// The write itself failed on an open port.
    #[error("Failed to write to serial port: {0}")]
    Write(#[source] io::Error),
    /// The port failed during polling and the read loop stopped.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

impl LinkError {
    /// True for the two write-path failures.
    pub fn is_write_error(&self) -> bool {
        matches!(self, LinkError::NotConnected | LinkError::Write(_))
    }
}

/// A response line that looked like a tagged reply but did not parse.
///
/// Never surfaces past [`crate::dispatch::classify`]; the line is shown raw instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A comma segment did not have the `KEY:VALUE` shape.
    #[error("malformed segment '{0}'")]
    MalformedSegment(String),
    /// A required key was not present.
    #[error("missing key '{0}'")]
    MissingKey(&'static str),
    /// The value after a key was not an unsigned integer.
    #[error("invalid value for '{key}': {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: ParseIntError,
    },
}

// Custom error types for building device commands.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    /// The command text is empty after trimming.
    #[error("command is empty")]
    Empty,
    /// LED, relay or PWM channel number outside the board's range.
    #[error("{kind} {index} does not exist (valid: 1-{max})")]
    InvalidChannel {
        kind: &'static str,
        index: u8,
        max: u8,
    },
    /// Numeric argument outside the accepted range.
    #[error("{what} {value} out of range ({min}-{max})")]
    OutOfRange {
        what: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    /// A known command header with an argument that could not be read.
    #[error("invalid argument '{argument}' for {header}")]
    InvalidArgument { header: String, argument: String },
}
