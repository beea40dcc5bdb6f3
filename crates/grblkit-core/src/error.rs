//! Error handling for GrblKit
//!
//! Provides error types for the layers of the application:
//! - Connection errors (transport/session failures, fatal to the session)
//! - Command errors (per-call failures a caller can recover from)
//!
//! All error types use `thiserror` for ergonomic error handling. Fatal
//! session failures and recoverable per-call failures are separate enums so
//! callers can match on the layer instead of inspecting message strings.

use thiserror::Error;

/// Connection error type
///
/// Represents failures of the serial link or session setup. Every variant
/// here is fatal to the session: the controller tears down and the caller
/// decides whether to reconnect.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open the serial port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// A connection is already established
    #[error("Already connected")]
    AlreadyConnected,

    /// The first line read from the device did not parse as a startup banner
    #[error("Unexpected startup banner: {line:?}")]
    UnexpectedBanner {
        /// The line received in place of the banner.
        line: String,
    },

    /// The connection dropped mid-session
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Serial port I/O error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },
}

/// Command error type
///
/// Represents per-call failures raised synchronously to the caller.
/// These never affect the session; the link keeps running.
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// The command string matched none of the recognized command grammars
    #[error("Invalid command: {command:?}")]
    InvalidCommand {
        /// The rejected command text.
        command: String,
    },

    /// The controller has no active connection
    #[error("Controller not connected")]
    NotConnected,
}

/// Main error type for GrblKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a recoverable command error
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
