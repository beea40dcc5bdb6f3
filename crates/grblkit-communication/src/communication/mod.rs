//! Transport abstraction and flow-control primitives
//!
//! The [`Transport`] trait is the narrow seam between the GRBL controller and
//! the byte-level serial link: open with a first-line read, line-oriented
//! send/receive with a bounded timeout, a non-blocking input probe, and
//! close. [`SendBuffer`] tracks outstanding command bytes against the
//! device's fixed receive buffer.

pub mod buffered;
pub mod serial;

pub use buffered::{SendBuffer, SendBufferConfig};
pub use serial::list_ports;

use grblkit_core::Result;

/// Parameters for opening a serial connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds; reads return empty on expiry
    pub timeout_ms: u64,
}

impl ConnectionParams {
    /// Create parameters for the given port and baud rate
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            timeout_ms: 100,
        }
    }
}

/// Line-oriented transport to the device
///
/// Implementations append the line terminator on writes and strip it on
/// reads. Any error returned from these methods is fatal to the session;
/// a read timeout is not an error and surfaces as an empty string.
pub trait Transport: Send {
    /// Open the link and return the first line the device prints
    fn start_connection(&mut self, params: &ConnectionParams) -> Result<String>;

    /// Write one line, appending the terminator
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Write a single raw byte, bypassing line framing (realtime commands)
    fn send_byte(&mut self, byte: u8) -> Result<()>;

    /// Read one line, blocking up to the configured timeout
    ///
    /// Returns an empty string when the timeout expires with no complete
    /// line available.
    fn read_line(&mut self) -> Result<String>;

    /// Whether input is available without blocking
    fn waiting(&mut self) -> Result<bool>;

    /// Close the link
    fn stop_connection(&mut self) -> Result<()>;
}
