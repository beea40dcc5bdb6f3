//! Serial port transport implementation
//!
//! Provides low-level serial port operations for direct hardware connection
//! to CNC controllers via USB or RS-232.
//!
//! Supports:
//! - Port enumeration and discovery, filtered to CNC controller patterns
//! - Baud rate configuration
//! - Line-oriented reads with a bounded timeout
//! - Non-blocking input probing via the driver's receive count

use crate::communication::{ConnectionParams, Transport};
use grblkit_core::{ConnectionError, Error, Result};
use serialport::SerialPort as _;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// GRBL resets when the port opens (DTR toggle) and takes a moment to print
/// its banner; the first read waits this long before giving up.
const STARTUP_BANNER_TIMEOUT: Duration = Duration::from_secs(5);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,
}

/// List available serial ports on the system
///
/// Returns available ports filtered to CNC controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports
            .iter()
            .filter(|port| is_valid_cnc_port(&port.port_name))
            .map(|port| {
                let mut info = SerialPortInfo {
                    port_name: port.port_name.clone(),
                    description: get_port_description(port),
                    manufacturer: None,
                    serial_number: None,
                };
                if let serialport::SerialPortType::UsbPort(usb_info) = &port.port_type {
                    info.manufacturer = usb_info.manufacturer.clone();
                    info.serial_number = usb_info.serial_number.clone();
                }
                info
            })
            .collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(ConnectionError::SerialError {
                reason: format!("Failed to enumerate ports: {}", e),
            }
            .into())
        }
    }
}

/// Check if a port name matches CNC controller patterns
fn is_valid_cnc_port(port_name: &str) -> bool {
    // Windows COM ports
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

fn serial_err(e: std::io::Error) -> Error {
    ConnectionError::SerialError {
        reason: e.to_string(),
    }
    .into()
}

/// Serial transport over the `serialport` crate
///
/// Accumulates raw bytes and splits them into lines so that a partial line
/// left by one read is completed by the next.
pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl SerialTransport {
    /// Create a transport with no open port
    pub fn new() -> Self {
        Self {
            port: None,
            pending: Vec::new(),
            timeout: Duration::from_millis(100),
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            Error::from(ConnectionError::ConnectionLost {
                reason: "port not open".to_string(),
            })
        })
    }

    /// Pull the next complete line out of the pending byte buffer
    fn take_buffered_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=newline).collect();
        let text = String::from_utf8_lossy(&line)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        Some(text)
    }

    /// Read until a full line is buffered or the deadline passes
    fn read_line_deadline(&mut self, deadline: Instant) -> Result<String> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                return Ok(String::new());
            }

            let mut chunk = [0u8; 256];
            let port = self.port_mut()?;
            match port.read(&mut chunk) {
                Ok(0) => {
                    return Err(ConnectionError::ConnectionLost {
                        reason: "port closed".to_string(),
                    }
                    .into());
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    return Err(ConnectionError::SerialError {
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn start_connection(&mut self, params: &ConnectionParams) -> Result<String> {
        let builder = serialport::new(&params.port, params.baud_rate)
            // Short driver timeout so read_line can honor its own deadline
            .timeout(Duration::from_millis(10));

        let port = builder.open().map_err(|e| {
            tracing::warn!("Failed to open serial port {}: {}", params.port, e);
            ConnectionError::FailedToOpen {
                port: params.port.clone(),
                reason: e.to_string(),
            }
        })?;

        self.port = Some(port);
        self.pending.clear();
        self.timeout = Duration::from_millis(params.timeout_ms);

        // The device reboots on open; wait out the reset for the banner.
        let banner = self.read_line_deadline(Instant::now() + STARTUP_BANNER_TIMEOUT)?;
        if banner.is_empty() {
            self.port = None;
            return Err(ConnectionError::FailedToOpen {
                port: params.port.clone(),
                reason: "no startup banner received".to_string(),
            }
            .into());
        }
        Ok(banner)
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(line.as_bytes()).map_err(serial_err)?;
        port.write_all(b"\n").map_err(serial_err)?;
        port.flush().map_err(serial_err)?;
        Ok(())
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(&[byte]).map_err(serial_err)?;
        port.flush().map_err(serial_err)?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        self.read_line_deadline(deadline)
    }

    fn waiting(&mut self) -> Result<bool> {
        if self.pending.contains(&b'\n') {
            return Ok(true);
        }
        let port = self.port_mut()?;
        match port.bytes_to_read() {
            Ok(n) => Ok(n > 0),
            Err(e) => Err(ConnectionError::SerialError {
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn stop_connection(&mut self) -> Result<()> {
        self.port.take();
        self.pending.clear();
        Ok(())
    }
}
