//! # GrblKit Communication
//!
//! Serial transport and the GRBL v1.1 protocol implementation for GrblKit:
//! response grammars, the device status model, the buffered streaming
//! controller with its background I/O loop, and the G-code file streamer.

pub mod communication;
pub mod firmware;

pub use communication::{
    list_ports,
    serial::{SerialPortInfo, SerialTransport},
    ConnectionParams, SendBuffer, SendBufferConfig, Transport,
};

pub use firmware::grbl::{
    controller::{GrblController, GrblControllerConfig},
    device_status::{DeviceFault, DeviceStatus, FaultKind},
    messages::{GrblMessage, GrblMessageKind, StartupBanner},
    response_parser::parse_line,
    settings::GrblSettings,
    streamer::{GcodeStreamer, GcodeStreamerConfig},
};
