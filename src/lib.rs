//! # GrblKit
//!
//! A GRBL v1.1 G-code sender core for CNC machines:
//! - Typed parsing of every GRBL response shape
//! - Authoritative device state tracking (position, modal state, faults)
//! - Flow-controlled streaming against GRBL's fixed serial receive buffer
//! - Connection lifecycle with alarm/error recovery and pause/resume
//!
//! ## Architecture
//!
//! GrblKit is organized as a workspace:
//!
//! 1. **grblkit-core** - Core types, errors, and the operator log sink
//! 2. **grblkit-communication** - Serial transport, GRBL protocol, controller
//! 3. **grblkit** - Console binary tying the crates together

pub use grblkit_communication::firmware;

pub use grblkit_core::{
    CommandError, ConnectionError, DistanceMode, Error, MachineState, MessageLevel, Monitor,
    Position, Result, Units,
};

pub use grblkit_communication::{
    list_ports, ConnectionParams, DeviceStatus, GcodeStreamer, GcodeStreamerConfig,
    GrblController, GrblControllerConfig, GrblMessage, GrblMessageKind, GrblSettings,
    SerialPortInfo, SerialTransport, StartupBanner,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with console output and RUST_LOG environment
/// variable support.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
