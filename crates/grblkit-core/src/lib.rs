//! # GrblKit Core
//!
//! Core types, traits, and utilities for GrblKit.
//! Provides the fundamental abstractions shared by every layer:
//! coordinate and machine-state data models, layered error types,
//! and the operator-facing monitor/log sink.

pub mod data;
pub mod error;
pub mod monitor;

pub use data::{DistanceMode, MachineState, Position, Units};
pub use error::{CommandError, ConnectionError, Error, Result};
pub use monitor::{MessageLevel, Monitor};
