//! Data models for positions, units, and machine state
//!
//! This module provides:
//! - Position tracking for the three linear axes (X, Y, Z)
//! - Unit management (MM, INCH)
//! - The GRBL machine state enumeration, preserving unrecognized states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine coordinate units (millimeters or inches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    /// Millimeters (metric)
    MM,
    /// Inches (imperial)
    INCH,
}

impl Units {
    /// Convert a value from one unit to another
    ///
    /// Returns the converted value, or the original value if units are the
    /// same.
    pub fn convert(value: f64, from: Units, to: Units) -> f64 {
        match (from, to) {
            (Units::MM, Units::INCH) => value / 25.4,
            (Units::INCH, Units::MM) => value * 25.4,
            _ => value,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::MM => write!(f, "mm"),
            Units::INCH => write!(f, "in"),
        }
    }
}

/// Distance mode for jogging and motion commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMode {
    /// Absolute positioning (G90)
    Absolute,
    /// Incremental positioning (G91)
    Incremental,
}

/// A position on the three linear axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl Position {
    /// Create a position from axis values
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{:.3},{:.3}", self.x, self.y, self.z)
    }
}

/// GRBL machine state as reported in status reports
///
/// Unknown state strings are preserved rather than mapped to a default so
/// that an unrecognized firmware state is still visible to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Ready and waiting for commands
    Idle,
    /// Executing a motion program
    Run,
    /// Feed hold in progress or complete
    Hold,
    /// Executing a jog motion
    Jog,
    /// Alarm lockout, motion disabled
    Alarm,
    /// Safety door open
    Door,
    /// Check mode, commands parsed but not executed
    Check,
    /// Homing cycle in progress
    Home,
    /// Sleep mode
    Sleep,
    /// A state string this build does not recognize, kept verbatim
    Unknown(String),
}

impl MachineState {
    /// Parse a state name from a status report
    pub fn parse(state: &str) -> Self {
        match state {
            "Idle" => MachineState::Idle,
            "Run" => MachineState::Run,
            "Hold" => MachineState::Hold,
            "Jog" => MachineState::Jog,
            "Alarm" => MachineState::Alarm,
            "Door" => MachineState::Door,
            "Check" => MachineState::Check,
            "Home" => MachineState::Home,
            "Sleep" => MachineState::Sleep,
            other => MachineState::Unknown(other.to_string()),
        }
    }

    /// The state name as reported on the wire
    pub fn as_str(&self) -> &str {
        match self {
            MachineState::Idle => "Idle",
            MachineState::Run => "Run",
            MachineState::Hold => "Hold",
            MachineState::Jog => "Jog",
            MachineState::Alarm => "Alarm",
            MachineState::Door => "Door",
            MachineState::Check => "Check",
            MachineState::Home => "Home",
            MachineState::Sleep => "Sleep",
            MachineState::Unknown(raw) => raw,
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::Unknown(String::new())
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
