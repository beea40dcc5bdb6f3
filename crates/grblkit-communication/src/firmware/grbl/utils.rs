//! GRBL command utilities
//!
//! Command classification/validation, jog command construction, program-end
//! detection, and the static setting-name table.

use grblkit_core::{DistanceMode, Units};

/// GRBL realtime command bytes
pub mod realtime {
    /// Cycle start / resume
    pub const CYCLE_START: u8 = b'~';
    /// Feed hold
    pub const FEED_HOLD: u8 = b'!';
    /// Status report query
    pub const STATUS_QUERY: u8 = b'?';
    /// Soft reset (ctrl-X)
    pub const SOFT_RESET: u8 = 0x18;
}

/// Highest writable setting index on stock GRBL v1.1 builds
pub const MAX_SETTING_INDEX: u32 = 132;

/// The recognized command classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// Single-byte realtime command, bypasses the counted queue
    Realtime(u8),
    /// `$` system query ($, $$, $I, $H, $X, $G, $#, $C)
    Query,
    /// `$n=value` setting write
    SettingWrite {
        /// The setting index being written
        index: u32,
    },
    /// `$J=` jog line
    Jog,
    /// A plain G-code program line
    Gcode,
}

/// Classify a command string, or `None` when it matches no recognized grammar
///
/// `$`-prefixed lines must match one of the known `$` shapes. Anything else
/// that is non-empty is treated as a G-code program line and left for the
/// device to judge.
pub fn classify_command(command: &str) -> Option<CommandClass> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let [byte] = trimmed.as_bytes() {
        if matches!(
            *byte,
            realtime::CYCLE_START
                | realtime::FEED_HOLD
                | realtime::STATUS_QUERY
                | realtime::SOFT_RESET
        ) {
            return Some(CommandClass::Realtime(*byte));
        }
    }

    if !trimmed.starts_with('$') {
        return Some(CommandClass::Gcode);
    }

    match trimmed.to_ascii_uppercase().as_str() {
        "$" | "$$" | "$I" | "$H" | "$X" | "$G" | "$#" | "$C" => return Some(CommandClass::Query),
        _ => {}
    }

    if let Some(body) = trimmed.strip_prefix("$J=").or_else(|| trimmed.strip_prefix("$j=")) {
        if !body.trim().is_empty() {
            return Some(CommandClass::Jog);
        }
        return None;
    }

    let (index, value) = trimmed[1..].split_once('=')?;
    let index: u32 = index.parse().ok()?;
    if index > MAX_SETTING_INDEX || !is_valid_setting_value(value) {
        return None;
    }
    Some(CommandClass::SettingWrite { index })
}

/// Whether a setting value has the shape `digits[.digits]`
fn is_valid_setting_value(value: &str) -> bool {
    let mut parts = value.split('.');
    let integral = parts.next().unwrap_or_default();
    let fractional = parts.next();
    if parts.next().is_some() {
        return false;
    }
    if integral.is_empty() || !integral.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match fractional {
        None => true,
        Some(f) => !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()),
    }
}

/// Whether a program line ends the program (M2/M30)
///
/// Case-insensitive; a leading line-number word (`N120 M30`) is ignored.
pub fn is_program_end(line: &str) -> bool {
    line.split_whitespace().any(|token| {
        let token = token.to_ascii_uppercase();
        token == "M2" || token == "M02" || token == "M30"
    })
}

/// Format a numeric term the way GRBL prints them: always with a decimal
/// part, but without padding beyond what the value needs
fn format_term(value: f64) -> String {
    if value == value.trunc() {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Build a `$J=` jog command line
///
/// Prefix order is fixed: machine-coordinate flag, distance mode, units,
/// then the axis and feed terms. An axis term is omitted when its value is
/// zero and the motion is not absolute; the feed term is omitted when zero.
pub fn build_jog_command(
    x: f64,
    y: f64,
    z: f64,
    feed_rate: f64,
    units: Option<Units>,
    distance_mode: Option<DistanceMode>,
    machine_coordinates: bool,
) -> String {
    let mut terms: Vec<String> = Vec::new();

    if machine_coordinates {
        terms.push("G53".to_string());
    }
    match distance_mode {
        Some(DistanceMode::Absolute) => terms.push("G90".to_string()),
        Some(DistanceMode::Incremental) => terms.push("G91".to_string()),
        None => {}
    }
    match units {
        Some(Units::INCH) => terms.push("G20".to_string()),
        Some(Units::MM) => terms.push("G21".to_string()),
        None => {}
    }

    let absolute = distance_mode == Some(DistanceMode::Absolute);
    for (axis, value) in [("X", x), ("Y", y), ("Z", z)] {
        if value != 0.0 || absolute {
            terms.push(format!("{}{}", axis, format_term(value)));
        }
    }
    if feed_rate != 0.0 {
        terms.push(format!("F{}", format_term(feed_rate)));
    }

    format!("$J={}", terms.join(" "))
}

/// Human-readable name for a GRBL setting index
pub fn setting_name(index: u32) -> &'static str {
    match index {
        0 => "Step pulse time",
        1 => "Step idle delay",
        2 => "Step pulse invert",
        3 => "Step direction invert",
        4 => "Invert step enable pin",
        5 => "Invert limit pins",
        6 => "Invert probe pin",
        10 => "Status report options",
        11 => "Junction deviation",
        12 => "Arc tolerance",
        13 => "Report in inches",
        20 => "Soft limits enable",
        21 => "Hard limits enable",
        22 => "Homing cycle enable",
        23 => "Homing direction invert",
        24 => "Homing locate feed rate",
        25 => "Homing search seek rate",
        26 => "Homing switch debounce delay",
        27 => "Homing switch pull-off distance",
        30 => "Maximum spindle speed",
        31 => "Minimum spindle speed",
        32 => "Laser-mode enable",
        100 => "X-axis travel resolution",
        101 => "Y-axis travel resolution",
        102 => "Z-axis travel resolution",
        110 => "X-axis maximum rate",
        111 => "Y-axis maximum rate",
        112 => "Z-axis maximum rate",
        120 => "X-axis acceleration",
        121 => "Y-axis acceleration",
        122 => "Z-axis acceleration",
        130 => "X-axis maximum travel",
        131 => "Y-axis maximum travel",
        132 => "Z-axis maximum travel",
        _ => "Unknown setting",
    }
}
