//! Typed GRBL message payloads
//!
//! This module defines the tagged union over every message shape GRBL v1.1
//! prints, plus the payload structs the grammars fill in. Payloads are
//! immutable once constructed; the raw source line is always retained on the
//! enclosing [`GrblMessage`] for audit logging.

use grblkit_core::{MachineState, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::error_decoder;

/// One parsed line from the device, with the raw text retained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrblMessage {
    /// The line exactly as received
    pub raw: String,
    /// The recognized message shape and payload
    pub kind: GrblMessageKind,
}

impl GrblMessage {
    /// Short name of the message kind, for logging
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            GrblMessageKind::Status(_) => "Status",
            GrblMessageKind::Ok => "Ok",
            GrblMessageKind::Error(_) => "Error",
            GrblMessageKind::Alarm(_) => "Alarm",
            GrblMessageKind::ParserState(_) => "ParserState",
            GrblMessageKind::Parameter { .. } => "Parameter",
            GrblMessageKind::Help { .. } => "Help",
            GrblMessageKind::Version { .. } => "Version",
            GrblMessageKind::Options(_) => "Options",
            GrblMessageKind::Echo { .. } => "Echo",
            GrblMessageKind::Feedback { .. } => "Feedback",
            GrblMessageKind::UserStartupLine { .. } => "UserStartupLine",
            GrblMessageKind::Setting { .. } => "Setting",
            GrblMessageKind::Startup(_) => "Startup",
            GrblMessageKind::Unrecognized => "Unrecognized",
        }
    }
}

/// GRBL message kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GrblMessageKind {
    /// Status report (`<...>`)
    Status(StatusReport),
    /// `ok` acknowledgment
    Ok,
    /// `error:N` response, code resolved against the error table
    Error(GrblFault),
    /// `ALARM:N` push message, code resolved against the alarm table
    Alarm(GrblFault),
    /// Parser modal state (`[GC:...]`)
    ParserState(ParserStateReport),
    /// Stored parameter (`[G54:...]`, `[TLO:...]`, `[PRB:...]`, ...)
    Parameter {
        /// Parameter name (G54..G59, G28, G30, G92, TLO, PRB)
        name: String,
        /// Parsed parameter payload
        value: ParameterValue,
    },
    /// Help listing (`[HLP:...]`)
    Help {
        /// Help text
        text: String,
    },
    /// Build version (`[VER:...]`)
    Version {
        /// Version string
        version: String,
        /// Optional build comment after the version field
        comment: String,
    },
    /// Compile-time options (`[OPT:...]`)
    Options(BuildOptions),
    /// Echoed line (`[echo:...]`)
    Echo {
        /// Echoed text
        text: String,
    },
    /// Non-queried feedback (`[MSG:...]` or generic `[...]`)
    Feedback {
        /// Feedback text without the bracket framing
        text: String,
    },
    /// Stored startup line (`$N0=...`)
    UserStartupLine {
        /// Startup line slot (e.g., "N0")
        name: String,
        /// Stored G-code line
        value: String,
    },
    /// Setting listing entry (`$10=255`)
    Setting {
        /// Setting index as printed (e.g., "10")
        name: String,
        /// Setting value as printed
        value: String,
    },
    /// Startup banner printed on reset
    Startup(StartupBanner),
    /// A line matching none of the grammars
    Unrecognized,
}

/// A protocol fault: numeric code plus table-resolved text
///
/// Unknown codes carry empty message and description rather than failing;
/// a fault the table does not know must never stall the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrblFault {
    /// Numeric code from the wire
    pub code: u8,
    /// Short message from the static table
    pub message: String,
    /// Long description from the static table
    pub description: String,
}

impl GrblFault {
    /// Resolve an error code against the error table
    pub fn error(code: u8) -> Self {
        let (message, description) = error_decoder::error_text(code);
        Self {
            code,
            message: message.to_string(),
            description: description.to_string(),
        }
    }

    /// Resolve an alarm code against the alarm table
    pub fn alarm(code: u8) -> Self {
        let (message, description) = error_decoder::alarm_text(code);
        Self {
            code,
            message: message.to_string(),
            description: description.to_string(),
        }
    }
}

impl fmt::Display for GrblFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.message)
        }
    }
}

/// Buffer occupancy reported in a status report (`Bf:planner,rx`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferState {
    /// Free planner blocks
    pub planner: u32,
    /// Free serial RX bytes
    pub rx: u32,
}

/// Override percentages reported in a status report (`Ov:feed,rapid,spindle`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Feed override percentage
    pub feed: u16,
    /// Rapid override percentage
    pub rapid: u16,
    /// Spindle override percentage
    pub spindle: u16,
}

/// One parsed status report
///
/// Every field except the state is optional: GRBL only prints fields whose
/// values changed or that the report mask enables. Merging into the stored
/// report overwrites present fields only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusReport {
    /// Active machine state
    pub state: MachineState,
    /// Substate qualifier (e.g., `Hold:1`, `Door:2`)
    pub substate: Option<u8>,
    /// Machine position
    pub mpos: Option<Position>,
    /// Work position
    pub wpos: Option<Position>,
    /// Work coordinate offset
    pub wco: Option<Position>,
    /// Planner/RX buffer occupancy
    pub buffer: Option<BufferState>,
    /// Line number currently executing
    pub line_number: Option<u32>,
    /// Current feed rate
    pub feed_rate: Option<f64>,
    /// Current spindle speed
    pub spindle_speed: Option<f64>,
    /// Triggered pin string (e.g., "XYZ", "P")
    pub pins: Option<String>,
    /// Override percentages
    pub overrides: Option<Overrides>,
    /// Accessory state string (e.g., "SFM")
    pub accessories: Option<String>,
}

/// Modal groups tracked from `$G` parser state reports
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ModalGroup {
    /// Motion mode (G0, G1, G2, G3, G38.x, G80)
    Motion,
    /// Active work coordinate system (G54..G59)
    CoordinateSystem,
    /// Plane selection (G17, G18, G19)
    Plane,
    /// Units (G20, G21)
    Units,
    /// Distance mode (G90, G91)
    Distance,
    /// Feed rate mode (G93, G94)
    FeedRateMode,
    /// Program flow (M0, M1, M2, M30)
    Program,
    /// Spindle control (M3, M4, M5)
    Spindle,
    /// Coolant control (M7, M8, M9); M7 and M8 can be active together
    Coolant,
}

impl ModalGroup {
    /// Classify a G/M word into its modal group
    pub fn classify(word: &str) -> Option<ModalGroup> {
        match word {
            "G0" | "G00" | "G1" | "G01" | "G2" | "G02" | "G3" | "G03" | "G38.2" | "G38.3"
            | "G38.4" | "G38.5" | "G80" => Some(ModalGroup::Motion),
            "G54" | "G55" | "G56" | "G57" | "G58" | "G59" => Some(ModalGroup::CoordinateSystem),
            "G17" | "G18" | "G19" => Some(ModalGroup::Plane),
            "G20" | "G21" => Some(ModalGroup::Units),
            "G90" | "G91" => Some(ModalGroup::Distance),
            "G93" | "G94" => Some(ModalGroup::FeedRateMode),
            "M0" | "M00" | "M1" | "M01" | "M2" | "M02" | "M30" => Some(ModalGroup::Program),
            "M3" | "M03" | "M4" | "M04" | "M5" | "M05" => Some(ModalGroup::Spindle),
            "M7" | "M07" | "M8" | "M08" | "M9" | "M09" => Some(ModalGroup::Coolant),
            _ => None,
        }
    }
}

/// One parsed `$G` report: the modal words present, plus tool/feed/spindle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParserStateReport {
    /// Modal codes grouped by modal group; coolant may hold two codes
    pub modal: BTreeMap<ModalGroup, Vec<String>>,
    /// Selected tool index
    pub tool: Option<u32>,
    /// Programmed feed rate
    pub feed_rate: Option<f64>,
    /// Programmed spindle speed
    pub spindle_speed: Option<f64>,
}

/// Stored parameter payload shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Coordinate-system or predefined-position offset (G54..G59, G28, G30, G92)
    Offset(Position),
    /// Tool length offset (TLO), a single value
    ToolLengthOffset(f64),
    /// Last probe result (PRB): position plus success flag
    Probe {
        /// Probed position
        position: Position,
        /// Whether the probe cycle succeeded
        success: bool,
    },
}

/// Compile-time option report payload (`[OPT:code,block_buffer,rx_buffer]`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Enabled-option letter codes
    pub code: String,
    /// Planner block count, when reported
    pub block_buffer: Option<u32>,
    /// Serial RX buffer size in bytes, when reported
    pub rx_buffer: Option<u32>,
}

/// Startup banner payload (`Grbl 1.1h ['$' for help]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupBanner {
    /// Firmware name (first banner token)
    pub firmware: String,
    /// Firmware version (second banner token)
    pub version: String,
    /// Remainder of the banner line, leading whitespace preserved
    pub message: String,
}

/// Build identification accumulated from `$I` responses
///
/// `VER` and `OPT` arrive as separate lines; fields merge incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Version string from the last `[VER:...]` line
    pub version: Option<String>,
    /// Build comment from the last `[VER:...]` line
    pub comment: Option<String>,
    /// Options from the last `[OPT:...]` line
    pub options: Option<BuildOptions>,
}

impl BuildInfo {
    /// Merge a `[VER:...]` payload
    pub fn merge_version(&mut self, version: &str, comment: &str) {
        self.version = Some(version.to_string());
        self.comment = Some(comment.to_string());
    }

    /// Merge an `[OPT:...]` payload
    pub fn merge_options(&mut self, options: &BuildOptions) {
        self.options = Some(options.clone());
    }
}
