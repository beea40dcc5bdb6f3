//! Per-session device state model
//!
//! Holds the last-known status report, parser modal state, active fault, and
//! the session flags. One instance is constructed per connection and torn
//! down with it; nothing here is shared between sessions.
//!
//! State transitions happen only by ingesting parsed messages, with one
//! exception: recording an alarm forces the active state to `Alarm` so the
//! lockout is visible before the next status report arrives.

use grblkit_core::MachineState;
use serde::{Deserialize, Serialize};

use super::messages::{GrblFault, ParserStateReport, StatusReport};

/// How a fault was reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// `error:N` terminal response to a specific command
    Error,
    /// `ALARM:N` push message with motion lockout
    Alarm,
}

/// A recorded fault tied to the command that caused it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFault {
    /// The command the fault was correlated to
    pub source_line: String,
    /// Resolved code, message, and description
    pub fault: GrblFault,
    /// Whether this came in as an error or an alarm
    pub kind: FaultKind,
}

/// Authoritative device state for one connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    report: StatusReport,
    parser_state: ParserStateReport,
    fault: Option<DeviceFault>,
    check_mode: bool,
    connected: bool,
    stop: bool,
    finished: bool,
    paused: bool,
    alarm: bool,
}

impl DeviceStatus {
    /// Create a fresh model with default state
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a status report; only fields present in the update overwrite
    /// the stored value
    pub fn update_status(&mut self, update: &StatusReport) {
        // State and substate travel together in the report's first segment.
        self.report.state = update.state.clone();
        self.report.substate = update.substate;

        if let Some(mpos) = update.mpos {
            self.report.mpos = Some(mpos);
        }
        if let Some(wpos) = update.wpos {
            self.report.wpos = Some(wpos);
        }
        if let Some(wco) = update.wco {
            self.report.wco = Some(wco);
        }
        if let Some(buffer) = update.buffer {
            self.report.buffer = Some(buffer);
        }
        if let Some(line_number) = update.line_number {
            self.report.line_number = Some(line_number);
        }
        if let Some(feed_rate) = update.feed_rate {
            self.report.feed_rate = Some(feed_rate);
        }
        if let Some(spindle_speed) = update.spindle_speed {
            self.report.spindle_speed = Some(spindle_speed);
        }
        if let Some(pins) = &update.pins {
            self.report.pins = Some(pins.clone());
        }
        if let Some(overrides) = update.overrides {
            self.report.overrides = Some(overrides);
        }
        if let Some(accessories) = &update.accessories {
            self.report.accessories = Some(accessories.clone());
        }
    }

    /// Merge a parser state report; modal groups not mentioned retain their
    /// prior values
    pub fn update_parser_state(&mut self, update: &ParserStateReport) {
        for (group, codes) in &update.modal {
            self.parser_state.modal.insert(*group, codes.clone());
        }
        if let Some(tool) = update.tool {
            self.parser_state.tool = Some(tool);
        }
        if let Some(feed_rate) = update.feed_rate {
            self.parser_state.feed_rate = Some(feed_rate);
        }
        if let Some(spindle_speed) = update.spindle_speed {
            self.parser_state.spindle_speed = Some(spindle_speed);
        }
    }

    /// Record a fault against the command that caused it
    ///
    /// Alarms force the active state to `Alarm` and set the alarm flag;
    /// errors leave the state alone.
    pub fn set_fault(&mut self, source_line: &str, fault: GrblFault, kind: FaultKind) {
        if kind == FaultKind::Alarm {
            self.report.state = MachineState::Alarm;
            self.alarm = true;
        }
        self.fault = Some(DeviceFault {
            source_line: source_line.to_string(),
            fault,
            kind,
        });
    }

    /// Clear the recorded fault, unless an alarm is active
    ///
    /// Returns whether the clear took effect. While the machine is in the
    /// `Alarm` state only an explicit unlock may clear the condition.
    pub fn clear_fault(&mut self) -> bool {
        if self.is_alarm() {
            return false;
        }
        self.fault = None;
        true
    }

    /// Clear alarm lockout after the device confirmed the unlock
    pub fn clear_alarm(&mut self) {
        self.alarm = false;
        self.fault = None;
        if self.report.state == MachineState::Alarm {
            // The next status report re-merges the authoritative state.
            self.report.state = MachineState::Idle;
        }
    }

    /// Whether the machine reports the `Idle` state
    pub fn is_idle(&self) -> bool {
        self.report.state == MachineState::Idle
    }

    /// Whether the machine reports the `Alarm` state
    pub fn is_alarm(&self) -> bool {
        self.report.state == MachineState::Alarm
    }

    /// Whether the machine reports the `Check` state
    pub fn is_checkmode(&self) -> bool {
        self.report.state == MachineState::Check
    }

    /// Whether a fault is recorded
    pub fn failed(&self) -> bool {
        self.fault.is_some()
    }

    /// Compose a display string for the recorded fault
    ///
    /// Wording follows the active state: an alarm lockout reads as an alarm
    /// even if the viewer asks after further errors arrived.
    pub fn fault_message(&self) -> String {
        let Some(device_fault) = &self.fault else {
            return String::new();
        };
        let word = if self.is_alarm() { "alarm" } else { "error" };
        let mut message = format!("GRBL {} {}", word, device_fault.fault.code);
        if !device_fault.fault.message.is_empty() {
            message.push_str(&format!(": {}", device_fault.fault.message));
        }
        if !device_fault.fault.description.is_empty() {
            message.push_str(&format!(" ({})", device_fault.fault.description));
        }
        if !device_fault.source_line.is_empty() {
            message.push_str(&format!(" [caused by {:?}]", device_fault.source_line));
        }
        message
    }

    /// The merged status report
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// The merged parser modal state
    pub fn parser_state(&self) -> &ParserStateReport {
        &self.parser_state
    }

    /// The recorded fault, if any
    pub fn fault(&self) -> Option<&DeviceFault> {
        self.fault.as_ref()
    }

    /// Check-mode flag as confirmed by `$C` feedback
    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    /// Update the check-mode flag
    pub fn set_check_mode(&mut self, enabled: bool) {
        self.check_mode = enabled;
    }

    /// Connection flag
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Update the connection flag
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Disconnect-requested flag
    pub fn stop(&self) -> bool {
        self.stop
    }

    /// Update the disconnect-requested flag
    pub fn set_stop(&mut self, stop: bool) {
        self.stop = stop;
    }

    /// Program-end-observed flag
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Update the program-end flag
    pub fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    /// Pause flag
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Update the pause flag
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Alarm flag
    pub fn alarm(&self) -> bool {
        self.alarm
    }
}
