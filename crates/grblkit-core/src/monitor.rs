//! Operator-facing monitor and log sink
//!
//! Records every command sent to and every message received from the device,
//! plus leveled application log entries. Each entry is forwarded to `tracing`
//! and, unless marked debug-only, also pushed onto a bounded FIFO of
//! formatted lines that an external viewer drains with [`Monitor::has_logs`]
//! and [`Monitor::next_log`]. The sink never blocks the serial I/O loop.
//!
//! Formatted line layout: `[DD/MM/YYYY HH:MM:SS] LEVEL: message`, with
//! `[Sent]`/`[Received]` tags prefixed inline on traffic entries.

use chrono::Local;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// Severity of a monitor entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Diagnostic detail, not queued for the viewer
    Debug,
    /// Normal operational message
    Info,
    /// Something unexpected that does not stop the session
    Warning,
    /// A fault or rejected operation
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLevel::Debug => write!(f, "DEBUG"),
            MessageLevel::Info => write!(f, "INFO"),
            MessageLevel::Warning => write!(f, "WARNING"),
            MessageLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Bounded queue capacity; the oldest line is dropped once full so a stalled
/// viewer cannot grow the queue without limit.
const MAX_QUEUED_LINES: usize = 1000;

/// Append-only monitor sink shared between the controller, the streamer, and
/// the log viewer
pub struct Monitor {
    queue: Mutex<VecDeque<String>>,
}

impl Monitor {
    /// Create an empty monitor
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a command written to the device
    ///
    /// `debug_only` entries go to tracing but are not queued for the viewer;
    /// the periodic status queries use this to keep the queue readable.
    pub fn sent(&self, command: &str, debug_only: bool) {
        if debug_only {
            tracing::debug!("[Sent] {}", command);
        } else {
            self.log(MessageLevel::Info, &format!("[Sent] {}", command));
        }
    }

    /// Record a line received from the device, tagged with its parsed kind
    pub fn received(&self, kind: &str, raw: &str, debug_only: bool) {
        if debug_only {
            tracing::debug!("[Received] {}: {}", kind, raw);
        } else {
            self.log(MessageLevel::Info, &format!("[Received] {}: {}", kind, raw));
        }
    }

    /// Record a leveled log entry
    pub fn log(&self, level: MessageLevel, message: &str) {
        match level {
            MessageLevel::Debug => tracing::debug!("{}", message),
            MessageLevel::Info => tracing::info!("{}", message),
            MessageLevel::Warning => tracing::warn!("{}", message),
            MessageLevel::Error => tracing::error!("{}", message),
        }

        if level == MessageLevel::Debug {
            return;
        }

        let line = format!(
            "[{}] {}: {}",
            Local::now().format("%d/%m/%Y %H:%M:%S"),
            level,
            message
        );

        let mut queue = self.queue.lock();
        if queue.len() >= MAX_QUEUED_LINES {
            queue.pop_front();
        }
        queue.push_back(line);
    }

    /// Record a debug entry
    pub fn debug(&self, message: &str) {
        self.log(MessageLevel::Debug, message);
    }

    /// Record an info entry
    pub fn info(&self, message: &str) {
        self.log(MessageLevel::Info, message);
    }

    /// Record a warning entry
    pub fn warning(&self, message: &str) {
        self.log(MessageLevel::Warning, message);
    }

    /// Record an error entry
    pub fn error(&self, message: &str) {
        self.log(MessageLevel::Error, message);
    }

    /// Whether any formatted lines are waiting for the viewer
    pub fn has_logs(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Pop the oldest formatted line, or an empty string when drained
    pub fn next_log(&self) -> String {
        self.queue.lock().pop_front().unwrap_or_default()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
