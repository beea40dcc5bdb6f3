//! Buffered command queue with flow control and acknowledgment tracking
//!
//! Implements the GRBL streaming discipline: commands wait in a pending
//! queue, move to an in-flight queue when written to the device, and are
//! retired in FIFO order as `ok`/`error` responses arrive. GRBL answers
//! every line with exactly one terminal response, in order, so the oldest
//! in-flight entry is always the one a response belongs to.
//!
//! Occupancy is the byte total of every command accepted but not yet
//! acknowledged. It emulates the fill level of the device's fixed receive
//! buffer without the device reporting consumption per command.

use std::collections::VecDeque;

/// Configuration for the send buffer
#[derive(Debug, Clone)]
pub struct SendBufferConfig {
    /// Assumed size of the device's serial receive buffer in bytes
    pub rx_buffer_capacity: usize,
    /// Fill percentage above which no further command is sent
    pub fill_threshold: f64,
}

impl Default for SendBufferConfig {
    fn default() -> Self {
        Self {
            // Stock GRBL v1.1 builds have a 128 byte RX ring. Builds that
            // report a different size via $I could override this.
            rx_buffer_capacity: 128,
            fill_threshold: 75.0,
        }
    }
}

/// Command queue with receive-buffer occupancy tracking
#[derive(Debug)]
pub struct SendBuffer {
    config: SendBufferConfig,
    /// Accepted commands not yet written to the device
    pending: VecDeque<String>,
    /// Commands written to the device, awaiting their terminal response
    in_flight: VecDeque<String>,
    /// Byte total of pending plus in-flight commands
    occupancy: usize,
}

impl SendBuffer {
    /// Create an empty buffer
    pub fn new(config: SendBufferConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
            occupancy: 0,
        }
    }

    /// Accept a command; its byte length counts toward occupancy immediately
    pub fn queue(&mut self, command: String) {
        self.occupancy += command.len();
        self.pending.push_back(command);
    }

    /// Current occupancy as a percentage of the receive buffer capacity
    pub fn fill_percent(&self) -> f64 {
        if self.config.rx_buffer_capacity == 0 {
            return 0.0;
        }
        100.0 * self.occupancy as f64 / self.config.rx_buffer_capacity as f64
    }

    /// Whether the next pending command may be sent this iteration
    pub fn ready_to_send(&self) -> bool {
        !self.pending.is_empty() && self.fill_percent() < self.config.fill_threshold
    }

    /// Move the next pending command to the in-flight queue and return it
    /// for transmission
    pub fn take_next(&mut self) -> Option<String> {
        let command = self.pending.pop_front()?;
        self.in_flight.push_back(command.clone());
        Some(command)
    }

    /// Retire the oldest in-flight command on an `ok` response
    pub fn acknowledge(&mut self) -> Option<String> {
        let command = self.in_flight.pop_front()?;
        self.occupancy = self.occupancy.saturating_sub(command.len());
        Some(command)
    }

    /// Retire the oldest in-flight command on an `error`/alarm response,
    /// returning it so the fault can be attached to the right command
    pub fn fail(&mut self) -> Option<String> {
        // Identical accounting; the caller records the fault.
        self.acknowledge()
    }

    /// Drop all pending (not yet sent) commands
    ///
    /// In-flight commands stay accounted: their responses are still owed by
    /// the device.
    pub fn clear_pending(&mut self) {
        for command in self.pending.drain(..) {
            self.occupancy = self.occupancy.saturating_sub(command.len());
        }
    }

    /// Reset to empty, dropping all accounting
    pub fn reset(&mut self) {
        self.pending.clear();
        self.in_flight.clear();
        self.occupancy = 0;
    }

    /// Bytes accepted but not yet acknowledged
    pub fn occupancy(&self) -> usize {
        self.occupancy
    }

    /// Number of commands waiting to be sent
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of commands awaiting a terminal response
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for SendBuffer {
    fn default() -> Self {
        Self::new(SendBufferConfig::default())
    }
}
