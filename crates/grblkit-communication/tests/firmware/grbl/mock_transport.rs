//! Scripted transport for driving the controller without hardware
//!
//! Tests push device lines onto the response script and inspect what the
//! controller wrote. With `auto_ok` enabled the mock acknowledges every line
//! like an error-free device would.

use grblkit_core::{ConnectionError, Result};
use grblkit_communication::{ConnectionParams, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MockDevice {
    responses: Mutex<VecDeque<String>>,
    sent_lines: Mutex<Vec<String>>,
    sent_bytes: Mutex<Vec<u8>>,
    auto_ok: AtomicBool,
    dead: AtomicBool,
    open: AtomicBool,
}

impl MockDevice {
    /// Queue a line for the controller to read
    pub fn push_response(&self, line: &str) {
        self.responses.lock().unwrap().push_back(line.to_string());
    }

    /// Lines the controller has written, in order
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent_lines.lock().unwrap().clone()
    }

    /// Realtime bytes the controller has written, in order
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sent_bytes.lock().unwrap().clone()
    }

    /// Acknowledge every subsequent line with `ok`
    pub fn set_auto_ok(&self, enabled: bool) {
        self.auto_ok.store(enabled, Ordering::SeqCst);
    }

    /// Make every subsequent transport call fail
    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
    }

    /// Whether the port is open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn check_alive(&self) -> Result<()> {
        if self.dead.load(Ordering::SeqCst) {
            Err(ConnectionError::ConnectionLost {
                reason: "mock transport killed".to_string(),
            }
            .into())
        } else {
            Ok(())
        }
    }
}

pub struct MockTransport {
    device: Arc<MockDevice>,
}

impl MockTransport {
    /// Create a transport plus the device handle tests keep
    pub fn new() -> (Self, Arc<MockDevice>) {
        let device = Arc::new(MockDevice::default());
        (
            Self {
                device: Arc::clone(&device),
            },
            device,
        )
    }
}

impl Transport for MockTransport {
    fn start_connection(&mut self, _params: &ConnectionParams) -> Result<String> {
        self.device.check_alive()?;
        self.device.open.store(true, Ordering::SeqCst);
        self.device
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| {
                ConnectionError::FailedToOpen {
                    port: "mock".to_string(),
                    reason: "no scripted banner".to_string(),
                }
                .into()
            })
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.device.check_alive()?;
        self.device
            .sent_lines
            .lock()
            .unwrap()
            .push(line.to_string());
        if self.device.auto_ok.load(Ordering::SeqCst) {
            self.device.push_response("ok");
        }
        Ok(())
    }

    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.device.check_alive()?;
        self.device.sent_bytes.lock().unwrap().push(byte);
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        self.device.check_alive()?;
        Ok(self
            .device
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn waiting(&mut self) -> Result<bool> {
        self.device.check_alive()?;
        Ok(!self.device.responses.lock().unwrap().is_empty())
    }

    fn stop_connection(&mut self) -> Result<()> {
        self.device.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll until the condition holds or two seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
