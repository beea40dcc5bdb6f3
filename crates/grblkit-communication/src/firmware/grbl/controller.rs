//! GRBL controller
//!
//! Owns the device status model, the flow-controlled send buffer, and the
//! background I/O loop for one serial session. Commands are enqueued from
//! caller threads and written by the loop thread; callers never touch the
//! transport directly, so every public method returns without blocking on
//! serial I/O.
//!
//! The loop is the single writer of protocol-driven state. Caller threads
//! only enqueue work and set the `paused`/`stop` flags through the guarded
//! status model.

use grblkit_core::{CommandError, ConnectionError, DistanceMode, Monitor, Result, Units};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::communication::serial::SerialTransport;
use crate::communication::{ConnectionParams, SendBuffer, SendBufferConfig, Transport};
use crate::firmware::grbl::device_status::{DeviceStatus, FaultKind};
use crate::firmware::grbl::messages::{
    BuildInfo, GrblMessage, GrblMessageKind, ParameterValue, StartupBanner,
};
use crate::firmware::grbl::response_parser::parse_line;
use crate::firmware::grbl::settings::GrblSettings;
use crate::firmware::grbl::utils::{self, realtime, CommandClass};

/// Feedback text GRBL prints when `$X` lifts an alarm
const UNLOCK_FEEDBACK: &str = "Caution: Unlocked";
/// Feedback text GRBL prints when homing is required before use
const HOMING_REQUIRED_FEEDBACK: &str = "'$H'|'$X' to unlock";

/// Controller configuration
#[derive(Debug, Clone)]
pub struct GrblControllerConfig {
    /// Send buffer capacity and fill threshold
    pub buffer: SendBufferConfig,
    /// Interval between out-of-band `?` status queries
    pub status_poll_interval: Duration,
    /// Interval between `$G` parser state queries
    pub parser_poll_interval: Duration,
    /// Idle delay between loop iterations
    pub loop_delay: Duration,
}

impl Default for GrblControllerConfig {
    fn default() -> Self {
        Self {
            buffer: SendBufferConfig::default(),
            status_poll_interval: Duration::from_secs(1),
            parser_poll_interval: Duration::from_secs(10),
            loop_delay: Duration::from_millis(10),
        }
    }
}

/// GRBL controller for one serial session
///
/// Cheap to clone; clones share the same session state, so the streamer and
/// UI layers can hold their own handle.
#[derive(Clone)]
pub struct GrblController {
    config: GrblControllerConfig,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    status: Arc<RwLock<DeviceStatus>>,
    buffer: Arc<Mutex<SendBuffer>>,
    realtime_queue: Arc<Mutex<VecDeque<u8>>>,
    monitor: Arc<Monitor>,
    settings: Arc<RwLock<GrblSettings>>,
    parameters: Arc<RwLock<HashMap<String, ParameterValue>>>,
    startup_lines: Arc<RwLock<HashMap<String, String>>>,
    build_info: Arc<RwLock<BuildInfo>>,
    help_text: Arc<RwLock<Option<String>>>,
    io_thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GrblController {
    /// Create a controller over the given transport
    pub fn new(transport: Box<dyn Transport>, config: GrblControllerConfig) -> Self {
        let buffer = SendBuffer::new(config.buffer.clone());
        Self {
            config,
            transport: Arc::new(Mutex::new(transport)),
            status: Arc::new(RwLock::new(DeviceStatus::new())),
            buffer: Arc::new(Mutex::new(buffer)),
            realtime_queue: Arc::new(Mutex::new(VecDeque::new())),
            monitor: Arc::new(Monitor::new()),
            settings: Arc::new(RwLock::new(GrblSettings::new())),
            parameters: Arc::new(RwLock::new(HashMap::new())),
            startup_lines: Arc::new(RwLock::new(HashMap::new())),
            build_info: Arc::new(RwLock::new(BuildInfo::default())),
            help_text: Arc::new(RwLock::new(None)),
            io_thread: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a controller over a real serial port
    pub fn serial(config: GrblControllerConfig) -> Self {
        Self::new(Box::new(SerialTransport::new()), config)
    }

    /// Open the session
    ///
    /// The first line the device prints must be its startup banner; anything
    /// else is a fatal connection error and nothing of the session is kept.
    /// If the following line announces that homing is required, the homing
    /// handling runs before this returns. On success the background I/O loop
    /// is running and the banner is returned for display.
    pub fn connect(&self, params: &ConnectionParams) -> Result<StartupBanner> {
        if self.status.read().connected() {
            return Err(ConnectionError::AlreadyConnected.into());
        }

        let (banner, homing_required) = {
            let mut transport = self.transport.lock();
            let first = transport.start_connection(params)?;
            let message = parse_line(&first);
            self.monitor.received(message.kind_name(), &first, false);

            let banner = match message.kind {
                GrblMessageKind::Startup(banner) => banner,
                _ => {
                    let _ = transport.stop_connection();
                    return Err(ConnectionError::UnexpectedBanner { line: first }.into());
                }
            };

            let second = transport.read_line()?;
            let mut homing_required = false;
            if !second.trim().is_empty() {
                let message = parse_line(&second);
                self.monitor.received(message.kind_name(), &second, false);
                if let GrblMessageKind::Feedback { text } = &message.kind {
                    homing_required = text.contains(HOMING_REQUIRED_FEEDBACK);
                }
            }
            (banner, homing_required)
        };

        // Fresh per-session state; nothing carries over from a prior session.
        {
            let mut status = self.status.write();
            *status = DeviceStatus::new();
            status.set_connected(true);
        }
        self.buffer.lock().reset();
        self.realtime_queue.lock().clear();
        self.settings.write().clear();
        self.parameters.write().clear();
        self.startup_lines.write().clear();
        *self.build_info.write() = BuildInfo::default();
        *self.help_text.write() = None;

        let worker = self.clone();
        *self.io_thread.lock() = Some(std::thread::spawn(move || worker.io_loop()));

        self.monitor.info(&format!(
            "Connected to {} ({} {})",
            params.port, banner.firmware, banner.version
        ));

        if homing_required {
            self.monitor.info("Device reports homing required");
            self.handle_homing_cycle()?;
        }

        Ok(banner)
    }

    /// Close the session
    ///
    /// Idempotent. Signals the I/O loop to stop and waits for it; the loop
    /// observes the flag within one read timeout, drains the queue, and
    /// closes the transport.
    pub fn disconnect(&self) -> Result<()> {
        let handle = self.io_thread.lock().take();

        if self.status.read().connected() {
            self.status.write().set_stop(true);
        }
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        // If the loop never ran (connect failed part-way), close here.
        if self.status.read().connected() {
            let _ = self.transport.lock().stop_connection();
            let mut status = self.status.write();
            status.set_connected(false);
            status.set_stop(false);
        }

        Ok(())
    }

    /// Validate and enqueue a command
    ///
    /// Returns as soon as the command is queued; the terminal response is
    /// correlated asynchronously by the I/O loop. Rejected commands never
    /// reach the queue.
    pub fn send_command(&self, command: &str) -> Result<()> {
        let Some(class) = utils::classify_command(command) else {
            self.monitor
                .error(&format!("Invalid command rejected: {:?}", command));
            return Err(CommandError::InvalidCommand {
                command: command.to_string(),
            }
            .into());
        };

        if !self.status.read().connected() {
            return Err(CommandError::NotConnected.into());
        }

        match class {
            CommandClass::Realtime(byte) => self.realtime_queue.lock().push_back(byte),
            _ => self.buffer.lock().queue(command.trim().to_string()),
        }
        Ok(())
    }

    /// Build and enqueue a `$J=` jog command
    #[allow(clippy::too_many_arguments)]
    pub fn jog(
        &self,
        x: f64,
        y: f64,
        z: f64,
        feed_rate: f64,
        units: Option<Units>,
        distance_mode: Option<DistanceMode>,
        machine_coordinates: bool,
    ) -> Result<()> {
        let command =
            utils::build_jog_command(x, y, z, feed_rate, units, distance_mode, machine_coordinates);
        self.send_command(&command)
    }

    /// Write device settings, one `$n=value` command per entry
    pub fn set_settings(&self, settings: &BTreeMap<u32, String>) -> Result<()> {
        for (index, value) in settings {
            self.send_command(&format!("${}={}", index, value))?;
        }
        Ok(())
    }

    /// Request a status report (out-of-band realtime query)
    pub fn query_status_report(&self) -> Result<()> {
        self.send_command("?")
    }

    /// Request the parser modal state (`$G`)
    pub fn query_gcode_parser_state(&self) -> Result<()> {
        self.send_command("$G")
    }

    /// Request the help listing (`$`)
    pub fn query_grbl_help(&self) -> Result<()> {
        self.send_command("$")
    }

    /// Request the stored parameters (`$#`)
    pub fn query_grbl_parameters(&self) -> Result<()> {
        self.send_command("$#")
    }

    /// Request the settings dump (`$$`)
    pub fn query_grbl_settings(&self) -> Result<()> {
        self.send_command("$$")
    }

    /// Request build info (`$I`)
    pub fn query_build_info(&self) -> Result<()> {
        self.send_command("$I")
    }

    /// Handle a homing request
    ///
    /// The homing cycle is unstable on the firmware builds this targets, so
    /// an unlock stands in for `$H` until that is resolved.
    pub fn handle_homing_cycle(&self) -> Result<()> {
        self.monitor
            .warning("Homing requested; issuing unlock in its place");
        self.disable_alarm()
    }

    /// Lift an alarm lockout (`$X`)
    ///
    /// The loop confirms success when the unlock feedback arrives; asking
    /// with no alarm active is logged but still sent.
    pub fn disable_alarm(&self) -> Result<()> {
        if !self.status.read().is_alarm() {
            self.monitor.info("Unlock requested with no active alarm");
        }
        self.send_command("$X")
    }

    /// Toggle check mode (`$C`)
    ///
    /// The stored check-mode flag updates when the Enabled/Disabled feedback
    /// arrives.
    pub fn toggle_check_mode(&self) -> Result<()> {
        self.send_command("$C")
    }

    /// Pause or resume execution
    ///
    /// Pausing sends the feed-hold realtime command; resuming sends cycle
    /// start. The flag also gates the loop's send phase, so no further
    /// queued command goes out while paused.
    pub fn set_paused(&self, paused: bool) -> Result<()> {
        self.status.write().set_paused(paused);
        if self.status.read().connected() {
            let byte = if paused {
                realtime::FEED_HOLD
            } else {
                realtime::CYCLE_START
            };
            self.realtime_queue.lock().push_back(byte);
        }
        self.monitor
            .info(if paused { "Feed hold" } else { "Cycle start" });
        Ok(())
    }

    /// Estimated device receive-buffer fill, in percent
    pub fn buffer_fill(&self) -> f64 {
        self.buffer.lock().fill_percent()
    }

    /// Drop all queued-but-unsent commands
    pub fn empty_queue(&self) {
        self.buffer.lock().clear_pending();
    }

    /// Number of commands waiting to be sent
    pub fn pending_commands(&self) -> usize {
        self.buffer.lock().pending_count()
    }

    /// Number of commands awaiting their terminal response
    pub fn in_flight_commands(&self) -> usize {
        self.buffer.lock().in_flight_count()
    }

    /// Snapshot of the device status model
    pub fn device_status(&self) -> DeviceStatus {
        self.status.read().clone()
    }

    /// Whether a session is active
    pub fn is_connected(&self) -> bool {
        self.status.read().connected()
    }

    /// Whether a fault is recorded
    pub fn failed(&self) -> bool {
        self.status.read().failed()
    }

    /// Whether the device is in alarm lockout
    pub fn is_alarm(&self) -> bool {
        self.status.read().is_alarm()
    }

    /// Whether a program-end command has been sent
    pub fn is_finished(&self) -> bool {
        self.status.read().finished()
    }

    /// Display string for the recorded fault, empty when none
    pub fn fault_message(&self) -> String {
        self.status.read().fault_message()
    }

    /// Snapshot of the captured device settings
    pub fn settings(&self) -> GrblSettings {
        self.settings.read().clone()
    }

    /// Snapshot of the captured parameters
    pub fn parameters(&self) -> HashMap<String, ParameterValue> {
        self.parameters.read().clone()
    }

    /// Snapshot of the stored startup lines
    pub fn startup_lines(&self) -> HashMap<String, String> {
        self.startup_lines.read().clone()
    }

    /// Snapshot of the accumulated build info
    pub fn build_info(&self) -> BuildInfo {
        self.build_info.read().clone()
    }

    /// The captured help listing, if queried
    pub fn help_text(&self) -> Option<String> {
        self.help_text.read().clone()
    }

    /// The shared monitor sink
    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(&self.monitor)
    }

    /// The controller configuration
    pub fn config(&self) -> &GrblControllerConfig {
        &self.config
    }

    /// Background I/O loop, run on its own thread for the session lifetime
    fn io_loop(&self) {
        // First polls fire on the first iteration.
        let mut last_status_poll = Instant::now()
            .checked_sub(self.config.status_poll_interval)
            .unwrap_or_else(Instant::now);
        let mut last_parser_poll = Instant::now();

        loop {
            if self.status.read().stop() {
                self.empty_queue();
                self.monitor.info("Disconnecting");
                break;
            }

            if let Err(error) = self.io_iteration(&mut last_status_poll, &mut last_parser_poll) {
                // Transport failures are fatal to the session; no reconnect.
                self.monitor.error(&format!("Transport failure: {}", error));
                break;
            }

            std::thread::sleep(self.config.loop_delay);
        }

        // Single teardown path for both exits.
        let _ = self.transport.lock().stop_connection();
        self.buffer.lock().clear_pending();
        self.realtime_queue.lock().clear();
        let mut status = self.status.write();
        status.set_connected(false);
        status.set_stop(false);
    }

    /// One loop iteration: poll, drain realtime, read one line, send one
    /// command
    fn io_iteration(
        &self,
        last_status_poll: &mut Instant,
        last_parser_poll: &mut Instant,
    ) -> Result<()> {
        // Status queries are out-of-band: straight to the transport, never
        // counted against occupancy.
        if last_status_poll.elapsed() >= self.config.status_poll_interval {
            self.transport.lock().send_byte(realtime::STATUS_QUERY)?;
            self.monitor.sent("?", true);
            *last_status_poll = Instant::now();
        }
        if last_parser_poll.elapsed() >= self.config.parser_poll_interval {
            self.buffer.lock().queue("$G".to_string());
            *last_parser_poll = Instant::now();
        }

        // Realtime bytes bypass the counted queue and the pause flag.
        loop {
            let byte = self.realtime_queue.lock().pop_front();
            let Some(byte) = byte else { break };
            self.transport.lock().send_byte(byte)?;
            let shown = if byte.is_ascii_graphic() {
                (byte as char).to_string()
            } else {
                format!("0x{:02X}", byte)
            };
            self.monitor.sent(&shown, false);
        }

        // Drain one line of input.
        let line = {
            let mut transport = self.transport.lock();
            if transport.waiting()? {
                Some(transport.read_line()?)
            } else {
                None
            }
        };
        if let Some(line) = line {
            if !line.trim().is_empty() {
                let message = parse_line(&line);
                self.route_message(&message)?;
            }
        }

        // Send phase. The threshold is re-evaluated every iteration because
        // occupancy shrinks asynchronously as responses arrive.
        if !self.status.read().paused() {
            let command = {
                let mut buffer = self.buffer.lock();
                if buffer.ready_to_send() {
                    buffer.take_next()
                } else {
                    None
                }
            };
            if let Some(command) = command {
                self.transport.lock().send_line(&command)?;
                self.monitor.sent(&command, false);
                if utils::is_program_end(&command) {
                    self.status.write().set_finished(true);
                    self.monitor.info("Program end reached");
                }
            }
        }

        Ok(())
    }

    /// Route one parsed message into device state and the send buffer
    fn route_message(&self, message: &GrblMessage) -> Result<()> {
        // Status reports and acks arrive every second; keep them out of the
        // operator queue.
        let debug_only = matches!(
            message.kind,
            GrblMessageKind::Status(_) | GrblMessageKind::Ok
        );
        self.monitor
            .received(message.kind_name(), &message.raw, debug_only);

        match &message.kind {
            GrblMessageKind::Status(report) => {
                self.status.write().update_status(report);
            }
            GrblMessageKind::ParserState(report) => {
                self.status.write().update_parser_state(report);
            }
            GrblMessageKind::Ok => {
                self.buffer.lock().acknowledge();
            }
            GrblMessageKind::Error(fault) => {
                let source = self.buffer.lock().fail().unwrap_or_default();
                self.status
                    .write()
                    .set_fault(&source, fault.clone(), FaultKind::Error);
                self.monitor
                    .error(&format!("Command {:?} failed: error {}", source, fault));
                self.set_paused(true)?;
            }
            GrblMessageKind::Alarm(fault) => {
                let source = self.buffer.lock().fail().unwrap_or_default();
                self.status
                    .write()
                    .set_fault(&source, fault.clone(), FaultKind::Alarm);
                self.monitor.error(&format!("Alarm raised: {}", fault));
                self.set_paused(true)?;
            }
            GrblMessageKind::Feedback { text } => {
                if text.contains(UNLOCK_FEEDBACK) {
                    let had_alarm = self.status.read().alarm();
                    self.status.write().clear_alarm();
                    if had_alarm {
                        self.monitor.info("Alarm cleared by unlock");
                    } else {
                        self.monitor.info("Unlock confirmed; no alarm was active");
                    }
                } else if text.contains("Enabled") {
                    self.status.write().set_check_mode(true);
                    self.monitor.info("Check mode enabled");
                } else if text.contains("Disabled") {
                    self.status.write().set_check_mode(false);
                    self.monitor.info("Check mode disabled");
                }
            }
            GrblMessageKind::Setting { name, value } => {
                if let Ok(index) = name.parse::<u32>() {
                    self.settings.write().set(index, value.clone());
                }
            }
            GrblMessageKind::Parameter { name, value } => {
                self.parameters.write().insert(name.clone(), value.clone());
            }
            GrblMessageKind::UserStartupLine { name, value } => {
                self.startup_lines
                    .write()
                    .insert(name.clone(), value.clone());
            }
            GrblMessageKind::Version { version, comment } => {
                self.build_info.write().merge_version(version, comment);
            }
            GrblMessageKind::Options(options) => {
                self.build_info.write().merge_options(options);
            }
            GrblMessageKind::Help { text } => {
                *self.help_text.write() = Some(text.clone());
            }
            GrblMessageKind::Echo { .. } => {}
            GrblMessageKind::Startup(banner) => {
                self.monitor.warning(&format!(
                    "Device restarted mid-session: {} {}",
                    banner.firmware, banner.version
                ));
            }
            GrblMessageKind::Unrecognized => {
                self.monitor.debug(&format!("Unrecognized line: {:?}", message.raw));
            }
        }

        Ok(())
    }
}
