//! Paced G-code file streaming
//!
//! Feeds a file's lines into the controller's queue at a bounded rate,
//! independent of any UI framework. The feeder runs on its own thread,
//! ticking at a fixed interval and only sending while the controller's
//! buffer fill is under the threshold.
//!
//! Pausing the streamer stops feeding new lines; it does not touch the
//! controller's own pause flag, which stops GRBL executing already-buffered
//! lines. The two layers are intentionally independent.

use grblkit_core::Result;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::firmware::grbl::controller::GrblController;

/// Streamer configuration
#[derive(Debug, Clone)]
pub struct GcodeStreamerConfig {
    /// Feeder tick interval
    pub tick: Duration,
    /// Buffer fill percentage above which no line is fed
    pub fill_threshold: f64,
}

impl Default for GcodeStreamerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            fill_threshold: 75.0,
        }
    }
}

/// Flags and counters shared with the feeder thread
#[derive(Default)]
struct StreamerState {
    paused: AtomicBool,
    stopped: AtomicBool,
    finished: AtomicBool,
    lines_sent: AtomicUsize,
    lines_total: AtomicUsize,
}

/// Streams a G-code file through a [`GrblController`]
pub struct GcodeStreamer {
    controller: GrblController,
    path: PathBuf,
    config: GcodeStreamerConfig,
    state: Arc<StreamerState>,
    feeder: Mutex<Option<JoinHandle<()>>>,
}

impl GcodeStreamer {
    /// Create a streamer for the given file
    pub fn new(
        controller: GrblController,
        path: impl Into<PathBuf>,
        config: GcodeStreamerConfig,
    ) -> Self {
        Self {
            controller,
            path: path.into(),
            config,
            state: Arc::new(StreamerState::default()),
            feeder: Mutex::new(None),
        }
    }

    /// Load the file and start feeding
    ///
    /// Reads the whole file up front (streams restart from the top of the
    /// file, never mid-way) and spawns the feeder thread.
    pub fn start(&self) -> Result<()> {
        // Restarting supersedes a still-running feeder.
        if let Some(handle) = self.feeder.lock().take() {
            self.state.stopped.store(true, Ordering::SeqCst);
            let _ = handle.join();
        }

        let content = std::fs::read_to_string(&self.path)?;
        let lines: Vec<String> = content.lines().map(str::to_string).collect();

        // A pause set before start is honored; feeding begins held.
        self.state.lines_total.store(lines.len(), Ordering::SeqCst);
        self.state.lines_sent.store(0, Ordering::SeqCst);
        self.state.stopped.store(false, Ordering::SeqCst);
        self.state.finished.store(false, Ordering::SeqCst);

        let controller = self.controller.clone();
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let monitor = controller.monitor();
        monitor.info(&format!(
            "Streaming {} ({} lines)",
            self.path.display(),
            lines.len()
        ));

        let handle = std::thread::spawn(move || {
            let mut next = 0usize;
            loop {
                if state.stopped.load(Ordering::SeqCst) {
                    break;
                }

                if !state.paused.load(Ordering::SeqCst)
                    && controller.buffer_fill() < config.fill_threshold
                {
                    if next >= lines.len() {
                        state.finished.store(true, Ordering::SeqCst);
                        monitor.info("Stream finished");
                        break;
                    }

                    // One line per tick bounds the feed rate.
                    let line = lines[next].trim();
                    next += 1;
                    if !line.is_empty() {
                        if let Err(error) = controller.send_command(line) {
                            // A rejected or undeliverable line is logged and
                            // skipped; the stream itself keeps going.
                            monitor.error(&format!(
                                "Line {} not sent: {}",
                                next, error
                            ));
                        }
                    }
                    state.lines_sent.store(next, Ordering::SeqCst);
                }

                std::thread::sleep(config.tick);
            }
        });

        *self.feeder.lock() = Some(handle);
        Ok(())
    }

    /// Stop feeding lines
    pub fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
    }

    /// Resume feeding lines
    pub fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
    }

    /// Flip the feeding pause flag
    pub fn toggle_paused(&self) {
        self.state.paused.fetch_xor(true, Ordering::SeqCst);
    }

    /// Stop the stream and wait for the feeder thread
    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.feeder.lock().take() {
            let _ = handle.join();
        }
    }

    /// Whether feeding is paused
    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    /// Whether the whole file has been fed
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }

    /// Lines fed so far and the file total
    pub fn progress(&self) -> (usize, usize) {
        (
            self.state.lines_sent.load(Ordering::SeqCst),
            self.state.lines_total.load(Ordering::SeqCst),
        )
    }
}

impl Drop for GcodeStreamer {
    fn drop(&mut self) {
        self.stop();
    }
}
