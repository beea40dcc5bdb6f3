//! GRBL v1.1 protocol implementation
//!
//! - [`messages`]: typed payloads for every GRBL message shape
//! - [`response_parser`]: the ordered grammar set and line dispatcher
//! - [`error_decoder`]: static error and alarm code tables
//! - [`device_status`]: the per-session device state model
//! - [`controller`]: command API, send queue, and the background I/O loop
//! - [`streamer`]: paced G-code file feeding on top of the controller
//! - [`settings`]: captured `$$` settings with JSON persistence
//! - [`utils`]: command validation and formatting helpers

pub mod controller;
pub mod device_status;
pub mod error_decoder;
pub mod messages;
pub mod response_parser;
pub mod settings;
pub mod streamer;
pub mod utils;
