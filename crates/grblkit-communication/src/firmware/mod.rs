//! Firmware protocol implementations
//!
//! GRBL v1.1 is the supported controller firmware. Fields specific to the
//! v0.9 report format are tolerated by the parsers but not required.

pub mod grbl;
