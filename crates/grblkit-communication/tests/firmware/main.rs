//! Integration tests for the firmware layer

mod grbl;
