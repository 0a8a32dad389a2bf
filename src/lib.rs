//! Per-stream state machine and flow-controlled write path for HTTP/2.
#![warn(missing_debug_implementations)]

mod log;

pub mod h2;
