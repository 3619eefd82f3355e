//! Shared utilities: unit-suffixed quantity decoding.

pub mod duration;

pub use duration::{parse_quantity_ns, parse_time_ns};
