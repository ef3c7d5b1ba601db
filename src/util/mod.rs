//! Utility functions module
//!
//! Contains helpers for time unit conversion, duration parsing
//! and human-readable number formatting.

pub mod units;

// Re-export commonly used functions
pub use units::{
    calculate_throughput, format_duration, format_throughput, human_readable_number,
    millisecond_time, parse_duration, parse_size, HumanNumberOptions, TimeUnit,
};
