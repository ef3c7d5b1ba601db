//! Units formatting and conversion utilities
//!
//! Time unit conversion for configuration values, human-readable
//! order-of-magnitude numbers and throughput arithmetic.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use byte_unit::Byte;

use crate::{DocBenchError, Result};

/// Time units accepted in configuration values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    /// Fixed 31 days
    Months,
    /// Fixed 365 days
    Years,
}

impl TimeUnit {
    /// Number of milliseconds in one unit
    pub fn millis(self) -> u64 {
        const SECOND: u64 = 1000;
        const DAY: u64 = SECOND * 60 * 60 * 24;

        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => SECOND,
            TimeUnit::Minutes => SECOND * 60,
            TimeUnit::Hours => SECOND * 60 * 60,
            TimeUnit::Days => DAY,
            TimeUnit::Weeks => DAY * 7,
            TimeUnit::Months => DAY * 31,
            TimeUnit::Years => DAY * 365,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
            TimeUnit::Months => "months",
            TimeUnit::Years => "years",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeUnit {
    type Err = DocBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "milliseconds" => Ok(TimeUnit::Milliseconds),
            "seconds" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            "weeks" => Ok(TimeUnit::Weeks),
            "months" => Ok(TimeUnit::Months),
            "years" => Ok(TimeUnit::Years),
            other => Err(DocBenchError::UnsupportedConfiguration(format!(
                "Unknown time unit: {}",
                other
            ))),
        }
    }
}

/// Convert a time value in the given unit to milliseconds
///
/// Only the leading integer part of `value` is used, so `"10.5"` counts as 10.
///
/// # Examples
/// ```
/// use docbench::util::units::millisecond_time;
///
/// assert_eq!(millisecond_time("2", "seconds").unwrap(), 2000);
/// assert_eq!(millisecond_time("1", "weeks").unwrap(), 604_800_000);
/// assert!(millisecond_time("1", "fortnights").is_err());
/// ```
pub fn millisecond_time(value: &str, unit: &str) -> Result<u64> {
    let unit: TimeUnit = unit.parse()?;
    let trimmed = value.trim();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();

    let amount: u64 = digits.parse().map_err(|_| {
        DocBenchError::UnsupportedConfiguration(format!("Invalid time value: {}", value))
    })?;

    amount.checked_mul(unit.millis()).ok_or_else(|| {
        DocBenchError::UnsupportedConfiguration(format!("Time value too large: {} {}", value, unit))
    })
}

/// Parse a duration written either as `<integer> <unit name>` ("5 seconds")
/// or in humantime notation ("5s", "1m 30s", "250ms")
pub fn parse_duration(input: &str) -> Result<Duration> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    if let [value, unit] = parts.as_slice() {
        if value.chars().all(|c| c.is_ascii_digit()) && unit.parse::<TimeUnit>().is_ok() {
            return millisecond_time(value, unit).map(Duration::from_millis);
        }
    }

    humantime::parse_duration(input.trim()).map_err(|e| {
        DocBenchError::UnsupportedConfiguration(format!("Invalid duration '{}': {}", input, e))
    })
}

/// Format a duration the way `parse_duration` reads it back
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

/// Parse a payload size such as "1 KiB" or "4096"
pub fn parse_size(input: &str) -> Result<u64> {
    Byte::parse_str(input.trim(), true)
        .map(|size| size.as_u64())
        .map_err(|e| DocBenchError::UnsupportedConfiguration(format!("Invalid size '{}': {}", input, e)))
}

/// Options for [`human_readable_number`]
#[derive(Debug, Clone)]
pub struct HumanNumberOptions {
    /// Use 1024 as the magnitude step instead of 1000
    pub bytes: bool,
    /// Significant digits kept in the scaled number
    pub precision: u32,
    /// Text placed between the number and its unit letter
    pub separator: String,
}

impl Default for HumanNumberOptions {
    fn default() -> Self {
        Self {
            bytes: false,
            precision: 3,
            separator: " ".to_string(),
        }
    }
}

const MAGNITUDE_UNITS: &str = "KMGTPEZYXWVU";

/// Scale a number to its order of magnitude, returning the scaled value and
/// the unit letter. Numbers below the threshold come back unchanged with no unit.
pub fn human_readable_pair(n: f64, options: &HumanNumberOptions) -> (f64, Option<char>) {
    let threshold = if options.bytes { 1024.0 } else { 1000.0 };

    if !n.is_finite() || n < threshold {
        return (n, None);
    }

    let mut scaled = n;
    let mut unit_index = 0;
    loop {
        scaled /= threshold;
        if scaled < threshold || unit_index + 1 == MAGNITUDE_UNITS.len() {
            break;
        }
        unit_index += 1;
    }

    let unit = MAGNITUDE_UNITS.chars().nth(unit_index);
    (round_significant(scaled, options.precision.max(1)), unit)
}

/// Convert a number to human-readable form with an order-of-magnitude suffix
///
/// # Examples
/// ```
/// use docbench::util::units::{human_readable_number, HumanNumberOptions};
///
/// let options = HumanNumberOptions::default();
/// assert_eq!(human_readable_number(1500.0, &options), "1.5 K");
/// assert_eq!(human_readable_number(1_000_000.0, &options), "1 M");
/// assert_eq!(human_readable_number(999.0, &options), "999");
/// ```
pub fn human_readable_number(n: f64, options: &HumanNumberOptions) -> String {
    match human_readable_pair(n, options) {
        (value, Some(unit)) => format!("{}{}{}", value, options.separator, unit),
        (value, None) => format!("{}", value),
    }
}

fn round_significant(value: f64, digits: u32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }

    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits as i32 - 1 - magnitude);
    (value * factor).round() / factor
}

/// Round to a fixed number of decimal places
pub fn round_to_precision(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Calculate operations per second from a completion count and elapsed time
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use docbench::util::units::calculate_throughput;
///
/// let throughput = calculate_throughput(1000, Duration::from_secs(2));
/// assert!((throughput - 500.0).abs() < 0.01);
/// ```
pub fn calculate_throughput(operations: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }

    operations as f64 / duration.as_secs_f64()
}

/// Format a throughput figure in requests per second
pub fn format_throughput(requests_per_second: f64) -> String {
    format!(
        "{} req/s",
        human_readable_number(round_to_precision(requests_per_second, 2), &HumanNumberOptions::default())
    )
}
