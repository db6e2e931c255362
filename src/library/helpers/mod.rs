//! Various small helper functions

mod backoff;

pub use backoff::Backoff;

use std::num::ParseIntError;
use std::time::Duration;

/// Parses a Duration from a string containing seconds.
/// Useful for command line parsing
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    let seconds = src.parse::<u64>()?;
    Ok(Duration::from_secs(seconds))
}

/// Parses a Duration from a string containing milliseconds.
/// Useful for command line parsing
pub fn parse_millis(src: &str) -> Result<Duration, ParseIntError> {
    let millis = src.parse::<u64>()?;
    Ok(Duration::from_millis(millis))
}

/// Splits the input string into two parts at the first occurence of the separator
pub fn split_into_two(input: &str, separator: &'static str) -> Option<(String, String)> {
    let parts: Vec<&str> = input.splitn(2, separator).collect();

    if parts.len() != 2 {
        return None;
    }

    Some((parts[0].to_string(), parts[1].to_string()))
}
