//! Environment variable parsing utilities.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Get environment variable with default value.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get optional environment variable (None if empty or missing).
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse environment variable as boolean.
/// Treats "1", "true" (case-insensitive) as true.
pub fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Parse environment variable with type conversion.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => parse_value(key, &v),
        _ => Ok(default),
    }
}

/// Parse an optional environment variable with type conversion.
pub fn env_parse_opt<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    env_opt(key).map(|v| parse_value(key, &v)).transpose()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Parse {
        key: key.into(),
        value: value.into(),
        error: e.to_string(),
    })
}

/// Parse duration string (e.g., "500ms", "30s", "2m", "1h").
/// Plain numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (s.as_str(), 1_000)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid duration: {}", s))?;

    Ok(Duration::from_millis(num * multiplier_ms))
}

/// Parse environment variable as duration.
pub fn env_duration(key: &str, default: &str) -> Result<Duration, ConfigError> {
    let value = env_or(key, default);
    parse_duration(&value).map_err(|e| ConfigError::Parse {
        key: key.into(),
        value,
        error: e,
    })
}
