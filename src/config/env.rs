//! Environment variable readers shared by the configuration sections.
//!
//! Values are trimmed and empty values count as unset. Malformed numbers fall
//! back to the default and are logged.

use std::path::PathBuf;

use tracing::error;

pub fn string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub fn path(key: &str) -> Option<PathBuf> {
    string(key).map(PathBuf::from)
}

pub fn boolean(key: &str, default: bool) -> bool {
    string(key).map(|value| parse_bool(&value)).unwrap_or(default)
}

pub fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub fn unsigned(key: &str, default: u64) -> u64 {
    match string(key) {
        Some(value) => parse_unsigned(&value, default),
        None => default,
    }
}

pub fn parse_unsigned(value: &str, default: u64) -> u64 {
    value.parse().unwrap_or_else(|e| {
        error!(value = %value, error = %e, default, "Invalid integer setting, using default");
        default
    })
}

/// Comma-separated list; `None` when the variable is unset.
pub fn list(key: &str) -> Option<Vec<String>> {
    string(key).map(|value| split_list(&value))
}

pub fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}
