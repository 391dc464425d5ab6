//! Environment-backed configuration helpers.
//!
//! Settings in this workspace are read from process environment variables
//! once at startup. These helpers keep the parsing rules (trimming, blank
//! values treated as unset, typed parsing with named errors) in one place.

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use dirs_next::home_dir;
use thiserror::Error;

/// Errors produced while reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid { name: String, value: String, reason: String },
}

/// Read an environment variable, treating blank values as unset.
pub fn env_var_trimmed(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read a required environment variable.
pub fn require_env(name: &str) -> Result<String, ConfigError> {
    env_var_trimmed(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

/// Parse an optional environment variable, falling back to `default` when unset.
pub fn parse_env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var_trimmed(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

/// Parse an optional environment variable, returning `None` when unset.
pub fn parse_env_opt<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_var_trimmed(name).map(|raw| parse_value(name, &raw)).transpose()
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>().map_err(|error| ConfigError::Invalid {
        name: name.to_string(),
        value: raw.to_string(),
        reason: error.to_string(),
    })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    if let Some(rest) = trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        return home().join(rest);
    }
    PathBuf::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_VAR: &str = "PLEDGE_UTIL_ENV_TEST";

    #[test]
    fn blank_values_are_treated_as_unset() {
        temp_env::with_var(TEST_VAR, Some("   "), || {
            assert_eq!(env_var_trimmed(TEST_VAR), None);
            assert_eq!(require_env(TEST_VAR), Err(ConfigError::Missing(TEST_VAR.to_string())));
        });
    }

    #[test]
    fn parse_env_or_uses_default_when_unset() {
        temp_env::with_var(TEST_VAR, None::<&str>, || {
            assert_eq!(parse_env_or(TEST_VAR, 1000u64), Ok(1000));
        });
    }

    #[test]
    fn parse_env_or_reports_invalid_values() {
        temp_env::with_var(TEST_VAR, Some("soon"), || {
            let error = parse_env_or(TEST_VAR, 1000u64).unwrap_err();
            assert!(matches!(error, ConfigError::Invalid { ref value, .. } if value == "soon"));
        });
    }

    #[test]
    fn parse_env_opt_parses_present_values() {
        temp_env::with_var(TEST_VAR, Some(" 42 "), || {
            assert_eq!(parse_env_opt::<i64>(TEST_VAR), Ok(Some(42)));
        });
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/etc/netrc"), PathBuf::from("/etc/netrc"));
    }
}
