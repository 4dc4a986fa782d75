//! Runtime configuration.
//!
//! Values come from `CHECKRANK_*` environment variables with built-in
//! defaults; command-line flags override individual fields afterwards.

use crate::analysis::{DEFAULT_ANALYSIS_TIMEOUT, DEFAULT_ANALYSIS_URL};
use crate::leaderboard::{DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "CHECKRANK_DATA_DIR";
pub const ENV_LEADERBOARD_URL: &str = "CHECKRANK_LEADERBOARD_URL";
pub const ENV_ANALYSIS_URL: &str = "CHECKRANK_ANALYSIS_URL";
pub const ENV_FALLBACK_ANALYSIS_URL: &str = "CHECKRANK_FALLBACK_ANALYSIS_URL";
pub const ENV_FLUSH_INTERVAL_SECS: &str = "CHECKRANK_FLUSH_INTERVAL_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "CHECKRANK_MAX_ATTEMPTS";
pub const ENV_ANALYSIS_TIMEOUT_SECS: &str = "CHECKRANK_ANALYSIS_TIMEOUT_SECS";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LEADERBOARD_URL: &str = "http://127.0.0.1:8080/api/leaderboard";

/// Timeout for a single leaderboard HTTP request.
pub const LEADERBOARD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory of the local store (and of the leaderboard server's file).
    pub data_dir: PathBuf,
    pub leaderboard_url: String,
    pub analysis_url: String,
    /// Endpoint used for the single fallback attempt.
    pub fallback_analysis_url: String,
    pub flush_interval: Duration,
    pub max_attempts: u32,
    pub analysis_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            leaderboard_url: DEFAULT_LEADERBOARD_URL.to_string(),
            analysis_url: DEFAULT_ANALYSIS_URL.to_string(),
            fallback_analysis_url: DEFAULT_ANALYSIS_URL.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    /// Unparsable numbers fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let analysis_url = lookup(ENV_ANALYSIS_URL).unwrap_or(defaults.analysis_url);

        Self {
            data_dir: lookup(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            leaderboard_url: lookup(ENV_LEADERBOARD_URL).unwrap_or(defaults.leaderboard_url),
            fallback_analysis_url: lookup(ENV_FALLBACK_ANALYSIS_URL)
                .unwrap_or_else(|| analysis_url.clone()),
            analysis_url,
            flush_interval: secs(ENV_FLUSH_INTERVAL_SECS, defaults.flush_interval),
            max_attempts: lookup(ENV_MAX_ATTEMPTS)
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            analysis_timeout: secs(ENV_ANALYSIS_TIMEOUT_SECS, defaults.analysis_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.analysis_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_DATA_DIR, "/tmp/checkrank"),
            (ENV_ANALYSIS_URL, "http://engine.local/api"),
            (ENV_FLUSH_INTERVAL_SECS, "5"),
            (ENV_MAX_ATTEMPTS, "3"),
        ]);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/checkrank"));
        assert_eq!(config.fallback_analysis_url, "http://engine.local/api");
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_invalid_numbers_use_defaults() {
        let config = config_from(&[
            (ENV_MAX_ATTEMPTS, "lots"),
            (ENV_FLUSH_INTERVAL_SECS, "0"),
            (ENV_ANALYSIS_TIMEOUT_SECS, "-1"),
        ]);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.flush_interval, DEFAULT_FLUSH_INTERVAL);
        assert_eq!(config.analysis_timeout, DEFAULT_ANALYSIS_TIMEOUT);
    }
}
