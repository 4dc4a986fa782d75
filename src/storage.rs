//! Local persistence.
//!
//! [`LocalStore`] is a directory of independent JSON files, one per key:
//!
//! ```text
//! <data_dir>/
//!   player_id.json        # stable anonymous UUID
//!   player_name.json      # display name
//!   player_rating.json    # current rating
//!   outcome_log.json      # scored games, oldest first
//!   pending_updates.json  # leaderboard outbox
//! ```
//!
//! Every key has a single writer and writes are atomic (write to a temp
//! file, then rename), so a crash leaves either the old or the new value.

use crate::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const KEY_PLAYER_ID: &str = "player_id";
pub const KEY_PLAYER_NAME: &str = "player_name";
pub const KEY_PLAYER_RATING: &str = "player_rating";
pub const KEY_OUTCOME_LOG: &str = "outcome_log";
pub const KEY_PENDING_UPDATES: &str = "pending_updates";

/// Keyed JSON blob storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    /// Opens (and creates if needed) the store directory.
    pub fn open(base_dir: impl AsRef<Path>) -> io::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        log::info!("Local store initialized at {}", base_dir.display());
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }

    /// Reads the raw text stored under `key`, if any.
    pub fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the value under `key` atomically.
    pub fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let temp_path = self.base_dir.join(format!("{}.json.tmp", key));
        fs::write(&temp_path, value)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        log::debug!("Saved {} ({} bytes)", key, value.len());
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Reads and deserializes `key`. Missing keys yield `Ok(None)`.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.read(key)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Like [`load_json`](Self::load_json), but a corrupt value is logged and
    /// treated as missing.
    pub fn load_json_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load_json(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                log::warn!("Ignoring unreadable key '{}': {}", key, e);
                T::default()
            }
        }
    }

    pub fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(value)?;
        self.write(key, &text)
    }
}

// ---------------------------------------------------------------------------
// Utility: timestamps
// ---------------------------------------------------------------------------

/// Returns the current Unix timestamp in seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns the current Unix timestamp in milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Formats a Unix timestamp as an ISO-8601 UTC string
/// (`2025-03-01T14:05:09Z`).
pub fn iso8601(timestamp: u64) -> String {
    let days = timestamp / 86_400;
    let secs = timestamp % 86_400;
    let (y, m, d) = days_to_date(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        d,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Converts days since the Unix epoch to a civil (year, month, day).
fn days_to_date(days: u64) -> (u64, u64, u64) {
    // Howard Hinnant's civil_from_days.
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
