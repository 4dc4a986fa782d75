//! Player profile.
//!
//! The profile is local-authoritative: the rating and the outcome log live
//! in the [`LocalStore`] and the leaderboard only ever receives snapshots of
//! them. Both mutate exclusively through [`PlayerProfile::record_outcome`]
//! and the all-or-nothing [`PlayerProfile::import_json`].

use crate::error::{ImportError, ProfileError, StorageError};
use crate::rating::{self, DifficultyTier, INITIAL_RATING};
use crate::storage::{self, LocalStore};
use crate::types::{GameOutcome, OutcomeKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;
use uuid::Uuid;

/// Name shown on the leaderboard until the player picks one.
pub const DEFAULT_PLAYER_NAME: &str = "Anonymous player";

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Ratings outside this range are rejected on import.
pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 0..=4000;

const EXPORT_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One scored game in the profile's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeLogEntry {
    /// Unix timestamp (seconds) when the game ended.
    pub date: u64,
    pub result: OutcomeKind,
    #[serde(rename = "eloChange")]
    pub rating_change: i32,
    #[serde(rename = "opponentElo")]
    pub opponent_rating: i32,
}

/// Win/loss/draw counts derived from the outcome log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl PlayerStats {
    pub fn from_log(log: &[OutcomeLogEntry]) -> Self {
        let mut stats = PlayerStats::default();
        for entry in log {
            stats.games_played += 1;
            match entry.result {
                OutcomeKind::Win => stats.wins += 1,
                OutcomeKind::Loss => stats.losses += 1,
                OutcomeKind::Draw => stats.draws += 1,
            }
        }
        stats
    }

    /// Percentage of games won, rounded.
    pub fn win_rate(&self) -> u32 {
        if self.games_played == 0 {
            return 0;
        }
        ((self.wins as f64 / self.games_played as f64) * 100.0).round() as u32
    }
}

/// Leaderboard entry for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Stable anonymous player id (UUID v4).
    pub id: String,
    pub username: String,
    /// Current rating.
    pub elo: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub games_played: u32,
    /// ISO-8601 time of the last accepted update, stamped by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<String>,
}

/// Effect of one scored game on the rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingChange {
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
    pub tier: &'static DifficultyTier,
}

/// Exported profile file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default)]
    pub player_name: Option<String>,
    pub player_elo: i32,
    #[serde(default)]
    pub game_history: Vec<OutcomeLogEntry>,
    pub version: String,
    #[serde(default)]
    pub export_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlayerProfile {
    id: Uuid,
    name: Option<String>,
    rating: i32,
    log: Vec<OutcomeLogEntry>,
}

impl PlayerProfile {
    /// A brand-new anonymous profile.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            rating: INITIAL_RATING,
            log: Vec::new(),
        }
    }

    /// Loads the profile from `store`, creating and persisting a fresh id on
    /// first run. Unreadable values fall back to their defaults.
    pub fn load(store: &LocalStore) -> Result<Self, StorageError> {
        let id = match store.load_json::<Uuid>(storage::KEY_PLAYER_ID) {
            Ok(Some(id)) => id,
            other => {
                if let Err(e) = other {
                    log::warn!("Player id unreadable, generating a new one: {}", e);
                }
                let id = Uuid::new_v4();
                store.save_json(storage::KEY_PLAYER_ID, &id)?;
                log::info!("Created player id {}", id);
                id
            }
        };
        let name: Option<String> = store.load_json_or_default(storage::KEY_PLAYER_NAME);
        let rating = store
            .load_json_or_default::<Option<i32>>(storage::KEY_PLAYER_RATING)
            .unwrap_or(INITIAL_RATING);
        let log: Vec<OutcomeLogEntry> = store.load_json_or_default(storage::KEY_OUTCOME_LOG);

        Ok(Self {
            id,
            name,
            rating,
            log,
        })
    }

    /// Persists every profile key.
    pub fn save(&self, store: &LocalStore) -> Result<(), StorageError> {
        store.save_json(storage::KEY_PLAYER_ID, &self.id)?;
        match &self.name {
            Some(name) => store.save_json(storage::KEY_PLAYER_NAME, name)?,
            None => store.remove(storage::KEY_PLAYER_NAME)?,
        }
        store.save_json(storage::KEY_PLAYER_RATING, &self.rating)?;
        store.save_json(storage::KEY_OUTCOME_LOG, &self.log)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn rating(&self) -> i32 {
        self.rating
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_PLAYER_NAME)
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    /// Scored games, oldest first.
    pub fn log(&self) -> &[OutcomeLogEntry] {
        &self.log
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats::from_log(&self.log)
    }

    pub fn tier(&self) -> &'static DifficultyTier {
        rating::tier_for_rating(self.rating)
    }

    /// Sets the display name. Blank or over-long names are refused.
    pub fn rename(&mut self, name: &str) -> Result<(), ProfileError> {
        self.name = Some(validate_name(name)?);
        Ok(())
    }

    /// Applies a scored game to the rating and appends it to the log.
    pub fn record_outcome(&mut self, outcome: GameOutcome, timestamp: u64) -> RatingChange {
        let old_rating = self.rating;
        let new_rating = rating::new_rating(old_rating, outcome.opponent_rating, outcome.kind);
        self.rating = new_rating;
        self.log.push(OutcomeLogEntry {
            date: timestamp,
            result: outcome.kind,
            rating_change: new_rating - old_rating,
            opponent_rating: outcome.opponent_rating,
        });
        log::info!(
            "Recorded {} against {}: rating {} -> {}",
            outcome.kind,
            outcome.opponent_rating,
            old_rating,
            new_rating
        );
        RatingChange {
            old_rating,
            new_rating,
            delta: new_rating - old_rating,
            tier: rating::tier_for_rating(new_rating),
        }
    }

    /// Snapshot sent to the leaderboard.
    pub fn snapshot(&self) -> PlayerRecord {
        let stats = self.stats();
        PlayerRecord {
            id: self.id.to_string(),
            username: self.display_name().to_string(),
            elo: self.rating,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
            games_played: stats.games_played,
            last_played: None,
        }
    }

    // -- export / import ----------------------------------------------------

    pub fn export_document(&self) -> ProfileDocument {
        ProfileDocument {
            player_name: self.name.clone(),
            player_elo: self.rating,
            game_history: self.log.clone(),
            version: EXPORT_VERSION.to_string(),
            export_date: Some(storage::iso8601(storage::unix_timestamp())),
        }
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export_document())
    }

    /// Writes the export document to `path`.
    pub fn export_to_file(&self, path: &Path) -> Result<(), ImportError> {
        std::fs::write(path, self.export_json()?)?;
        Ok(())
    }

    /// Replaces rating, log and (when present) name with the contents of an
    /// exported document. The whole document is validated first; on any
    /// error the profile is left untouched.
    pub fn import_json(&mut self, text: &str) -> Result<(), ImportError> {
        let doc: ProfileDocument = serde_json::from_str(text)?;
        let name = validate_document(&doc)?;

        let mut log = doc.game_history;
        log.sort_by_key(|e| e.date);

        self.rating = doc.player_elo;
        self.log = log;
        if name.is_some() {
            self.name = name;
        }
        log::info!(
            "Imported profile: rating {}, {} games",
            self.rating,
            self.log.len()
        );
        Ok(())
    }

    pub fn import_from_file(&mut self, path: &Path) -> Result<(), ImportError> {
        let text = std::fs::read_to_string(path)?;
        self.import_json(&text)
    }
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<String, ProfileError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProfileError::EmptyName);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ProfileError::NameTooLong(MAX_NAME_LEN));
    }
    Ok(trimmed.to_string())
}

/// Checks an import document and returns the validated name, if any.
fn validate_document(doc: &ProfileDocument) -> Result<Option<String>, ImportError> {
    if doc.version != EXPORT_VERSION {
        return Err(ImportError::Invalid(format!(
            "unsupported version '{}'",
            doc.version
        )));
    }
    if !RATING_RANGE.contains(&doc.player_elo) {
        return Err(ImportError::Invalid(format!(
            "rating {} out of range",
            doc.player_elo
        )));
    }
    for (i, entry) in doc.game_history.iter().enumerate() {
        if !RATING_RANGE.contains(&entry.opponent_rating) {
            return Err(ImportError::Invalid(format!(
                "game {}: opponent rating {} out of range",
                i + 1,
                entry.opponent_rating
            )));
        }
    }
    doc.player_name
        .as_deref()
        .map(validate_name)
        .transpose()
        .map_err(|e| ImportError::Invalid(e.to_string()))
}
