//! Error types for checkrank.
//!
//! One enum per concern. Move rejections are ordinary values the caller
//! reports to the player; none of these are fatal.

use thiserror::Error;

/// Why the game controller refused a proposed move.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    #[error("moves are disabled while editing a position")]
    Editing,
    #[error("the game is over")]
    GameOver,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("it is not the engine's turn")]
    NotEngineTurn,
    #[error("illegal move: {0}")]
    Illegal(String),
}

/// A FEN record that could not be turned into a position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}

/// Failure to obtain an engine analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analysis timed out")]
    Timeout,
    #[error("analysis request failed: {0}")]
    Transport(String),
    #[error("analysis service reported failure: {0}")]
    Unsuccessful(String),
    #[error("malformed analysis response: {0}")]
    Malformed(String),
    #[error("analysis unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else if e.is_decode() {
            AnalysisError::Malformed(e.to_string())
        } else {
            AnalysisError::Transport(e.to_string())
        }
    }
}

/// Failure to write a snapshot to the remote leaderboard.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("leaderboard request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("leaderboard rejected the update: HTTP {0}")]
    Status(u16),
    #[error("leaderboard unreachable: {0}")]
    Unreachable(String),
}

/// Failure to import a profile document.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not read profile file: {0}")]
    Io(#[from] std::io::Error),
    #[error("profile file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("profile file rejected: {0}")]
    Invalid(String),
}

/// A profile change that was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name must be at most {0} characters")]
    NameTooLong(usize),
}

/// Failure of the local key/value store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
