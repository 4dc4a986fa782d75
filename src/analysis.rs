//! Engine analysis requests.
//!
//! The engine lives behind a web API. [`AnalysisCoordinator`] bounds every
//! request in time and, when the primary provider fails for any reason
//! other than a timeout, retries once on the fallback provider at a capped
//! depth. The retry is decided per request; a failure never switches later
//! requests over to the fallback.
//!
//! [`plan_reply`] turns a report into the engine's move, weakened by the
//! difficulty tier in rated play.

use crate::error::AnalysisError;
use crate::game::{GameController, GameMode, ViewState};
use crate::rating::{self, DifficultyTier};
use crate::rules::Position;
use crate::types::{Evaluation, MoveRequest};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Default public Stockfish endpoint.
pub const DEFAULT_ANALYSIS_URL: &str = "https://stockfish.online/api/s/v2.php";

/// Default bound on a single analysis request.
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(15);

/// Deepest search requested from the fallback provider.
pub const FALLBACK_MAX_DEPTH: u8 = 15;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Engine verdict on one position.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub best_move: MoveRequest,
    pub evaluation: Option<Evaluation>,
    /// Principal variation in square-pair notation, space separated.
    pub continuation: Option<String>,
    /// The position this report was computed for.
    pub position: Position,
    pub depth: u8,
}

impl AnalysisReport {
    /// `false` once the game has moved past the analysed position.
    pub fn is_fresh_for(&self, current: &Position) -> bool {
        &self.position == current
    }
}

/// Wire format of the Stockfish web API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    /// `"bestmove e2e4 ponder e7e5"`
    #[serde(default)]
    pub bestmove: Option<String>,
    #[serde(default)]
    pub evaluation: Option<f64>,
    #[serde(default)]
    pub mate: Option<i32>,
    #[serde(default)]
    pub continuation: Option<String>,
    /// Error text when `success` is false.
    #[serde(default)]
    pub data: Option<String>,
}

impl AnalysisResponse {
    /// Validates the response and converts it into a report.
    pub fn into_report(self, position: &Position, depth: u8) -> Result<AnalysisReport, AnalysisError> {
        if !self.success {
            return Err(AnalysisError::Unsuccessful(
                self.data.unwrap_or_else(|| "no details".to_string()),
            ));
        }
        let raw = self
            .bestmove
            .ok_or_else(|| AnalysisError::Malformed("missing bestmove".to_string()))?;
        let best_move = raw
            .split_whitespace()
            .nth(1)
            .and_then(|m| m.parse::<MoveRequest>().ok())
            .ok_or_else(|| AnalysisError::Malformed(format!("unreadable bestmove '{}'", raw)))?;

        let evaluation = match (self.mate, self.evaluation) {
            (Some(n), _) => Some(Evaluation::MateIn(n)),
            (None, Some(v)) => Some(Evaluation::Score(v)),
            (None, None) => None,
        };

        Ok(AnalysisReport {
            best_move,
            evaluation,
            continuation: self.continuation.filter(|c| !c.trim().is_empty()),
            position: position.clone(),
            depth,
        })
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Something that can analyse a position.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyse(&self, position: &Position, depth: u8) -> Result<AnalysisReport, AnalysisError>;
}

/// [`AnalysisProvider`] for the stockfish.online v2 API.
pub struct StockfishOnline {
    client: reqwest::Client,
    url: String,
}

impl StockfishOnline {
    pub fn new(url: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("checkrank/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AnalysisProvider for StockfishOnline {
    async fn analyse(&self, position: &Position, depth: u8) -> Result<AnalysisReport, AnalysisError> {
        log::debug!("Requesting analysis at depth {} for {}", depth, position);
        let response: AnalysisResponse = self
            .client
            .get(&self.url)
            .query(&[("fen", position.fen().to_string()), ("depth", depth.to_string())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_report(position, depth)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct AnalysisCoordinator {
    primary: Arc<dyn AnalysisProvider>,
    fallback: Arc<dyn AnalysisProvider>,
    timeout: Duration,
}

impl AnalysisCoordinator {
    pub fn new(
        primary: Arc<dyn AnalysisProvider>,
        fallback: Arc<dyn AnalysisProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    async fn attempt(
        &self,
        provider: &dyn AnalysisProvider,
        position: &Position,
        depth: u8,
    ) -> Result<AnalysisReport, AnalysisError> {
        tokio::time::timeout(self.timeout, provider.analyse(position, depth))
            .await
            .map_err(|_| AnalysisError::Timeout)?
    }

    /// Analyses `position`, falling back once on failure.
    pub async fn request_analysis(
        &self,
        position: &Position,
        depth: u8,
    ) -> Result<AnalysisReport, AnalysisError> {
        match self.attempt(self.primary.as_ref(), position, depth).await {
            Ok(report) => Ok(report),
            Err(AnalysisError::Timeout) => {
                log::warn!("Analysis timed out after {:?}", self.timeout);
                Err(AnalysisError::Timeout)
            }
            Err(first) => {
                let capped = depth.min(FALLBACK_MAX_DEPTH);
                log::warn!(
                    "Primary analysis failed ({}), retrying on fallback at depth {}",
                    first,
                    capped
                );
                self.attempt(self.fallback.as_ref(), position, capped)
                    .await
                    .map_err(|second| {
                        log::error!("Fallback analysis failed: {}", second);
                        AnalysisError::Unavailable(second.to_string())
                    })
            }
        }
    }
}

/// The move the engine should play now, or `None` when it must not move:
/// not its turn, the board is not live, or the report is stale.
pub fn plan_reply<R: Rng>(
    controller: &GameController,
    report: &AnalysisReport,
    tier: &DifficultyTier,
    rng: &mut R,
) -> Option<MoveRequest> {
    if !controller.is_engine_turn() || controller.view() != ViewState::Live {
        return None;
    }
    if !report.is_fresh_for(controller.current()) {
        log::debug!("Discarding stale analysis for {}", report.position);
        return None;
    }
    if controller.mode() == GameMode::Rated {
        let legal = controller.legal_moves();
        Some(rating::degrade_move(report.best_move, tier.error_rate, &legal, rng))
    } else {
        Some(report.best_move)
    }
}
