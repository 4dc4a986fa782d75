//! Application context.
//!
//! Built once at startup and passed to whatever drives the application
//! (terminal loop, CLI subcommands). It owns the player profile, the local
//! store, the leaderboard outbox and the analysis coordinator, and it is
//! the only place where a finished game turns into a rating change and a
//! leaderboard update.

use crate::analysis::{AnalysisCoordinator, StockfishOnline};
use crate::config::{AppConfig, LEADERBOARD_TIMEOUT};
use crate::error::{ImportError, ProfileError};
use crate::leaderboard::{self, HttpLeaderboardStore, LeaderboardStore, LeaderboardSync};
use crate::profile::{PlayerProfile, RatingChange};
use crate::storage::{self, LocalStore};
use crate::types::GameOutcome;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppContext {
    config: AppConfig,
    store: LocalStore,
    profile: PlayerProfile,
    sync: Arc<LeaderboardSync>,
    analysis: AnalysisCoordinator,
    flush_task: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Wires the HTTP-backed services described by `config`.
    pub fn new(config: AppConfig) -> io::Result<Self> {
        let store = LocalStore::open(&config.data_dir)?;
        let remote = HttpLeaderboardStore::new(config.leaderboard_url.clone(), LEADERBOARD_TIMEOUT)
            .map_err(io::Error::other)?;
        let primary = StockfishOnline::new(config.analysis_url.clone()).map_err(io::Error::other)?;
        let fallback =
            StockfishOnline::new(config.fallback_analysis_url.clone()).map_err(io::Error::other)?;
        let analysis =
            AnalysisCoordinator::new(Arc::new(primary), Arc::new(fallback), config.analysis_timeout);
        Self::with_services(config, store, Arc::new(remote), analysis)
    }

    /// Builds a context around explicit service implementations.
    pub fn with_services(
        config: AppConfig,
        store: LocalStore,
        remote: Arc<dyn LeaderboardStore>,
        analysis: AnalysisCoordinator,
    ) -> io::Result<Self> {
        let profile = PlayerProfile::load(&store).map_err(io::Error::other)?;
        let sync = Arc::new(LeaderboardSync::new(store.clone(), remote, config.max_attempts));
        log::info!(
            "Player {} ({}), rating {}",
            profile.display_name(),
            profile.id(),
            profile.rating()
        );
        Ok(Self {
            config,
            store,
            profile,
            sync,
            analysis,
            flush_task: None,
        })
    }

    /// Starts the periodic outbox flush and drains whatever is pending now.
    /// Must be called from within the tokio runtime.
    pub async fn start_background_flush(&mut self) {
        if self.flush_task.is_some() {
            return;
        }
        self.sync.flush().await;
        self.flush_task = Some(leaderboard::spawn_background_flush(
            self.sync.clone(),
            self.config.flush_interval,
        ));
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    pub fn sync(&self) -> &Arc<LeaderboardSync> {
        &self.sync
    }

    pub fn analysis(&self) -> &AnalysisCoordinator {
        &self.analysis
    }

    fn persist_profile(&self) {
        if let Err(e) = self.profile.save(&self.store) {
            log::warn!("Failed to save profile: {}", e);
        }
    }

    /// Applies a scored game: updates the rating, persists the profile,
    /// queues a leaderboard snapshot and flushes the outbox.
    pub async fn record_game(&mut self, outcome: GameOutcome) -> RatingChange {
        let change = self.profile.record_outcome(outcome, storage::unix_timestamp());
        self.persist_profile();
        self.sync.enqueue(self.profile.snapshot());
        self.sync.flush().await;
        change
    }

    /// Renames the player and publishes the new name.
    pub async fn rename_player(&mut self, name: &str) -> Result<(), ProfileError> {
        self.profile.rename(name)?;
        self.persist_profile();
        self.sync.enqueue(self.profile.snapshot());
        self.sync.flush().await;
        Ok(())
    }

    pub fn export_profile(&self, path: &Path) -> Result<(), ImportError> {
        self.profile.export_to_file(path)
    }

    /// Imports a profile file; on success the result is persisted and
    /// published.
    pub async fn import_profile(&mut self, path: &Path) -> Result<(), ImportError> {
        self.profile.import_from_file(path)?;
        self.persist_profile();
        self.sync.enqueue(self.profile.snapshot());
        self.sync.flush().await;
        Ok(())
    }

    /// Stops the background flush and writes the profile one last time.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        self.persist_profile();
        let pending = self.sync.pending();
        if pending > 0 {
            log::info!("{} leaderboard update(s) will be retried next time", pending);
        }
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }
}
