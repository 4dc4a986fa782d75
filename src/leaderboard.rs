//! Leaderboard synchronization.
//!
//! Profile snapshots reach the remote leaderboard through a persisted
//! outbox. [`LeaderboardSync::enqueue`] stores a snapshot locally first;
//! draining sends the oldest pending update, removes it on success and
//! keeps it (with its attempt counter bumped) on failure. An update that
//! has used up its attempts is dropped with a warning.
//!
//! Snapshots are full player records upserted by id on the remote side, so
//! delivering the same update twice is harmless.

use crate::error::RemoteError;
use crate::profile::PlayerRecord;
use crate::storage::{self, LocalStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

/// Default number of delivery attempts before an update is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default period of the background flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The whole leaderboard as served by `GET /api/leaderboard`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardData {
    /// ISO-8601 time of the last accepted update.
    pub last_updated: String,
    pub players: Vec<PlayerRecord>,
}

/// Body of `POST /api/leaderboard`.
#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    player: &'a PlayerRecord,
}

/// Sort orders offered by the leaderboard listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankBy {
    #[default]
    Elo,
    Wins,
    GamesPlayed,
}

impl std::str::FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elo" | "rating" => Ok(RankBy::Elo),
            "wins" => Ok(RankBy::Wins),
            "games" | "gamesplayed" => Ok(RankBy::GamesPlayed),
            other => Err(format!("unknown sort key '{}' (expected elo, wins or games)", other)),
        }
    }
}

/// Players in descending order of `key`.
pub fn ranked(players: &[PlayerRecord], key: RankBy) -> Vec<PlayerRecord> {
    let mut sorted = players.to_vec();
    match key {
        RankBy::Elo => sorted.sort_by(|a, b| b.elo.cmp(&a.elo)),
        RankBy::Wins => sorted.sort_by(|a, b| b.wins.cmp(&a.wins)),
        RankBy::GamesPlayed => sorted.sort_by(|a, b| b.games_played.cmp(&a.games_played)),
    }
    sorted
}

// ---------------------------------------------------------------------------
// Remote store
// ---------------------------------------------------------------------------

/// Remote leaderboard.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Upserts `player` by id. Any non-success answer is an error.
    async fn submit(&self, player: &PlayerRecord) -> Result<(), RemoteError>;

    async fn fetch(&self) -> Result<LeaderboardData, RemoteError>;
}

/// [`LeaderboardStore`] speaking the JSON contract over HTTP.
pub struct HttpLeaderboardStore {
    client: reqwest::Client,
    url: String,
}

impl HttpLeaderboardStore {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("checkrank/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LeaderboardStore for HttpLeaderboardStore {
    async fn submit(&self, player: &PlayerRecord) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SubmitBody { player })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<LeaderboardData, RemoteError> {
        let data = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(data)
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// A snapshot waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub id: Uuid,
    pub player: PlayerRecord,
    pub attempts: u32,
    /// Unix milliseconds at enqueue time.
    pub created_at: u64,
    /// Tie-break for updates created within the same millisecond.
    pub sequence: u64,
}

/// Result of a single drain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing to send.
    Idle,
    /// Another drain is in flight.
    Busy,
    Delivered(Uuid),
    /// Delivery failed; the update stays queued.
    Failed(Uuid),
    /// The update ran out of attempts and was dropped.
    Abandoned(Uuid),
}

/// Counts of one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub delivered: usize,
    pub abandoned: usize,
    /// Updates still queued after the cycle.
    pub pending: usize,
}

pub struct LeaderboardSync {
    store: LocalStore,
    remote: Arc<dyn LeaderboardStore>,
    queue: Mutex<Vec<PendingUpdate>>,
    draining: AtomicBool,
    next_sequence: AtomicU64,
    max_attempts: u32,
}

/// Clears the drain flag even if the drain future is dropped mid-flight.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LeaderboardSync {
    /// Creates the synchronizer, restoring any updates left in `store`.
    pub fn new(store: LocalStore, remote: Arc<dyn LeaderboardStore>, max_attempts: u32) -> Self {
        let queue: Vec<PendingUpdate> = store.load_json_or_default(storage::KEY_PENDING_UPDATES);
        let next_sequence = queue.iter().map(|u| u.sequence + 1).max().unwrap_or(0);
        if !queue.is_empty() {
            log::info!("Restored {} pending leaderboard update(s)", queue.len());
        }
        Self {
            store,
            remote,
            queue: Mutex::new(queue),
            draining: AtomicBool::new(false),
            next_sequence: AtomicU64::new(next_sequence),
            max_attempts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingUpdate>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, queue: &[PendingUpdate]) {
        if let Err(e) = self.store.save_json(storage::KEY_PENDING_UPDATES, queue) {
            log::warn!("Failed to persist leaderboard outbox: {}", e);
        }
    }

    pub fn remote(&self) -> &Arc<dyn LeaderboardStore> {
        &self.remote
    }

    /// Number of queued updates.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Copy of the queued updates.
    pub fn pending_updates(&self) -> Vec<PendingUpdate> {
        self.lock().clone()
    }

    /// Queues a snapshot for delivery and persists the outbox.
    pub fn enqueue(&self, player: PlayerRecord) -> Uuid {
        let update = PendingUpdate {
            id: Uuid::new_v4(),
            player,
            attempts: 0,
            created_at: storage::unix_millis(),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };
        let id = update.id;
        let mut queue = self.lock();
        queue.push(update);
        self.persist(&queue);
        log::debug!("Queued leaderboard update {} ({} pending)", id, queue.len());
        id
    }

    /// Tries to deliver the oldest pending update.
    pub async fn drain_one(&self) -> DrainOutcome {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return DrainOutcome::Busy;
        }
        let _guard = DrainGuard(&self.draining);

        let update = {
            let mut queue = self.lock();
            let Some(idx) = queue
                .iter()
                .enumerate()
                .min_by_key(|(_, u)| (u.created_at, u.sequence))
                .map(|(i, _)| i)
            else {
                return DrainOutcome::Idle;
            };

            if queue[idx].attempts >= self.max_attempts {
                let dropped = queue.remove(idx);
                self.persist(&queue);
                log::warn!(
                    "Abandoning leaderboard update {} after {} attempts",
                    dropped.id,
                    dropped.attempts
                );
                return DrainOutcome::Abandoned(dropped.id);
            }

            queue[idx].attempts += 1;
            self.persist(&queue);
            queue[idx].clone()
        };

        match self.remote.submit(&update.player).await {
            Ok(()) => {
                let mut queue = self.lock();
                queue.retain(|u| u.id != update.id);
                self.persist(&queue);
                log::info!("Delivered leaderboard update {}", update.id);
                DrainOutcome::Delivered(update.id)
            }
            Err(e) => {
                log::warn!(
                    "Leaderboard update {} failed (attempt {}/{}): {}",
                    update.id,
                    update.attempts,
                    self.max_attempts,
                    e
                );
                DrainOutcome::Failed(update.id)
            }
        }
    }

    /// Drains until the queue is empty, a delivery fails, or another drain
    /// is running.
    pub async fn flush(&self) -> FlushSummary {
        let mut summary = FlushSummary::default();
        loop {
            match self.drain_one().await {
                DrainOutcome::Delivered(_) => summary.delivered += 1,
                DrainOutcome::Abandoned(_) => summary.abandoned += 1,
                DrainOutcome::Idle | DrainOutcome::Busy | DrainOutcome::Failed(_) => break,
            }
        }
        summary.pending = self.pending();
        summary
    }
}

/// Runs [`LeaderboardSync::flush`] every `interval` until the handle is aborted.
pub fn spawn_background_flush(
    sync: Arc<LeaderboardSync>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; the context flushes at
        // startup on its own.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let summary = sync.flush().await;
            if summary.delivered > 0 || summary.abandoned > 0 {
                log::debug!("Background flush: {:?}", summary);
            }
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// In-memory store that upserts by id and can be told to fail.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        pub players: Mutex<HashMap<String, PlayerRecord>>,
        pub calls: AtomicUsize,
        pub failing: AtomicBool,
        pub gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl LeaderboardStore for FakeStore {
        async fn submit(&self, player: &PlayerRecord) -> Result<(), RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(RemoteError::Unreachable("offline".into()));
            }
            self.players
                .lock()
                .unwrap()
                .insert(player.id.clone(), player.clone());
            Ok(())
        }

        async fn fetch(&self) -> Result<LeaderboardData, RemoteError> {
            Ok(LeaderboardData {
                last_updated: String::new(),
                players: self.players.lock().unwrap().values().cloned().collect(),
            })
        }
    }

    fn record(id: &str, elo: i32) -> PlayerRecord {
        PlayerRecord {
            id: id.to_string(),
            username: format!("player-{}", id),
            elo,
            wins: 0,
            losses: 0,
            draws: 0,
            games_played: 0,
            last_played: None,
        }
    }

    fn temp_store() -> (LocalStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("checkrank_test_{}", Uuid::new_v4()));
        (LocalStore::open(&dir).unwrap(), dir)
    }

    #[tokio::test]
    async fn test_enqueue_and_flush() {
        let (store, dir) = temp_store();
        let remote = Arc::new(FakeStore::default());
        let sync = LeaderboardSync::new(store.clone(), remote.clone(), DEFAULT_MAX_ATTEMPTS);

        sync.enqueue(record("a", 808));
        sync.enqueue(record("b", 792));
        assert_eq!(sync.pending(), 2);

        let summary = sync.flush().await;
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.pending, 0);
        assert_eq!(remote.players.lock().unwrap().len(), 2);
        assert_eq!(sync.drain_one().await, DrainOutcome::Idle);

        let persisted: Vec<PendingUpdate> = store.load_json(storage::KEY_PENDING_UPDATES).unwrap().unwrap();
        assert!(persisted.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let (store, dir) = temp_store();
        let remote = Arc::new(FakeStore::default());
        let sync = LeaderboardSync::new(store, remote.clone(), DEFAULT_MAX_ATTEMPTS);

        sync.enqueue(record("a", 808));
        sync.enqueue(record("a", 808));
        sync.enqueue(record("a", 816));
        sync.flush().await;

        let players = remote.players.lock().unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players["a"].elo, 816);
        drop(players);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_abandoned_after_max_attempts() {
        let (store, dir) = temp_store();
        let remote = Arc::new(FakeStore::default());
        remote.failing.store(true, Ordering::SeqCst);
        let sync = LeaderboardSync::new(store, remote.clone(), 5);

        let id = sync.enqueue(record("a", 808));
        for attempt in 1..=5 {
            assert_eq!(sync.drain_one().await, DrainOutcome::Failed(id));
            assert_eq!(sync.pending_updates()[0].attempts, attempt);
        }
        assert_eq!(sync.drain_one().await, DrainOutcome::Abandoned(id));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 5);
        assert_eq!(sync.pending(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_flush_stops_at_first_failure() {
        let (store, dir) = temp_store();
        let remote = Arc::new(FakeStore::default());
        remote.failing.store(true, Ordering::SeqCst);
        let sync = LeaderboardSync::new(store, remote.clone(), 5);

        sync.enqueue(record("a", 808));
        sync.enqueue(record("b", 808));
        let summary = sync.flush().await;
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.pending, 2);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

        remote.failing.store(false, Ordering::SeqCst);
        assert_eq!(sync.flush().await.delivered, 2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_oldest_first_and_restore() {
        let (store, dir) = temp_store();
        let remote = Arc::new(FakeStore::default());
        remote.failing.store(true, Ordering::SeqCst);
        {
            let sync = LeaderboardSync::new(store.clone(), remote.clone(), 5);
            sync.enqueue(record("first", 800));
            sync.enqueue(record("second", 800));
            sync.drain_one().await;
        }

        // A new process picks the outbox up where the last one stopped.
        let sync = LeaderboardSync::new(store, remote.clone(), 5);
        let pending = sync.pending_updates();
        assert_eq!(pending.len(), 2);
        let first = pending.iter().find(|u| u.player.id == "first").unwrap();
        assert_eq!(first.attempts, 1);

        let third = sync.enqueue(record("third", 800));
        let seq = sync
            .pending_updates()
            .iter()
            .find(|u| u.id == third)
            .map(|u| u.sequence)
            .unwrap();
        assert!(pending.iter().all(|u| u.sequence < seq));

        remote.failing.store(false, Ordering::SeqCst);
        match sync.drain_one().await {
            DrainOutcome::Delivered(id) => assert_eq!(id, first.id),
            other => panic!("unexpected {:?}", other),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_overlapping_drain_is_busy() {
        let (store, dir) = temp_store();
        let gate = Arc::new(Notify::new());
        let remote = Arc::new(FakeStore {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let sync = Arc::new(LeaderboardSync::new(store, remote.clone(), 5));
        let id = sync.enqueue(record("a", 808));

        let background = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.drain_one().await })
        };
        while remote.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sync.drain_one().await, DrainOutcome::Busy);

        gate.notify_one();
        assert_eq!(background.await.unwrap(), DrainOutcome::Delivered(id));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_ranked() {
        let mut a = record("a", 900);
        a.wins = 1;
        let mut b = record("b", 1200);
        b.games_played = 7;
        let players = vec![a, b];
        assert_eq!(ranked(&players, RankBy::Elo)[0].id, "b");
        assert_eq!(ranked(&players, RankBy::Wins)[0].id, "a");
        assert_eq!(ranked(&players, RankBy::GamesPlayed)[0].id, "b");
    }
}
