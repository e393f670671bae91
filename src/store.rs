//! Durable raw-score storage
//!
//! One record per (participation, round). Writes are upserts: a re-submission
//! replaces the previous record and bumps its version. Callers that read a
//! version first can pass it back as `expected_version` to reject writes that
//! raced with another judge.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::{Result, ScoringError};
use crate::round::RoundId;
use crate::schema::{ParticipationId, RawScore};

type ScoreKey = (ParticipationId, RoundId);

/// Persistence seam for raw scores
pub trait ScoreStore: Send + Sync {
    /// Insert or replace; returns the stored record with its new version
    fn upsert(&self, score: RawScore, expected_version: Option<u64>) -> BoxFuture<'_, Result<RawScore>>;

    fn get(&self, participation_id: ParticipationId, round: RoundId) -> BoxFuture<'_, Result<Option<RawScore>>>;

    /// Delete a record, returning it if it existed
    fn remove(&self, participation_id: ParticipationId, round: RoundId) -> BoxFuture<'_, Result<Option<RawScore>>>;

    /// Every stored round for the given participations
    fn scores_for(&self, participation_ids: Vec<ParticipationId>) -> BoxFuture<'_, Result<Vec<RawScore>>>;
}

/// Version bookkeeping shared by the store implementations
#[derive(Debug, Clone, Default)]
struct ScoreTable {
    scores: BTreeMap<ScoreKey, RawScore>,
}

impl ScoreTable {
    fn from_records(records: Vec<RawScore>) -> Self {
        let scores = records
            .into_iter()
            .map(|r| ((r.participation_id, r.round), r))
            .collect();
        Self { scores }
    }

    fn upsert(&mut self, mut score: RawScore, expected_version: Option<u64>) -> Result<RawScore> {
        let key = (score.participation_id, score.round);
        let actual = self.scores.get(&key).map(|s| s.version).unwrap_or(0);
        if let Some(expected) = expected_version {
            if expected != actual {
                return Err(ScoringError::StaleVersion { expected, actual });
            }
        }
        score.version = actual + 1;
        self.scores.insert(key, score.clone());
        Ok(score)
    }

    fn get(&self, key: &ScoreKey) -> Option<RawScore> {
        self.scores.get(key).cloned()
    }

    fn remove(&mut self, key: &ScoreKey) -> Option<RawScore> {
        self.scores.remove(key)
    }

    fn scores_for(&self, participation_ids: &[ParticipationId]) -> Vec<RawScore> {
        self.scores
            .values()
            .filter(|s| participation_ids.contains(&s.participation_id))
            .cloned()
            .collect()
    }

    fn records(&self) -> Vec<&RawScore> {
        self.scores.values().collect()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryScoreStore {
    table: RwLock<ScoreTable>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScoreStore for MemoryScoreStore {
    fn upsert(&self, score: RawScore, expected_version: Option<u64>) -> BoxFuture<'_, Result<RawScore>> {
        let result = self.table.write().upsert(score, expected_version);
        async move { result }.boxed()
    }

    fn get(&self, participation_id: ParticipationId, round: RoundId) -> BoxFuture<'_, Result<Option<RawScore>>> {
        let found = self.table.read().get(&(participation_id, round));
        async move { Ok(found) }.boxed()
    }

    fn remove(&self, participation_id: ParticipationId, round: RoundId) -> BoxFuture<'_, Result<Option<RawScore>>> {
        let removed = self.table.write().remove(&(participation_id, round));
        async move { Ok(removed) }.boxed()
    }

    fn scores_for(&self, participation_ids: Vec<ParticipationId>) -> BoxFuture<'_, Result<Vec<RawScore>>> {
        let scores = self.table.read().scores_for(&participation_ids);
        async move { Ok(scores) }.boxed()
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Store backed by a single JSON file, rewritten atomically on every change
pub struct FileScoreStore {
    path: PathBuf,
    table: Mutex<ScoreTable>,
}

impl FileScoreStore {
    /// Open (or create on first write) the score file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                ScoreTable::default()
            } else {
                let records: Vec<RawScore> = serde_json::from_str(&content)?;
                ScoreTable::from_records(records)
            }
        } else {
            ScoreTable::default()
        };
        tracing::info!(path = %path.display(), records = table.scores.len(), "Opened score store");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &ScoreTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&table.records())?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `change` to a copy of the table, persist it, then commit
    async fn write_with<T>(&self, change: impl FnOnce(&mut ScoreTable) -> Result<T>) -> Result<T> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *table = next;
        Ok(out)
    }
}

impl ScoreStore for FileScoreStore {
    fn upsert(&self, score: RawScore, expected_version: Option<u64>) -> BoxFuture<'_, Result<RawScore>> {
        async move { self.write_with(|t| t.upsert(score, expected_version)).await }.boxed()
    }

    fn get(&self, participation_id: ParticipationId, round: RoundId) -> BoxFuture<'_, Result<Option<RawScore>>> {
        async move { Ok(self.table.lock().await.get(&(participation_id, round))) }.boxed()
    }

    fn remove(&self, participation_id: ParticipationId, round: RoundId) -> BoxFuture<'_, Result<Option<RawScore>>> {
        async move {
            let key = (participation_id, round);
            if self.table.lock().await.get(&key).is_none() {
                return Ok(None);
            }
            self.write_with(|t| Ok(t.remove(&key))).await
        }
        .boxed()
    }

    fn scores_for(&self, participation_ids: Vec<ParticipationId>) -> BoxFuture<'_, Result<Vec<RawScore>>> {
        async move { Ok(self.table.lock().await.scores_for(&participation_ids)) }.boxed()
    }
}
