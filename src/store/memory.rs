// src/store/memory.rs
//! In-process backlog store with optional JSON snapshot persistence.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pulse::PulseSnapshot;
use crate::store::models::{
    BacklogStats, CardFilter, CardPatch, FeedbackEntry, FeedbackStats, GapRecord, SearchRecord,
};
use crate::store::{BacklogStore, StoreError, StoreResult};

/// Entries kept per search-history and pulse log.
pub const LOG_RETENTION: usize = 1_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    cards: Vec<GapRecord>,
    #[serde(default)]
    feedback: Vec<FeedbackEntry>,
    #[serde(default)]
    searches: Vec<SearchRecord>,
    #[serde(default)]
    pulses: Vec<PulseSnapshot>,
}

/// Collections are kept in insertion order; reads that promise
/// newest-first iterate in reverse.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
    snapshot: Option<PathBuf>,
    // serializes snapshot writers so two tmp files never race on rename
    persist_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// File-backed store. A missing file starts empty; an unreadable or
    /// unparsable one is an error.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let collections = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading backlog snapshot {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing backlog snapshot {}", path.display()))?
        } else {
            Collections::default()
        };
        Ok(Self {
            inner: RwLock::new(collections),
            snapshot: Some(path.to_path_buf()),
            persist_lock: Mutex::new(()),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Collections> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Collections> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort snapshot after a mutation; failures are logged only.
    fn persist(&self, collection: &'static str) {
        counter!("store_writes_total", "collection" => collection).increment(1);
        let Some(path) = &self.snapshot else {
            return;
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let json = {
            let data = self.read();
            serde_json::to_vec(&*data)
        };
        let res = json
            .map_err(anyhow::Error::from)
            .and_then(|bytes| write_atomic(path, &bytes));
        if let Err(e) = res {
            counter!("store_persist_errors_total").increment(1);
            tracing::warn!(target: "store", error = ?e, path = %path.display(), "snapshot write failed");
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Drop the oldest entries of an append-only log beyond `LOG_RETENTION`.
fn trim_oldest<T>(log: &mut Vec<T>) {
    if log.len() > LOG_RETENTION {
        let excess = log.len() - LOG_RETENTION;
        log.drain(0..excess);
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl BacklogStore for MemoryStore {
    async fn save_card(&self, mut card: GapRecord) -> StoreResult<Option<String>> {
        let id = new_id();
        card.id = Some(id.clone());
        self.write().cards.push(card);
        self.persist("cards");
        Ok(Some(id))
    }

    async fn list_cards(&self, limit: usize) -> StoreResult<Vec<GapRecord>> {
        Ok(self.read().cards.iter().rev().take(limit).cloned().collect())
    }

    async fn cards_by_domain(&self, domain: &str) -> StoreResult<Vec<GapRecord>> {
        Ok(self
            .read()
            .cards
            .iter()
            .rev()
            .filter(|c| c.domain == domain)
            .cloned()
            .collect())
    }

    async fn card_by_id(&self, id: &str) -> StoreResult<GapRecord> {
        self.read()
            .cards
            .iter()
            .find(|c| c.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn update_card(&self, id: &str, patch: CardPatch) -> StoreResult<GapRecord> {
        let patch = patch.validate()?;
        let updated = {
            let mut data = self.write();
            let card = data
                .cards
                .iter_mut()
                .find(|c| c.id.as_deref() == Some(id))
                .ok_or_else(|| StoreError::not_found(id))?;
            if patch.is_empty() {
                // nothing to change: no timestamp bump, no snapshot write
                return Ok(card.clone());
            }
            patch.apply_to(card);
            card.clone()
        };
        self.persist("cards");
        Ok(updated)
    }

    async fn delete_card(&self, id: &str) -> StoreResult<()> {
        {
            let mut data = self.write();
            let before = data.cards.len();
            data.cards.retain(|c| c.id.as_deref() != Some(id));
            if data.cards.len() == before {
                return Err(StoreError::not_found(id));
            }
        }
        self.persist("cards");
        Ok(())
    }

    async fn backlog_stats(&self) -> StoreResult<BacklogStats> {
        Ok(BacklogStats::from_cards(self.read().cards.iter()))
    }

    async fn filtered_cards(&self, filter: &CardFilter) -> StoreResult<Vec<GapRecord>> {
        Ok(self
            .read()
            .cards
            .iter()
            .rev()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn save_feedback(&self, mut entry: FeedbackEntry) -> StoreResult<Option<String>> {
        let id = new_id();
        entry.id = Some(id.clone());
        self.write().feedback.push(entry);
        self.persist("feedback");
        Ok(Some(id))
    }

    async fn feedback_stats(&self, domain: &str) -> StoreResult<FeedbackStats> {
        Ok(FeedbackStats::from_entries(domain, self.read().feedback.iter()))
    }

    async fn save_search(&self, domain: &str, result_count: usize) -> StoreResult<()> {
        {
            let mut data = self.write();
            data.searches.push(SearchRecord {
                domain: domain.to_string(),
                timestamp: Utc::now(),
                result_count,
            });
            trim_oldest(&mut data.searches);
        }
        self.persist("searches");
        Ok(())
    }

    async fn search_history(&self, limit: usize) -> StoreResult<Vec<SearchRecord>> {
        Ok(self.read().searches.iter().rev().take(limit).cloned().collect())
    }

    async fn save_pulse(&self, mut snapshot: PulseSnapshot) -> StoreResult<Option<String>> {
        let id = new_id();
        snapshot.id = Some(id.clone());
        {
            let mut data = self.write();
            data.pulses.push(snapshot);
            trim_oldest(&mut data.pulses);
        }
        self.persist("pulses");
        Ok(Some(id))
    }

    fn mode(&self) -> &'static str {
        if self.snapshot.is_some() {
            "file"
        } else {
            "memory"
        }
    }
}
