// src/store/mod.rs
//! Backlog store: gap cards with issue-tracking metadata, plus the append-only
//! feedback, search-history and pulse-snapshot logs.

pub mod memory;
pub mod models;
pub mod noop;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::describe_counter;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::config::{StoreConfig, StoreMode};
use crate::pulse::PulseSnapshot;
pub use crate::store::memory::MemoryStore;
pub use crate::store::models::{
    BacklogStats, CardDraft, CardFilter, CardPatch, FeedbackAction, FeedbackEntry, FeedbackRequest,
    FeedbackStats, GapRecord, Priority, SearchRecord, Status,
};
pub use crate::store::noop::NoopStore;

/// Caller-visible store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid value for `{field}`: {value:?}")]
    Validation { field: &'static str, value: String },
    #[error("card not found: {id}")]
    NotFound { id: String },
    #[error("store error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn validation(field: &'static str, value: impl ToString) -> Self {
        StoreError::Validation {
            field,
            value: value.to_string(),
        }
    }

    pub fn not_found(id: &str) -> Self {
        StoreError::NotFound { id: id.to_string() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("store_writes_total", "Store mutations by collection.");
        describe_counter!(
            "store_persist_errors_total",
            "Snapshot writes that failed (the mutation itself still succeeded)."
        );
    });
}

#[async_trait]
pub trait BacklogStore: Send + Sync {
    /// Persist a card and return its id; `None` when nothing is stored.
    async fn save_card(&self, card: GapRecord) -> StoreResult<Option<String>>;
    /// Newest first.
    async fn list_cards(&self, limit: usize) -> StoreResult<Vec<GapRecord>>;
    /// Newest first.
    async fn cards_by_domain(&self, domain: &str) -> StoreResult<Vec<GapRecord>>;
    async fn card_by_id(&self, id: &str) -> StoreResult<GapRecord>;
    /// Validates the patch before touching storage; only an existing id is written.
    async fn update_card(&self, id: &str, patch: CardPatch) -> StoreResult<GapRecord>;
    async fn delete_card(&self, id: &str) -> StoreResult<()>;
    async fn backlog_stats(&self) -> StoreResult<BacklogStats>;
    /// Newest first.
    async fn filtered_cards(&self, filter: &CardFilter) -> StoreResult<Vec<GapRecord>>;

    async fn save_feedback(&self, entry: FeedbackEntry) -> StoreResult<Option<String>>;
    async fn feedback_stats(&self, domain: &str) -> StoreResult<FeedbackStats>;

    async fn save_search(&self, domain: &str, result_count: usize) -> StoreResult<()>;
    /// Most recent first.
    async fn search_history(&self, limit: usize) -> StoreResult<Vec<SearchRecord>>;

    async fn save_pulse(&self, snapshot: PulseSnapshot) -> StoreResult<Option<String>>;

    fn mode(&self) -> &'static str;
}

pub type SharedStore = Arc<dyn BacklogStore>;

/// Open the configured store. A snapshot that cannot be read or parsed
/// degrades to [`NoopStore`] rather than aborting startup.
pub fn connect(cfg: &StoreConfig) -> SharedStore {
    ensure_metrics_described();
    match cfg.mode {
        StoreMode::Memory => Arc::new(MemoryStore::new()),
        StoreMode::Disabled => Arc::new(NoopStore),
        StoreMode::File => match MemoryStore::open(&cfg.path) {
            Ok(store) => {
                tracing::info!(target: "store", path = %cfg.path.display(), "backlog snapshot opened");
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!(
                    target: "store",
                    error = ?e,
                    path = %cfg.path.display(),
                    "backlog store unavailable; running without persistence"
                );
                Arc::new(NoopStore)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn connect_picks_mode() {
        let mem = connect(&StoreConfig::default());
        assert_eq!(mem.mode(), "memory");

        let off = connect(&StoreConfig {
            mode: StoreMode::Disabled,
            path: PathBuf::new(),
        });
        assert_eq!(off.mode(), "noop");
    }

    #[test]
    fn corrupt_snapshot_degrades_to_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backlog.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = connect(&StoreConfig {
            mode: StoreMode::File,
            path,
        });
        assert_eq!(store.mode(), "noop");
    }

    #[test]
    fn missing_snapshot_starts_empty_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = connect(&StoreConfig {
            mode: StoreMode::File,
            path: dir.path().join("fresh.json"),
        });
        assert_eq!(store.mode(), "file");
    }

    #[test]
    fn validation_message_names_field() {
        let e = StoreError::validation("status", "NOT_A_STATUS");
        assert_eq!(e.to_string(), "invalid value for `status`: \"NOT_A_STATUS\"");
    }
}
