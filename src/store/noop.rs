// src/store/noop.rs
//! Degraded mode: nothing is stored, reads are empty.

use async_trait::async_trait;

use crate::pulse::PulseSnapshot;
use crate::store::models::{
    BacklogStats, CardFilter, CardPatch, FeedbackEntry, FeedbackStats, GapRecord, SearchRecord,
};
use crate::store::{BacklogStore, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl BacklogStore for NoopStore {
    async fn save_card(&self, _card: GapRecord) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn list_cards(&self, _limit: usize) -> StoreResult<Vec<GapRecord>> {
        Ok(Vec::new())
    }

    async fn cards_by_domain(&self, _domain: &str) -> StoreResult<Vec<GapRecord>> {
        Ok(Vec::new())
    }

    async fn card_by_id(&self, id: &str) -> StoreResult<GapRecord> {
        Err(StoreError::not_found(id))
    }

    async fn update_card(&self, id: &str, patch: CardPatch) -> StoreResult<GapRecord> {
        patch.validate()?;
        Err(StoreError::not_found(id))
    }

    async fn delete_card(&self, id: &str) -> StoreResult<()> {
        Err(StoreError::not_found(id))
    }

    async fn backlog_stats(&self) -> StoreResult<BacklogStats> {
        Ok(BacklogStats::default())
    }

    async fn filtered_cards(&self, _filter: &CardFilter) -> StoreResult<Vec<GapRecord>> {
        Ok(Vec::new())
    }

    async fn save_feedback(&self, _entry: FeedbackEntry) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn feedback_stats(&self, domain: &str) -> StoreResult<FeedbackStats> {
        Ok(FeedbackStats {
            domain: domain.to_string(),
            ..FeedbackStats::default()
        })
    }

    async fn save_search(&self, _domain: &str, _result_count: usize) -> StoreResult<()> {
        Ok(())
    }

    async fn search_history(&self, _limit: usize) -> StoreResult<Vec<SearchRecord>> {
        Ok(Vec::new())
    }

    async fn save_pulse(&self, _snapshot: PulseSnapshot) -> StoreResult<Option<String>> {
        Ok(None)
    }

    fn mode(&self) -> &'static str {
        "noop"
    }
}
