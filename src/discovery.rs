// src/discovery.rs
//! Request-level workflows: each method is one HTTP operation minus the
//! transport. Holds every injected dependency.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::{self, llm::SharedExtractor};
use crate::index::{self, SharedIndex};
use crate::normalize::Calibration;
use crate::pulse::{self, PulseSnapshot};
use crate::research::{self, ResearchMetrics, PAPER_SAMPLE};
use crate::sources::{fetch_or_empty, RawSources, SourceSet};
use crate::store::{GapRecord, SharedStore, StoreResult};

#[derive(Clone)]
pub struct Discovery {
    pub sources: SourceSet,
    pub calibration: Calibration,
    pub extractor: SharedExtractor,
    pub store: SharedStore,
    pub index: SharedIndex,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle {
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    pub metrics: ResearchMetrics,
    pub sentiment: PulseSnapshot,
    pub saved_cards: Vec<GapRecord>,
}

impl Discovery {
    /// Full gap pipeline: gather, filter, extract with feedback hints, then
    /// record the search and index the sources in the background.
    pub async fn gaps(&self, domain: &str, limit: usize) -> StoreResult<Vec<GapRecord>> {
        let gathered = self.sources.gather_for_gaps(domain, limit).await;
        if gathered.is_empty() {
            return Ok(Vec::new());
        }

        let feedback = self.store.feedback_stats(domain).await?;
        let gaps = extract::extract_gaps(self.extractor.as_ref(), gathered.clone(), domain, &feedback).await;

        index::spawn_upsert(self.index.clone(), gathered);
        self.store.save_search(domain, gaps.len()).await?;
        Ok(gaps)
    }

    pub async fn raw_sources(&self, domain: &str, limit: usize) -> RawSources {
        self.sources.gather_raw(domain, limit).await
    }

    pub async fn pulse(&self, domain: &str) -> PulseSnapshot {
        pulse::compute_pulse(&self.sources, &self.calibration, domain).await
    }

    /// Compute and persist a snapshot; the returned copy carries the stored id.
    pub async fn pulse_and_save(&self, domain: &str) -> StoreResult<PulseSnapshot> {
        let mut snapshot = self.pulse(domain).await;
        snapshot.id = self.store.save_pulse(snapshot.clone()).await?;
        Ok(snapshot)
    }

    pub async fn research_metrics(&self, domain: &str) -> ResearchMetrics {
        let (papers, pulse) = tokio::join!(
            fetch_or_empty(self.sources.papers.as_ref(), domain, PAPER_SAMPLE, self.sources.timeout),
            self.pulse(domain),
        );
        research::summarize(domain, papers, pulse)
    }

    pub async fn export(&self, domain: &str) -> StoreResult<ExportBundle> {
        let metrics = self.research_metrics(domain).await;
        let saved_cards = self.store.cards_by_domain(domain).await?;
        Ok(ExportBundle {
            domain: domain.to_string(),
            generated_at: Utc::now(),
            sentiment: metrics.sentiment.clone(),
            metrics,
            saved_cards,
        })
    }

    pub async fn generate_card(&self, domain: &str, sub_topic: &str) -> Option<GapRecord> {
        extract::generate_single_card(self.extractor.as_ref(), domain, sub_topic).await
    }
}
