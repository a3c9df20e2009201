// src/extract/mod.rs
//! Gap extraction orchestrator.
//!
//! Fail-soft by contract: whatever goes wrong downstream (provider error,
//! unparsable reply) the caller gets an empty list and a warning in the log.

pub mod llm;
pub mod prompt;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::extract::llm::{ExtractedCard, GapExtractor};
use crate::relevance;
use crate::sources::merge_papers_first;
use crate::sources::types::SourceRecord;
use crate::store::models::{NOVELTY_MAX, NOVELTY_MIN};
use crate::store::{FeedbackStats, GapRecord, Priority, Status};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("extract_calls_total", "Extractor invocations.");
        describe_counter!("extract_failures_total", "Extractor calls that failed and yielded no gaps.");
        describe_counter!(
            "extract_uncited_dropped_total",
            "Extracted gaps dropped because their citation matched no supplied source."
        );
    });
}

fn to_record(card: ExtractedCard, domain: &str) -> GapRecord {
    let novelty = if card.novelty_score.is_finite() {
        card.novelty_score.clamp(NOVELTY_MIN, NOVELTY_MAX)
    } else {
        NOVELTY_MIN
    };
    GapRecord {
        id: None,
        gap: card.gap,
        context: card.context,
        source_citation: card.source_citation,
        source_url: card.source_url,
        proposed_solution: card.proposed_solution,
        novelty_score: novelty,
        domain: domain.to_string(),
        is_manual: false,
        status: Status::Todo,
        priority: Priority::Medium,
        tags: Default::default(),
        assignee: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

/// Keep only cards whose citation is exactly a supplied title; fill a missing
/// URL from the cited record.
pub fn ground_cards(cards: Vec<ExtractedCard>, sources: &[SourceRecord], domain: &str) -> Vec<GapRecord> {
    let mut out = Vec::with_capacity(cards.len());
    let mut dropped = 0usize;
    for card in cards {
        let Some(cited) = sources.iter().find(|s| s.title() == card.source_citation) else {
            dropped += 1;
            continue;
        };
        let mut rec = to_record(card, domain);
        if rec.source_url.trim().is_empty() {
            rec.source_url = cited.url().unwrap_or_default().to_string();
        }
        out.push(rec);
    }
    if dropped > 0 {
        counter!("extract_uncited_dropped_total").increment(dropped as u64);
        warn!(target: "extract", domain, dropped, "dropped gaps citing unknown sources");
    }
    out
}

/// `extract_gaps(sources, domain, feedback)`.
///
/// Papers are ordered first and the relevance filter runs before the
/// extractor sees anything. An empty source list never reaches the extractor.
pub async fn extract_gaps(
    extractor: &dyn GapExtractor,
    sources: Vec<SourceRecord>,
    domain: &str,
    feedback: &FeedbackStats,
) -> Vec<GapRecord> {
    ensure_metrics_described();
    if sources.is_empty() {
        return Vec::new();
    }
    let sources = relevance::filter(domain, merge_papers_first(vec![sources]));

    counter!("extract_calls_total").increment(1);
    match extractor.extract(domain, &sources, feedback).await {
        Ok(cards) => {
            let returned = cards.len();
            let gaps = ground_cards(cards, &sources, domain);
            info!(
                target: "extract",
                domain,
                extractor = extractor.name(),
                sources = sources.len(),
                returned,
                kept = gaps.len(),
                "gap extraction finished"
            );
            gaps
        }
        Err(e) => {
            counter!("extract_failures_total").increment(1);
            warn!(target: "extract", error = ?e, domain, extractor = extractor.name(), "gap extraction failed");
            Vec::new()
        }
    }
}

/// One ungrounded card for `sub_topic`, or `None` if the extractor produced nothing.
pub async fn generate_single_card(extractor: &dyn GapExtractor, domain: &str, sub_topic: &str) -> Option<GapRecord> {
    ensure_metrics_described();
    counter!("extract_calls_total").increment(1);
    match extractor.generate(domain, sub_topic).await {
        Ok(cards) => cards.into_iter().next().map(|c| to_record(c, domain)),
        Err(e) => {
            counter!("extract_failures_total").increment(1);
            warn!(target: "extract", error = ?e, domain, sub_topic, "single card generation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::ExtractionConfig;
    use crate::extract::llm::{DisabledProvider, LlmExtractor, MockProvider};
    use crate::sources::types::{ForumPost, Paper};

    fn paper(title: &str, url: &str) -> SourceRecord {
        SourceRecord::Paper(Paper {
            id: title.into(),
            title: title.into(),
            summary: "heart rhythm".into(),
            authors: vec![],
            published: String::new(),
            url: Some(url.into()),
            categories: vec![],
        })
    }

    fn post(title: &str) -> SourceRecord {
        SourceRecord::Forum(ForumPost {
            id: title.into(),
            title: title.into(),
            text: "heart".into(),
            url: None,
            score: 1,
            subreddit: String::new(),
            created_utc: 0.0,
        })
    }

    fn extractor(reply: &str) -> LlmExtractor {
        LlmExtractor::new(Arc::new(MockProvider::canned(reply)), &ExtractionConfig::default())
    }

    /// Counts calls; used to prove the empty-input short circuit.
    struct Counting(AtomicUsize);

    #[async_trait::async_trait]
    impl GapExtractor for Counting {
        async fn extract(
            &self,
            _domain: &str,
            _sources: &[SourceRecord],
            _feedback: &FeedbackStats,
        ) -> anyhow::Result<Vec<ExtractedCard>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
        async fn generate(&self, _d: &str, _s: &str) -> anyhow::Result<Vec<ExtractedCard>> {
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn empty_sources_never_call_the_extractor() {
        let ex = Counting(AtomicUsize::new(0));
        let out = extract_gaps(&ex, Vec::new(), "heart", &FeedbackStats::default()).await;
        assert!(out.is_empty());
        assert_eq!(ex.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_yields_empty() {
        let ex = LlmExtractor::new(Arc::new(DisabledProvider), &ExtractionConfig::default());
        let out = extract_gaps(&ex, vec![paper("P", "u")], "heart", &FeedbackStats::default()).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_yields_empty() {
        let ex = extractor("sorry, no JSON today");
        let out = extract_gaps(&ex, vec![paper("P", "u")], "heart", &FeedbackStats::default()).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn post_processing_grounds_and_normalizes() {
        let reply = r#"{"cards": [
            {"gap": "a", "context": "c", "source_citation": "Heart paper", "source_url": "", "proposed_solution": "p", "novelty_score": 14},
            {"gap": "b", "context": "c", "source_citation": "Made up title", "source_url": "x", "proposed_solution": "p", "novelty_score": 5},
            {"gap": "c", "context": "c", "source_citation": "Heart thread", "source_url": "keep-me", "proposed_solution": "p", "novelty_score": 0.2}
        ]}"#;
        let out = extract_gaps(
            &extractor(reply),
            vec![post("Heart thread"), paper("Heart paper", "https://arxiv.org/abs/1")],
            "heart",
            &FeedbackStats::default(),
        )
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].gap, "a");
        assert_eq!(out[0].source_url, "https://arxiv.org/abs/1");
        assert_eq!(out[0].novelty_score, 10.0);
        assert_eq!(out[1].source_url, "keep-me");
        assert_eq!(out[1].novelty_score, 1.0);
        for g in &out {
            assert_eq!(g.domain, "heart");
            assert!(!g.is_manual);
            assert_eq!(g.status, Status::Todo);
            assert_eq!(g.priority, Priority::Medium);
        }
    }

    #[tokio::test]
    async fn zero_gaps_is_a_valid_answer() {
        let out = extract_gaps(
            &extractor(r#"{"cards": []}"#),
            vec![paper("P", "u")],
            "heart",
            &FeedbackStats::default(),
        )
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn single_card_takes_first_and_skips_grounding() {
        let reply = r#"{"cards": [{"gap": "first", "source_citation": "anything"}, {"gap": "second"}]}"#;
        let card = generate_single_card(&extractor(reply), "robotics", "grasping").await.unwrap();
        assert_eq!(card.gap, "first");
        assert_eq!(card.domain, "robotics");

        assert!(generate_single_card(&extractor(r#"{"cards": []}"#), "r", "s").await.is_none());
    }
}
