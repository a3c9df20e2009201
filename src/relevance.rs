// src/relevance.rs
//! Relevance filter: keyword-overlap heuristic that prunes aggregated records
//! not plausibly related to the query domain.
//!
//! Crude and recall-biased:
//! - keywords are the domain's word tokens of length >= 3, lower-cased
//! - a record is kept if any keyword (or the whole domain) is a *substring*
//!   of its lower-cased `title + " " + body`, so "cell" matches "cellular"
//! - if nothing would survive, the unfiltered input is returned

use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::info;

use crate::sources::types::SourceRecord;

pub const MIN_KEYWORD_CHARS: usize = 3;

// \w covers [A-Za-z0-9_]; (?u) enables Unicode
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\w+").expect("word regex"));

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relevance_dropped_total", "Records removed by the relevance filter.");
        describe_counter!(
            "relevance_fallback_total",
            "Filter runs that would have removed everything and returned the input instead."
        );
    });
}

/// Short, non-reversible id for log lines (never log raw source text).
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Lower-cased word tokens of `domain` with at least three characters,
/// deduplicated in first-seen order.
pub fn domain_keywords(domain: &str) -> Vec<String> {
    let lower = domain.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for m in WORD_RE.find_iter(&lower) {
        let tok = m.as_str();
        if tok.chars().count() >= MIN_KEYWORD_CHARS && !out.iter().any(|k| k == tok) {
            out.push(tok.to_string());
        }
    }
    out
}

/// Compiled keyword set for one domain.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    domain: String,
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_lowercase(),
            keywords: domain_keywords(domain),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Substring test over already-combined text (any case).
    pub fn matches_text(&self, text: &str) -> bool {
        let combined = text.to_lowercase();
        self.keywords.iter().any(|k| combined.contains(k.as_str()))
            || combined.contains(self.domain.as_str())
    }

    pub fn is_relevant(&self, record: &SourceRecord) -> bool {
        self.matches_text(&format!("{} {}", record.title(), record.body()))
    }

    /// Apply the filter with the non-emptiness-preserving fallback.
    pub fn apply(&self, records: Vec<SourceRecord>) -> Vec<SourceRecord> {
        ensure_metrics_described();
        if self.keywords.is_empty() || records.is_empty() {
            return records;
        }

        let keep: Vec<bool> = records.iter().map(|r| self.is_relevant(r)).collect();
        let kept = keep.iter().filter(|k| **k).count();
        let dropped = records.len() - kept;

        if kept == 0 {
            counter!("relevance_fallback_total").increment(1);
            info!(
                target: "relevance",
                domain = %self.domain,
                total = records.len(),
                "filter removed every record; returning unfiltered input"
            );
            return records;
        }

        if dropped > 0 {
            counter!("relevance_dropped_total").increment(dropped as u64);
            let dropped_ids: Vec<String> = records
                .iter()
                .zip(&keep)
                .filter(|(_, k)| !**k)
                .take(5)
                .map(|(r, _)| anon_hash(&r.title()))
                .collect();
            info!(
                target: "relevance",
                domain = %self.domain,
                kept,
                dropped,
                dropped_ids = ?dropped_ids,
                "relevance filter applied"
            );
        }

        records
            .into_iter()
            .zip(keep)
            .filter_map(|(r, k)| k.then_some(r))
            .collect()
    }
}

/// `filter(domain, records)`: see the module docs.
pub fn filter(domain: &str, records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    KeywordFilter::new(domain).apply(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::{ForumPost, Paper};

    fn paper(title: &str, summary: &str) -> SourceRecord {
        SourceRecord::Paper(Paper {
            id: title.into(),
            title: title.into(),
            summary: summary.into(),
            authors: vec![],
            published: String::new(),
            url: None,
            categories: vec![],
        })
    }

    fn post(title: &str, text: &str) -> SourceRecord {
        SourceRecord::Forum(ForumPost {
            id: title.into(),
            title: title.into(),
            text: text.into(),
            url: None,
            score: 0,
            subreddit: String::new(),
            created_utc: 0.0,
        })
    }

    fn titles(v: &[SourceRecord]) -> Vec<String> {
        v.iter().map(|r| r.title()).collect()
    }

    #[test]
    fn keywords_split_on_non_word_and_drop_short_tokens() {
        assert_eq!(
            domain_keywords("AI in Heart-Attack prediction, v2"),
            vec!["heart", "attack", "prediction"]
        );
        assert_eq!(domain_keywords("go ml"), Vec::<String>::new());
        assert_eq!(domain_keywords("rust Rust RUST"), vec!["rust"]);
    }

    #[test]
    fn keyword_length_counts_characters_not_bytes() {
        // "ñu" is two chars (three bytes) and must be dropped.
        assert_eq!(domain_keywords("ñu añejo"), vec!["añejo"]);
    }

    #[test]
    fn heart_attack_paper_kept_ddos_post_dropped() {
        let input = vec![
            paper("Novel biomarkers for early heart attack prediction", "troponin"),
            post("DDoS mitigation strategies", "rate limiting at the edge"),
        ];
        let out = filter("heart attacks", input);
        assert_eq!(
            titles(&out),
            vec!["Novel biomarkers for early heart attack prediction"]
        );
    }

    #[test]
    fn fallback_returns_input_when_everything_is_dropped() {
        let input = vec![post("DDoS mitigation", ""), post("Kernel bypass", "")];
        let out = filter("heart attacks", input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn empty_keyword_set_returns_input_unchanged() {
        let input = vec![post("anything", "")];
        assert_eq!(filter("AI", input.clone()), input);
        assert_eq!(filter("", input.clone()), input);
    }

    #[test]
    fn substring_false_positives_are_preserved() {
        let input = vec![
            post("5G cellular network slicing", ""),
            post("Unrelated", "nothing here"),
        ];
        let out = filter("cell biology", input);
        assert_eq!(titles(&out), vec!["5G cellular network slicing"]);
    }

    #[test]
    fn body_text_is_searched_too() {
        let input = vec![
            post("A question", "my heart monitor keeps beeping"),
            post("Other", "nope"),
        ];
        let out = filter("heart", input);
        assert_eq!(titles(&out), vec!["A question"]);
    }

    #[test]
    fn full_domain_phrase_matches_even_without_long_tokens() {
        let f = KeywordFilter::new("go ai");
        assert!(f.keywords().is_empty());
        assert!(f.matches_text("Why GO AI agents fail"));
    }

    #[test]
    fn output_is_an_ordered_subset() {
        let input = vec![
            post("heart 1", ""),
            post("x", ""),
            post("heart 2", ""),
            post("y", ""),
        ];
        let out = filter("heart", input.clone());
        assert_eq!(titles(&out), vec!["heart 1", "heart 2"]);
        assert!(out.iter().all(|r| input.contains(r)));
    }

    #[test]
    fn anon_hash_is_stable_and_short() {
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_eq!(anon_hash("abc").len(), 12);
        assert_ne!(anon_hash("abc"), anon_hash("abd"));
    }
}
