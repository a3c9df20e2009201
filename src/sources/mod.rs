// src/sources/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::SourcesConfig;
use crate::sources::providers::{
    arxiv::ArxivProvider, discord::MessageLogProvider, hackernews::HackerNewsProvider,
    reddit::RedditProvider, stackexchange::StackExchangeProvider,
};
use crate::sources::types::{SourceAdapter, SourceKind, SourceRecord};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("source_records_total", "Records returned by source adapters.");
        describe_counter!(
            "source_errors_total",
            "Adapter fetch/parse errors and timeouts (degraded to empty)."
        );
        describe_histogram!("source_fetch_ms", "Adapter fetch time in milliseconds.");
    });
}

/// Strip HTML tags, decode entities and collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));

    let no_tags = re_tags.replace_all(s, " ");
    let decoded = html_escape::decode_html_entities(&no_tags).to_string();
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Char-boundary-safe prefix.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Run one adapter with a bounded timeout. Errors and timeouts are logged and
/// degrade to an empty list; they never reach the caller.
pub async fn fetch_or_empty(
    adapter: &dyn SourceAdapter,
    query: &str,
    limit: usize,
    timeout: Duration,
) -> Vec<SourceRecord> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let res = tokio::time::timeout(timeout, adapter.search(query, limit)).await;
    histogram!("source_fetch_ms", "source" => adapter.name())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(Ok(mut records)) => {
            records.truncate(limit);
            tracing::debug!(
                target: "sources",
                source = adapter.name(),
                kind = %adapter.kind(),
                records = records.len(),
                "source adapter returned"
            );
            counter!("source_records_total", "source" => adapter.name())
                .increment(records.len() as u64);
            records
        }
        Ok(Err(e)) => {
            tracing::warn!(
                target: "sources",
                error = ?e,
                source = adapter.name(),
                kind = %adapter.kind(),
                "source adapter error"
            );
            counter!("source_errors_total", "source" => adapter.name()).increment(1);
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                target: "sources",
                source = adapter.name(),
                kind = %adapter.kind(),
                timeout_ms = timeout.as_millis() as u64,
                "source adapter timed out"
            );
            counter!("source_errors_total", "source" => adapter.name()).increment(1);
            Vec::new()
        }
    }
}

/// Put paper-index records first, keeping the relative order of the rest.
pub fn merge_papers_first(batches: Vec<Vec<SourceRecord>>) -> Vec<SourceRecord> {
    let (mut papers, rest): (Vec<_>, Vec<_>) = batches
        .into_iter()
        .flatten()
        .partition(|r| r.kind() == SourceKind::Paper);
    papers.extend(rest);
    papers
}

/// Raw per-source results, as returned by `/discovery/sources`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawSources {
    pub arxiv: Vec<SourceRecord>,
    pub reddit: Vec<SourceRecord>,
    pub hackernews: Vec<SourceRecord>,
    pub stackexchange: Vec<SourceRecord>,
    pub discord: Vec<SourceRecord>,
}

/// The full set of adapters, one per source kind.
#[derive(Clone)]
pub struct SourceSet {
    pub papers: Arc<dyn SourceAdapter>,
    pub forum: Arc<dyn SourceAdapter>,
    pub qa: Arc<dyn SourceAdapter>,
    pub news: Arc<dyn SourceAdapter>,
    pub messages: Arc<dyn SourceAdapter>,
    pub timeout: Duration,
}

impl SourceSet {
    /// Build live HTTP adapters from configuration.
    pub fn from_config(cfg: &SourcesConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            papers: Arc::new(ArxivProvider::live(http.clone(), &cfg.arxiv_url)),
            forum: Arc::new(RedditProvider::from_env(http.clone())),
            qa: Arc::new(StackExchangeProvider::live(http.clone(), &cfg.stackexchange_url)),
            news: Arc::new(HackerNewsProvider::live(http, &cfg.hackernews_url)),
            messages: Arc::new(MessageLogProvider::from_env()),
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }

    /// Papers + forum discussions merged papers-first, the input of gap extraction.
    pub async fn gather_for_gaps(&self, domain: &str, limit: usize) -> Vec<SourceRecord> {
        let (papers, forum) = tokio::join!(
            fetch_or_empty(self.papers.as_ref(), domain, limit, self.timeout),
            fetch_or_empty(self.forum.as_ref(), domain, limit, self.timeout),
        );
        tracing::info!(
            target: "sources",
            domain,
            papers = papers.len(),
            forum = forum.len(),
            "gathered sources for gap extraction"
        );
        merge_papers_first(vec![papers, forum])
    }

    /// Every adapter, queried concurrently.
    pub async fn gather_raw(&self, domain: &str, limit: usize) -> RawSources {
        let (arxiv, reddit, hackernews, stackexchange, discord) = tokio::join!(
            fetch_or_empty(self.papers.as_ref(), domain, limit, self.timeout),
            fetch_or_empty(self.forum.as_ref(), domain, limit, self.timeout),
            fetch_or_empty(self.news.as_ref(), domain, limit, self.timeout),
            fetch_or_empty(self.qa.as_ref(), domain, limit, self.timeout),
            fetch_or_empty(self.messages.as_ref(), domain, limit, self.timeout),
        );
        RawSources {
            arxiv,
            reddit,
            hackernews,
            stackexchange,
            discord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::providers::fixture::StaticAdapter;
    use crate::sources::types::{ForumPost, Paper};

    fn paper(title: &str) -> SourceRecord {
        SourceRecord::Paper(Paper {
            id: title.into(),
            title: title.into(),
            summary: String::new(),
            authors: vec![],
            published: String::new(),
            url: None,
            categories: vec![],
        })
    }

    fn post(title: &str) -> SourceRecord {
        SourceRecord::Forum(ForumPost {
            id: title.into(),
            title: title.into(),
            text: String::new(),
            url: None,
            score: 1,
            subreddit: "science".into(),
            created_utc: 0.0,
        })
    }

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let out = normalize_text("<p>Hello&nbsp;&amp;\n\n <b>world</b></p>");
        assert_eq!(out, "Hello & world");
    }

    #[test]
    fn merge_puts_papers_first_and_keeps_order() {
        let merged = merge_papers_first(vec![
            vec![post("f1"), paper("p1")],
            vec![post("f2"), paper("p2")],
        ]);
        let titles: Vec<_> = merged.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["p1", "p2", "f1", "f2"]);
    }

    #[tokio::test]
    async fn failing_adapter_degrades_to_empty() {
        let a = StaticAdapter::failing(SourceKind::Forum);
        let out = fetch_or_empty(&a, "x", 5, Duration::from_secs(1)).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn slow_adapter_times_out_to_empty() {
        let a = StaticAdapter::new(SourceKind::Paper, vec![paper("p")])
            .with_delay(Duration::from_millis(200));
        let out = fetch_or_empty(&a, "x", 5, Duration::from_millis(20)).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn results_are_capped_at_limit() {
        let a = StaticAdapter::new(SourceKind::Paper, vec![paper("a"), paper("b"), paper("c")]);
        let out = fetch_or_empty(&a, "x", 2, Duration::from_secs(1)).await;
        assert_eq!(out.len(), 2);
    }
}
