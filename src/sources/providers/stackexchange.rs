// src/sources/providers/stackexchange.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::sources::types::{Question, SourceAdapter, SourceKind, SourceRecord};
use crate::sources::{normalize_text, truncate_chars};

const BODY_SNIPPET_CHARS: usize = 500;
const MAX_PAGE_SIZE: usize = 30;

/// General-purpose site used when no topical community matches.
pub const DEFAULT_SITE: &str = "stackoverflow";

/// Ordered keyword lists; the first list with a substring hit picks the site.
const SITE_MAP: &[(&[&str], &str)] = &[
    (
        &["biology", "gene", "protein", "cell", "genome", "dna", "rna", "evolution", "species", "organism"],
        "biology",
    ),
    (
        &[
            "heart", "cardiac", "disease", "clinical", "patient", "medical", "drug", "therapy",
            "cancer", "diabetes", "health", "surgery", "diagnosis", "symptom", "treatment",
        ],
        "health",
    ),
    (
        &["physics", "quantum", "particle", "relativity", "gravity", "energy", "thermodynamic", "optics", "photon"],
        "physics",
    ),
    (
        &["math", "algebra", "calculus", "theorem", "geometry", "topology", "probability", "statistics"],
        "math",
    ),
    (
        &["chemistry", "molecule", "compound", "reaction", "organic", "inorganic", "polymer"],
        "chemistry",
    ),
    (
        &["earth", "geology", "climate", "weather", "ocean", "seismol", "atmosphere"],
        "earthscience",
    ),
    (
        &["space", "astronomy", "planet", "star", "galaxy", "telescope", "orbit", "cosmos"],
        "astronomy",
    ),
    (
        &["electric", "circuit", "signal", "embedded", "arduino", "fpga", "semiconductor", "vlsi"],
        "electronics",
    ),
];

/// Choose the Stack Exchange community for a query.
pub fn pick_site(query: &str) -> &'static str {
    let q = query.to_lowercase();
    SITE_MAP
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| q.contains(kw)))
        .map(|(_, site)| *site)
        .unwrap_or(DEFAULT_SITE)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    question_id: i64,
    #[serde(default)]
    title: String,
    link: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    answer_count: u32,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    is_answered: bool,
    #[serde(default)]
    view_count: u64,
}

/// Parse a `/search/advanced` response (requested with `filter=withbody`).
pub fn parse_items(json: &str) -> Result<Vec<SourceRecord>> {
    let resp: SearchResponse =
        serde_json::from_str(json).context("parsing stackexchange search json")?;
    Ok(resp
        .items
        .into_iter()
        .map(|it| {
            SourceRecord::Qa(Question {
                id: it.question_id,
                title: normalize_text(&it.title),
                link: it.link,
                score: it.score,
                answer_count: it.answer_count,
                tags: it.tags,
                body_snippet: truncate_chars(&normalize_text(&it.body), BODY_SNIPPET_CHARS),
                is_answered: it.is_answered,
                view_count: it.view_count,
            })
        })
        .collect())
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

/// Q&A adapter over the Stack Exchange API (anonymous, low-rate usage).
pub struct StackExchangeProvider {
    mode: Mode,
}

impl StackExchangeProvider {
    pub fn live(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            mode: Mode::Http {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        }
    }

    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
        }
    }
}

#[async_trait]
impl SourceAdapter for StackExchangeProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        match &self.mode {
            Mode::Fixture(json) => {
                let mut out = parse_items(json)?;
                out.truncate(limit);
                Ok(out)
            }
            Mode::Http { client, base_url } => {
                let site = pick_site(query);
                let page_size = limit.min(MAX_PAGE_SIZE).to_string();
                tracing::debug!(target: "sources", site, "stackexchange site selected");
                let body = client
                    .get(format!("{base_url}/search/advanced"))
                    .query(&[
                        ("q", query),
                        ("site", site),
                        ("pagesize", page_size.as_str()),
                        ("order", "desc"),
                        ("sort", "relevance"),
                        ("filter", "withbody"),
                    ])
                    .send()
                    .await
                    .context("stackexchange http get()")?
                    .error_for_status()
                    .context("stackexchange http status")?
                    .text()
                    .await
                    .context("stackexchange http .text()")?;
                parse_items(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "stackexchange"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Qa
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fetch_or_empty;
    use std::time::Duration;

    #[test]
    fn picks_topical_sites() {
        assert_eq!(pick_site("CRISPR gene editing"), "biology");
        assert_eq!(pick_site("Heart Attacks"), "health");
        assert_eq!(pick_site("quantum error correction"), "physics");
        assert_eq!(pick_site("FPGA toolchains"), "electronics");
        assert_eq!(pick_site("rust borrow checker"), DEFAULT_SITE);
    }

    #[test]
    fn earlier_lists_win_on_overlap() {
        // "cell" (biology) is checked before "energy" (physics).
        assert_eq!(pick_site("solar cell energy"), "biology");
        // substring semantics: "star" inside "startup"
        assert_eq!(pick_site("startup funding"), "astronomy");
    }

    #[test]
    fn strips_html_and_caps_snippet() {
        let body = format!("<p>{}</p>", "a".repeat(800));
        let json = serde_json::json!({
            "items": [{
                "question_id": 7,
                "title": "Why &quot;troponin&quot;?",
                "link": "https://health.stackexchange.com/q/7",
                "score": 5,
                "answer_count": 2,
                "tags": ["cardiology"],
                "body": body,
                "is_answered": true,
                "view_count": 100
            }]
        })
        .to_string();
        let out = parse_items(&json).unwrap();
        let SourceRecord::Qa(q) = &out[0] else { panic!() };
        assert_eq!(q.title, "Why \"troponin\"?");
        assert_eq!(q.body_snippet.chars().count(), 500);
        assert!(!q.body_snippet.contains('<'));
        assert!(q.is_answered);
    }

    #[tokio::test]
    async fn fixture_mode_through_pipeline_boundary() {
        let json = r#"{"items":[
            {"question_id":1,"title":"q1","score":2,"is_answered":true},
            {"question_id":2,"title":"q2","score":4}
        ]}"#;
        let provider = StackExchangeProvider::from_fixture(json);
        let out = fetch_or_empty(&provider, "heart", 5, Duration::from_secs(1)).await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.kind() == provider.kind()));
        assert_eq!(out[1].id().as_deref(), Some("2"));

        let out = fetch_or_empty(&provider, "heart", 1, Duration::from_secs(1)).await;
        assert_eq!(out.len(), 1);
    }
}
