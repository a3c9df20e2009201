// src/sources/providers/arxiv.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

use crate::sources::normalize_text;
use crate::sources::types::{Paper, SourceAdapter, SourceKind, SourceRecord};

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Re-format an RFC 3339 timestamp in UTC; unparsable input is kept verbatim.
fn normalize_published(ts: &str) -> String {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| ts.trim().to_string())
}

fn pick_url(links: &[Link]) -> Option<String> {
    let pdf = links
        .iter()
        .find(|l| l.title.as_deref() == Some("pdf"))
        .and_then(|l| l.href.clone());
    pdf.or_else(|| {
        links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .and_then(|l| l.href.clone())
    })
}

/// Parse an arXiv Atom feed into paper records.
pub fn parse_feed(xml: &str) -> Result<Vec<SourceRecord>> {
    let t0 = std::time::Instant::now();
    let feed: Feed = from_str(xml).context("parsing arxiv atom feed")?;

    let mut out = Vec::with_capacity(feed.entries.len());
    for e in feed.entries {
        let title = normalize_text(e.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let id = e.id.unwrap_or_default().trim().to_string();
        let url = pick_url(&e.links).or_else(|| (!id.is_empty()).then(|| id.clone()));
        out.push(SourceRecord::Paper(Paper {
            id,
            title,
            summary: normalize_text(e.summary.as_deref().unwrap_or_default()),
            authors: e
                .authors
                .into_iter()
                .filter_map(|a| a.name.map(|n| n.trim().to_string()))
                .filter(|n| !n.is_empty())
                .collect(),
            published: e
                .published
                .as_deref()
                .map(normalize_published)
                .unwrap_or_default(),
            url,
            categories: e.categories.into_iter().filter_map(|c| c.term).collect(),
        }));
    }

    histogram!("source_parse_ms", "source" => "arxiv").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

/// Paper-index adapter over the arXiv query API.
pub struct ArxivProvider {
    mode: Mode,
}

impl ArxivProvider {
    pub fn live(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            mode: Mode::Http {
                client,
                base_url: base_url.to_string(),
            },
        }
    }

    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }
}

#[async_trait]
impl SourceAdapter for ArxivProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        match &self.mode {
            Mode::Fixture(xml) => {
                let mut out = parse_feed(xml)?;
                out.truncate(limit);
                Ok(out)
            }
            Mode::Http { client, base_url } => {
                let max_results = limit.to_string();
                let body = client
                    .get(base_url)
                    .query(&[
                        ("search_query", query),
                        ("start", "0"),
                        ("max_results", max_results.as_str()),
                        ("sortBy", "relevance"),
                        ("sortOrder", "descending"),
                    ])
                    .send()
                    .await
                    .context("arxiv http get()")?
                    .error_for_status()
                    .context("arxiv http status")?
                    .text()
                    .await
                    .context("arxiv http .text()")?;
                parse_feed(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Paper
    }
}
