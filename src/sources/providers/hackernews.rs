// src/sources/providers/hackernews.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::sources::types::{SourceAdapter, SourceKind, SourceRecord, Story};

const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID", default)]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    points: Option<i64>,
    num_comments: Option<i64>,
    created_at: Option<String>,
    author: Option<String>,
}

/// Parse an Algolia search response. Stories without an external link point
/// at their discussion page.
pub fn parse_hits(json: &str) -> Result<Vec<SourceRecord>> {
    let resp: SearchResponse = serde_json::from_str(json).context("parsing hn search json")?;
    Ok(resp
        .hits
        .into_iter()
        .map(|h| {
            let url = h
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("{ITEM_URL}{}", h.object_id));
            SourceRecord::News(Story {
                id: h.object_id,
                title: h.title.unwrap_or_default(),
                url: Some(url),
                points: h.points.unwrap_or(0),
                num_comments: h.num_comments.unwrap_or(0),
                created_at: h.created_at.unwrap_or_default(),
                author: h.author.unwrap_or_default(),
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

/// News-aggregator adapter over the Hacker News Algolia search API.
pub struct HackerNewsProvider {
    mode: Mode,
}

impl HackerNewsProvider {
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
impl SourceAdapter for HackerNewsProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        match &self.mode {
            Mode::Fixture(json) => {
                let mut out = parse_hits(json)?;
                out.truncate(limit);
                Ok(out)
            }
            Mode::Http { client, base_url } => {
                let hits_per_page = limit.to_string();
                let body = client
                    .get(format!("{base_url}/search"))
                    .query(&[
                        ("query", query),
                        ("tags", "story"),
                        ("hitsPerPage", hits_per_page.as_str()),
                    ])
                    .send()
                    .await
                    .context("hn http get()")?
                    .error_for_status()
                    .context("hn http status")?
                    .text()
                    .await
                    .context("hn http .text()")?;
                parse_hits(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "hackernews"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fetch_or_empty;
    use std::time::Duration;

    #[test]
    fn missing_url_and_null_points_default() {
        let json = r#"{"hits":[
            {"objectID":"1","title":"Ask HN: cardiac wearables?","url":null,"points":null,"num_comments":4,"created_at":"2024-01-01T00:00:00Z","author":"pg"},
            {"objectID":"2","title":"Show HN","url":"https://example.com","points":120,"num_comments":null}
        ]}"#;
        let out = parse_hits(json).unwrap();
        let SourceRecord::News(a) = &out[0] else { panic!() };
        assert_eq!(a.url.as_deref(), Some("https://news.ycombinator.com/item?id=1"));
        assert_eq!(a.points, 0);
        assert_eq!(a.num_comments, 4);
        let SourceRecord::News(b) = &out[1] else { panic!() };
        assert_eq!(b.url.as_deref(), Some("https://example.com"));
        assert_eq!(b.points, 120);
        assert_eq!(b.num_comments, 0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_hits("{not json").is_err());
    }

    #[tokio::test]
    async fn fixture_mode_through_pipeline_boundary() {
        let json = r#"{"hits":[
            {"objectID":"1","title":"a","points":10},
            {"objectID":"2","title":"b","points":20},
            {"objectID":"3","title":"c","points":30}
        ]}"#;
        let provider = HackerNewsProvider::from_fixture(json);
        let out = fetch_or_empty(&provider, "anything", 2, Duration::from_secs(1)).await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.kind() == provider.kind()));

        let broken = HackerNewsProvider::from_fixture("{not json");
        assert!(fetch_or_empty(&broken, "x", 5, Duration::from_secs(1)).await.is_empty());
    }
}
