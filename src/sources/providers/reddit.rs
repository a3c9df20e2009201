// src/sources/providers/reddit.rs
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::sources::truncate_chars;
use crate::sources::types::{ForumPost, SourceAdapter, SourceKind, SourceRecord};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const SEARCH_URL: &str = "https://oauth.reddit.com/r/all/search";
const PERMALINK_BASE: &str = "https://www.reddit.com";
const TEXT_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    created_utc: f64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Parse a search listing into forum records.
pub fn parse_listing(json: &str) -> Result<Vec<SourceRecord>> {
    let listing: Listing = serde_json::from_str(json).context("parsing reddit listing json")?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| {
            let s = c.data;
            let url = (!s.permalink.is_empty()).then(|| format!("{PERMALINK_BASE}{}", s.permalink));
            SourceRecord::Forum(ForumPost {
                id: s.id,
                title: s.title,
                text: truncate_chars(&s.selftext, TEXT_CHARS),
                url,
                score: s.score,
                subreddit: s.subreddit,
                created_utc: s.created_utc,
            })
        })
        .collect())
}

/// Treat unset or placeholder credentials ("your_client_id") as absent.
fn usable_credential(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.contains("your_"))
}

struct Credentials {
    client_id: String,
    client_secret: String,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        creds: Credentials,
        token: Mutex<Option<(String, Instant)>>,
    },
    Inactive,
}

/// Forum adapter over Reddit's search API (application-only OAuth).
pub struct RedditProvider {
    mode: Mode,
}

impl RedditProvider {
    /// Reads `REDDIT_CLIENT_ID` / `REDDIT_CLIENT_SECRET`; without them the
    /// adapter is inactive and returns nothing.
    pub fn from_env(client: reqwest::Client) -> Self {
        let id = usable_credential(std::env::var("REDDIT_CLIENT_ID").ok());
        let secret = usable_credential(std::env::var("REDDIT_CLIENT_SECRET").ok());
        match (id, secret) {
            (Some(client_id), Some(client_secret)) => Self {
                mode: Mode::Http {
                    client,
                    creds: Credentials {
                        client_id,
                        client_secret,
                    },
                    token: Mutex::new(None),
                },
            },
            _ => {
                tracing::info!(target: "sources", "reddit credentials not configured; forum source inactive");
                Self {
                    mode: Mode::Inactive,
                }
            }
        }
    }

    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
        }
    }
}

async fn access_token(
    client: &reqwest::Client,
    creds: &Credentials,
    cache: &Mutex<Option<(String, Instant)>>,
) -> Result<String> {
    let mut guard = cache.lock().await;
    if let Some((tok, expires)) = guard.as_ref() {
        if Instant::now() < *expires {
            return Ok(tok.clone());
        }
    }

    let resp: TokenResponse = client
        .post(TOKEN_URL)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .context("reddit token request")?
        .error_for_status()
        .context("reddit token status")?
        .json()
        .await
        .context("reddit token json")?;

    // Refresh a minute early.
    let ttl = Duration::from_secs(resp.expires_in.saturating_sub(60));
    *guard = Some((resp.access_token.clone(), Instant::now() + ttl));
    Ok(resp.access_token)
}

#[async_trait]
impl SourceAdapter for RedditProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        match &self.mode {
            Mode::Inactive => Ok(Vec::new()),
            Mode::Fixture(json) => {
                let mut out = parse_listing(json)?;
                out.truncate(limit);
                Ok(out)
            }
            Mode::Http {
                client,
                creds,
                token,
            } => {
                let bearer = access_token(client, creds, token).await?;
                let limit_s = limit.to_string();
                let body = client
                    .get(SEARCH_URL)
                    .bearer_auth(bearer)
                    .query(&[
                        ("q", query),
                        ("limit", limit_s.as_str()),
                        ("sort", "relevance"),
                        ("raw_json", "1"),
                    ])
                    .send()
                    .await
                    .context("reddit http get()")?
                    .error_for_status()
                    .context("reddit http status")?
                    .text()
                    .await
                    .context("reddit http .text()")?;
                parse_listing(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "reddit"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Forum
    }
}
