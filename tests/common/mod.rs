// tests/common/mod.rs
//
// Shared fixtures for the integration tests: static source adapters, the
// echo mock extractor and an in-memory store wired into the real router.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use frontier_map::config::ExtractionConfig;
use frontier_map::extract::llm::{ChatProvider, LlmExtractor, MockProvider};
use frontier_map::index::NoopIndex;
use frontier_map::normalize::Calibration;
use frontier_map::sources::providers::fixture::StaticAdapter;
use frontier_map::sources::types::{ForumPost, Paper, Question, SourceKind, SourceRecord, Story};
use frontier_map::sources::SourceSet;
use frontier_map::store::{MemoryStore, SharedStore};
use frontier_map::{router, AppState, Discovery};

pub const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

pub const HEART_PAPER: &str = "Novel biomarkers for early heart attack prediction";
pub const HEART_PAPER_URL: &str = "https://arxiv.org/abs/2401.00001";
pub const DDOS_POST: &str = "DDoS mitigation strategies";

pub fn paper(title: &str, published: &str, authors: &[&str], categories: &[&str]) -> SourceRecord {
    SourceRecord::Paper(Paper {
        id: format!("id-{title}"),
        title: title.to_string(),
        summary: format!("We study {title}. Limitations remain."),
        authors: authors.iter().map(|s| s.to_string()).collect(),
        published: published.to_string(),
        url: Some(format!("https://arxiv.org/abs/{}", title.len())),
        categories: categories.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn post(title: &str, text: &str, score: i64) -> SourceRecord {
    SourceRecord::Forum(ForumPost {
        id: format!("t3_{score}"),
        title: title.to_string(),
        text: text.to_string(),
        url: Some(format!("https://www.reddit.com/r/test/{score}")),
        score,
        subreddit: "test".to_string(),
        created_utc: 1_700_000_000.0,
    })
}

pub fn story(title: &str, points: i64) -> SourceRecord {
    SourceRecord::News(Story {
        id: points.to_string(),
        title: title.to_string(),
        url: None,
        points,
        num_comments: points / 10,
        created_at: "2024-03-01T00:00:00Z".to_string(),
        author: "hn_user".to_string(),
    })
}

pub fn question(title: &str, score: i64, answered: bool) -> SourceRecord {
    SourceRecord::Qa(Question {
        id: score,
        title: title.to_string(),
        link: Some(format!("https://stackoverflow.com/q/{score}")),
        score,
        answer_count: 1,
        tags: vec!["test".to_string()],
        body_snippet: "How do I...".to_string(),
        is_answered: answered,
        view_count: 100,
    })
}

/// Heart-attack themed fixture set with one off-topic forum post.
pub fn heart_sources() -> SourceSet {
    let heart_paper = SourceRecord::Paper(Paper {
        id: "2401.00001".to_string(),
        title: HEART_PAPER.to_string(),
        summary: "Troponin variants improve early detection; cohort size is a limitation.".to_string(),
        authors: vec!["A. Cardio".to_string(), "B. Vessel".to_string()],
        published: "2024-02-10T00:00:00Z".to_string(),
        url: Some(HEART_PAPER_URL.to_string()),
        categories: vec!["q-bio.QM".to_string()],
    });
    let second_paper = paper("Heart rhythm models", "2024-03-05T00:00:00Z", &["A. Cardio"], &["cs.LG"]);

    SourceSet {
        papers: Arc::new(StaticAdapter::new(SourceKind::Paper, vec![heart_paper, second_paper])),
        forum: Arc::new(StaticAdapter::new(
            SourceKind::Forum,
            vec![
                post(DDOS_POST, "rate limiting at the edge", 40),
                post("Heart attack risk calculators are unreliable", "anyone else?", 60),
            ],
        )),
        qa: Arc::new(StaticAdapter::new(
            SourceKind::Qa,
            vec![question("Heart rate variability in python", 15, true)],
        )),
        news: Arc::new(StaticAdapter::new(
            SourceKind::News,
            vec![story("Show HN: heart monitor", 100), story("Heart study", 300)],
        )),
        messages: Arc::new(StaticAdapter::empty(SourceKind::Message)),
        timeout: Duration::from_secs(2),
    }
}

pub fn empty_sources() -> SourceSet {
    SourceSet {
        papers: Arc::new(StaticAdapter::empty(SourceKind::Paper)),
        forum: Arc::new(StaticAdapter::empty(SourceKind::Forum)),
        qa: Arc::new(StaticAdapter::empty(SourceKind::Qa)),
        news: Arc::new(StaticAdapter::empty(SourceKind::News)),
        messages: Arc::new(StaticAdapter::empty(SourceKind::Message)),
        timeout: Duration::from_secs(2),
    }
}

pub fn discovery_with(sources: SourceSet, provider: Arc<dyn ChatProvider>, store: SharedStore) -> Discovery {
    Discovery {
        sources,
        calibration: Calibration::default(),
        extractor: Arc::new(LlmExtractor::new(provider, &ExtractionConfig::default())),
        store,
        index: Arc::new(NoopIndex),
    }
}

/// Router over the heart fixtures, echo mock and a fresh in-memory store.
pub fn test_router() -> Router {
    let store: SharedStore = Arc::new(MemoryStore::new());
    router(AppState::new(discovery_with(
        heart_sources(),
        Arc::new(MockProvider::echo()),
        store,
    )))
}

/// Send one request through the router; returns status and parsed JSON
/// (`Null` for empty or non-JSON bodies).
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(body).expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}
