// src/index.rs
//! Best-effort similarity index over fetched documents.
//!
//! Upserts run as detached tasks after gap discovery; their outcome is only
//! visible in the logs and the `index_*` counters.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::IndexConfig;
use crate::sources::types::{SourceKind, SourceRecord};

pub const ENV_EMBEDDINGS_KEY: &str = "OPENAI_API_KEY";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("index_upserted_total", "Documents written to the similarity index.");
        describe_counter!("index_errors_total", "Failed index upserts (logged, never surfaced).");
    });
}

/// Stable id: the record's own id, else a SHA-256 prefix of url + title.
pub fn doc_id(rec: &SourceRecord) -> String {
    if let Some(id) = rec.id() {
        return format!("{}:{id}", rec.kind());
    }
    let mut h = Sha256::new();
    h.update(rec.url().unwrap_or_default().as_bytes());
    h.update(b"\n");
    h.update(rec.title().as_bytes());
    let digest = h.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn embed_text(rec: &SourceRecord) -> String {
    format!("{} {}", rec.title(), rec.body())
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDoc {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub source: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarDoc {
    #[serde(flatten)]
    pub doc: IndexedDoc,
    pub score: f32,
}

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Returns how many documents were written.
    async fn upsert(&self, docs: &[SourceRecord]) -> Result<usize>;
    async fn query_similar(&self, text: &str, top_k: usize) -> Result<Vec<SimilarDoc>>;
    fn name(&self) -> &'static str;
}

pub type SharedIndex = Arc<dyn DocumentIndex>;

/// Indexing switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndex;

#[async_trait]
impl DocumentIndex for NoopIndex {
    async fn upsert(&self, _docs: &[SourceRecord]) -> Result<usize> {
        Ok(0)
    }

    async fn query_similar(&self, _text: &str, _top_k: usize) -> Result<Vec<SimilarDoc>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible `/embeddings`.
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn from_config(cfg: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var(ENV_EMBEDDINGS_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && !k.contains("your_"))
            .ok_or_else(|| anyhow!("Missing {ENV_EMBEDDINGS_KEY} env var"))?;
        let http = reqwest::Client::builder()
            .user_agent("frontier-map/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building embeddings http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", cfg.base_url.trim_end_matches('/')),
            model: cfg.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a [String],
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Item>,
        }
        #[derive(Deserialize)]
        struct Item {
            index: usize,
            embedding: Vec<f32>,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&Req {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .context("embeddings request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("embeddings endpoint returned {status}");
        }
        let mut body: Resp = resp.json().await.context("decoding embeddings response")?;
        if body.data.len() != inputs.len() {
            bail!("expected {} embeddings, got {}", inputs.len(), body.data.len());
        }
        body.data.sort_by_key(|i| i.index);
        Ok(body.data.into_iter().map(|i| i.embedding).collect())
    }
}

/// In-memory vectors keyed by [`doc_id`]; re-upserting a document replaces it.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    vectors: RwLock<HashMap<String, (IndexedDoc, Vec<f32>)>>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentIndex for EmbeddingIndex {
    async fn upsert(&self, docs: &[SourceRecord]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = docs.iter().map(embed_text).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut guard = self.vectors.write().unwrap_or_else(PoisonError::into_inner);
        for (rec, v) in docs.iter().zip(vectors) {
            let doc = IndexedDoc {
                id: doc_id(rec),
                title: rec.title(),
                url: rec.url().map(str::to_string),
                source: rec.kind(),
            };
            guard.insert(doc.id.clone(), (doc, v));
        }
        Ok(docs.len())
    }

    async fn query_similar(&self, text: &str, top_k: usize) -> Result<Vec<SimilarDoc>> {
        let query = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("no embedding for query"))?;

        let guard = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
        let mut scored: Vec<SimilarDoc> = guard
            .values()
            .map(|(doc, v)| SimilarDoc {
                doc: doc.clone(),
                score: cosine(&query, v),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc.id.cmp(&b.doc.id)));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn name(&self) -> &'static str {
        "embedding"
    }
}

/// Build the configured index; a missing key degrades to [`NoopIndex`].
pub fn build_index(cfg: &IndexConfig) -> SharedIndex {
    if !cfg.enabled {
        return Arc::new(NoopIndex);
    }
    match OpenAiEmbedder::from_config(cfg) {
        Ok(e) => Arc::new(EmbeddingIndex::new(Arc::new(e))),
        Err(e) => {
            tracing::warn!(target: "index", error = ?e, "similarity index inactive");
            Arc::new(NoopIndex)
        }
    }
}

/// Fire-and-forget upsert. Never blocks or fails the caller.
pub fn spawn_upsert(index: SharedIndex, docs: Vec<SourceRecord>) -> tokio::task::JoinHandle<()> {
    ensure_metrics_described();
    tokio::spawn(async move {
        match index.upsert(&docs).await {
            Ok(n) => {
                counter!("index_upserted_total").increment(n as u64);
                tracing::debug!(target: "index", index = index.name(), upserted = n, "documents indexed");
            }
            Err(e) => {
                counter!("index_errors_total").increment(1);
                tracing::warn!(target: "index", error = ?e, index = index.name(), "document upsert failed");
            }
        }
    })
}
