// src/extract/llm.rs
//! Chat-completion providers and the LLM-backed gap extractor.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::extract::prompt::{self, DOMAIN_PREFIX, SUB_TOPIC_PREFIX, TITLE_PREFIX, URL_PREFIX};
use crate::sources::types::SourceRecord;
use crate::store::FeedbackStats;

pub const ENV_TEST_MODE: &str = "AI_TEST_MODE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Low-level chat completion. Separated from the extractor so tests can swap
/// the remote call for a canned reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible `/chat/completions` (Groq, OpenAI, local gateways).
pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatProvider {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self> {
        let api_key = cfg.resolved_api_key()?;
        let http = reqwest::Client::builder()
            .user_agent("frontier-map/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building LLM http client")?;
        Ok(Self {
            http,
            endpoint: chat_endpoint(&cfg.base_url),
            model: cfg.model.clone(),
            api_key,
        })
    }
}

/// Resolve the chat completions endpoint from a base URL.
pub fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: &'a [Message],
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages,
            temperature: 0.3,
            max_tokens: 2048,
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("LLM request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("LLM endpoint returned {status}");
        }
        let body: Resp = resp.json().await.context("decoding LLM response")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("LLM returned no content"))
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Deterministic provider for tests and offline runs.
///
/// With a canned reply it returns that verbatim. Otherwise it echoes one card
/// citing the first source of the prompt (or, for single-card prompts, the
/// sub-topic), wrapped in a Markdown fence like real models tend to do.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    canned: Option<String>,
}

impl MockProvider {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn canned(reply: impl Into<String>) -> Self {
        Self {
            canned: Some(reply.into()),
        }
    }

    fn echo_reply(prompt: &str) -> String {
        let field = |prefix: &str| {
            prompt
                .lines()
                .find_map(|l| l.strip_prefix(prefix))
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        let domain = field(DOMAIN_PREFIX);
        let title = field(TITLE_PREFIX);

        let cards = if !title.is_empty() {
            // URL line, if any, directly follows the first title
            let url = prompt
                .lines()
                .skip_while(|l| !l.starts_with(TITLE_PREFIX))
                .nth(1)
                .and_then(|l| l.strip_prefix(URL_PREFIX))
                .unwrap_or_default();
            serde_json::json!([{
                "gap": format!("Open limitation raised in \"{title}\""),
                "context": format!("Reported as unresolved in the {domain} literature."),
                "source_citation": title,
                "source_url": url,
                "proposed_solution": "Reproduce the limitation and benchmark candidate fixes.",
                "novelty_score": 7
            }])
        } else if prompt.contains(SUB_TOPIC_PREFIX) {
            let sub = field(SUB_TOPIC_PREFIX);
            serde_json::json!([{
                "gap": format!("No robust method for {sub} in {domain}"),
                "context": format!("Approaches to {sub} do not generalize beyond lab settings."),
                "source_citation": format!("Survey of {sub}"),
                "source_url": "",
                "proposed_solution": format!("Build an open benchmark for {sub}."),
                "novelty_score": 6.5
            }])
        } else {
            serde_json::json!([])
        };
        format!("Here you go:\n```json\n{}\n```", serde_json::json!({ "cards": cards }))
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        if let Some(reply) = &self.canned {
            return Ok(reply.clone());
        }
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(Self::echo_reply(prompt))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails; extraction degrades to empty results.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait]
impl ChatProvider for DisabledProvider {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        bail!("extraction provider disabled")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

fn default_novelty() -> f64 {
    crate::store::models::NOVELTY_MIN
}

/// One card as returned by the model, before post-processing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedCard {
    pub gap: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub source_citation: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub proposed_solution: String,
    #[serde(default = "default_novelty")]
    pub novelty_score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CardPayload {
    Wrapped { cards: Vec<ExtractedCard> },
    Bare(Vec<ExtractedCard>),
}

/// Parse `{"cards": [...]}` (or a bare array) out of a model reply, ignoring
/// Markdown fences and surrounding prose.
pub fn parse_cards(reply: &str) -> Result<Vec<ExtractedCard>> {
    let text = reply.trim();
    let text = match (text.find("```"), text.rfind("```")) {
        (Some(a), Some(b)) if b > a => {
            let inner = &text[a + 3..b];
            // drop the info string ("json") on the opening fence line
            inner.split_once('\n').map_or(inner, |(_, rest)| rest)
        }
        _ => text,
    };

    let start = text.find(['{', '[']).ok_or_else(|| anyhow!("no JSON in model reply"))?;
    let end = text.rfind(['}', ']']).ok_or_else(|| anyhow!("no JSON in model reply"))?;
    if end < start {
        bail!("no JSON in model reply");
    }
    let payload: CardPayload =
        serde_json::from_str(&text[start..=end]).context("model reply is not a card list")?;
    Ok(match payload {
        CardPayload::Wrapped { cards } => cards,
        CardPayload::Bare(cards) => cards,
    })
}

/// Seam between the orchestrator and whatever produces cards.
#[async_trait]
pub trait GapExtractor: Send + Sync {
    async fn extract(
        &self,
        domain: &str,
        sources: &[SourceRecord],
        feedback: &FeedbackStats,
    ) -> Result<Vec<ExtractedCard>>;

    async fn generate(&self, domain: &str, sub_topic: &str) -> Result<Vec<ExtractedCard>>;

    fn name(&self) -> &'static str;
}

pub struct LlmExtractor {
    provider: Arc<dyn ChatProvider>,
    snippet_chars: usize,
    feedback_hints: usize,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn ChatProvider>, cfg: &ExtractionConfig) -> Self {
        Self {
            provider,
            snippet_chars: cfg.snippet_chars,
            feedback_hints: cfg.feedback_hints.min(prompt::MAX_FEEDBACK_HINTS),
        }
    }
}

#[async_trait]
impl GapExtractor for LlmExtractor {
    async fn extract(
        &self,
        domain: &str,
        sources: &[SourceRecord],
        feedback: &FeedbackStats,
    ) -> Result<Vec<ExtractedCard>> {
        let messages = prompt::gap_messages(domain, sources, feedback, self.snippet_chars, self.feedback_hints);
        let reply = self.provider.complete(&messages).await?;
        parse_cards(&reply)
    }

    async fn generate(&self, domain: &str, sub_topic: &str) -> Result<Vec<ExtractedCard>> {
        let messages = prompt::single_card_messages(domain, sub_topic);
        let reply = self.provider.complete(&messages).await?;
        parse_cards(&reply)
    }

    fn name(&self) -> &'static str {
        self.provider.name()
    }
}

pub type SharedExtractor = Arc<dyn GapExtractor>;

fn test_mode_mock() -> bool {
    std::env::var(ENV_TEST_MODE)
        .map(|v| v.trim().eq_ignore_ascii_case("mock"))
        .unwrap_or(false)
}

/// Factory: build an extractor according to config and environment.
///
/// * `AI_TEST_MODE=mock` forces the echo mock.
/// * `provider = "mock"` / `"disabled"` select those providers.
/// * `groq` / `openai` build the HTTP provider; a missing key degrades to disabled.
pub fn build_extractor(cfg: &ExtractionConfig) -> SharedExtractor {
    let provider: Arc<dyn ChatProvider> = if test_mode_mock() {
        Arc::new(MockProvider::echo())
    } else {
        match cfg.provider_normalized().as_str() {
            "mock" => Arc::new(MockProvider::echo()),
            "disabled" => Arc::new(DisabledProvider),
            "groq" | "openai" => match OpenAiCompatProvider::new(cfg) {
                Ok(p) => Arc::new(p),
                Err(e) => {
                    tracing::warn!(target: "extract", error = ?e, "LLM provider unavailable; extraction disabled");
                    Arc::new(DisabledProvider)
                }
            },
            other => {
                tracing::warn!(target: "extract", provider = other, "unknown extraction provider; extraction disabled");
                Arc::new(DisabledProvider)
            }
        }
    };
    tracing::info!(target: "extract", provider = provider.name(), model = %cfg.model, "gap extractor ready");
    Arc::new(LlmExtractor::new(provider, cfg))
}
