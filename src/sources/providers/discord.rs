// src/sources/providers/discord.rs
//! Message-log adapter. A bot (outside this service) exports chat messages as
//! a JSON array; this adapter searches that export by keyword.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::sources::types::{ChatMessage, SourceAdapter, SourceKind, SourceRecord};

pub const ENV_MESSAGE_LOG: &str = "DISCORD_MESSAGE_LOG";

#[derive(Debug, Deserialize)]
struct LoggedMessage {
    #[serde(alias = "message_id", default)]
    id: String,
    #[serde(default)]
    content: String,
    #[serde(alias = "channel_name", default)]
    channel: String,
    #[serde(alias = "server_name", default)]
    server: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    timestamp: String,
}

/// Keep messages containing any query term (case-insensitive).
pub fn search_log(json: &str, query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
    let all: Vec<LoggedMessage> = serde_json::from_str(json).context("parsing message log json")?;
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(all
        .into_iter()
        .filter(|m| {
            let content = m.content.to_lowercase();
            terms.iter().any(|t| content.contains(t.as_str()))
        })
        .take(limit)
        .map(|m| {
            SourceRecord::Message(ChatMessage {
                id: m.id,
                content: m.content,
                channel: m.channel,
                server: m.server,
                author: m.author,
                timestamp: m.timestamp,
            })
        })
        .collect())
}

enum Mode {
    Fixture(String),
    File(PathBuf),
    Inactive,
}

pub struct MessageLogProvider {
    mode: Mode,
}

impl MessageLogProvider {
    /// Active only when `DISCORD_MESSAGE_LOG` names an export file.
    pub fn from_env() -> Self {
        match std::env::var(ENV_MESSAGE_LOG) {
            Ok(p) if !p.trim().is_empty() => Self {
                mode: Mode::File(PathBuf::from(p)),
            },
            _ => {
                tracing::info!(target: "sources", "message log not configured; set {ENV_MESSAGE_LOG} to enable");
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

#[async_trait]
impl SourceAdapter for MessageLogProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        match &self.mode {
            Mode::Inactive => Ok(Vec::new()),
            Mode::Fixture(json) => search_log(json, query, limit),
            Mode::File(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading message log {}", path.display()))?;
                search_log(&json, query, limit)
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Message
    }
}
