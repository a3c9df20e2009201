// src/sources/types.rs
use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Which kind of community a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Paper,
    Forum,
    Qa,
    News,
    Message,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Paper => "paper",
            SourceKind::Forum => "forum",
            SourceKind::Qa => "qa",
            SourceKind::News => "news",
            SourceKind::Message => "message",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub authors: Vec<String>,
    /// RFC 3339, as reported by the index.
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub answer_count: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub body_snippet: String,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default)]
    pub view_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A normalized unit from any adapter. Each variant keeps its source-specific
/// fields; the accessors give the common projection used by the relevance
/// filter and the extraction context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "lowercase")]
pub enum SourceRecord {
    Paper(Paper),
    Forum(ForumPost),
    Qa(Question),
    News(Story),
    Message(ChatMessage),
}

const MESSAGE_TITLE_CHARS: usize = 120;

impl SourceRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRecord::Paper(_) => SourceKind::Paper,
            SourceRecord::Forum(_) => SourceKind::Forum,
            SourceRecord::Qa(_) => SourceKind::Qa,
            SourceRecord::News(_) => SourceKind::News,
            SourceRecord::Message(_) => SourceKind::Message,
        }
    }

    pub fn title(&self) -> String {
        match self {
            SourceRecord::Paper(p) => p.title.clone(),
            SourceRecord::Forum(f) => f.title.clone(),
            SourceRecord::Qa(q) => q.title.clone(),
            SourceRecord::News(s) => s.title.clone(),
            SourceRecord::Message(m) => m
                .content
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(MESSAGE_TITLE_CHARS)
                .collect(),
        }
    }

    /// First non-empty of summary / text / body snippet / content.
    pub fn body(&self) -> &str {
        match self {
            SourceRecord::Paper(p) => &p.summary,
            SourceRecord::Forum(f) => &f.text,
            SourceRecord::Qa(q) => &q.body_snippet,
            SourceRecord::News(_) => "",
            SourceRecord::Message(m) => &m.content,
        }
    }

    pub fn url(&self) -> Option<&str> {
        let url = match self {
            SourceRecord::Paper(p) => p.url.as_deref(),
            SourceRecord::Forum(f) => f.url.as_deref(),
            SourceRecord::Qa(q) => q.link.as_deref(),
            SourceRecord::News(s) => s.url.as_deref(),
            SourceRecord::Message(_) => None,
        };
        url.filter(|u| !u.is_empty())
    }

    pub fn id(&self) -> Option<String> {
        let id = match self {
            SourceRecord::Paper(p) => p.id.clone(),
            SourceRecord::Forum(f) => f.id.clone(),
            SourceRecord::Qa(q) => q.id.to_string(),
            SourceRecord::News(s) => s.id.clone(),
            SourceRecord::Message(m) => m.id.clone(),
        };
        (!id.is_empty()).then_some(id)
    }

    pub fn authors(&self) -> Vec<String> {
        match self {
            SourceRecord::Paper(p) => p.authors.clone(),
            SourceRecord::News(s) if !s.author.is_empty() => vec![s.author.clone()],
            SourceRecord::Message(m) if !m.author.is_empty() => vec![m.author.clone()],
            _ => Vec::new(),
        }
    }

    /// Source-specific engagement metrics, keyed by metric name.
    pub fn engagement(&self) -> BTreeMap<&'static str, f64> {
        let mut out = BTreeMap::new();
        match self {
            SourceRecord::Paper(_) | SourceRecord::Message(_) => {}
            SourceRecord::Forum(f) => {
                out.insert("score", f.score as f64);
            }
            SourceRecord::Qa(q) => {
                out.insert("score", q.score as f64);
                out.insert("answers", q.answer_count as f64);
                out.insert("views", q.view_count as f64);
            }
            SourceRecord::News(s) => {
                out.insert("points", s.points as f64);
                out.insert("comments", s.num_comments as f64);
            }
        }
        out
    }
}

/// Fetch-by-query interface every source adapter implements.
///
/// Implementations may return errors; the pipeline boundary
/// (`sources::fetch_or_empty`) turns them into an empty list.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SourceRecord>>;
    fn name(&self) -> &'static str;
    fn kind(&self) -> SourceKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_title_is_first_line_truncated() {
        let long = "x".repeat(300);
        let rec = SourceRecord::Message(ChatMessage {
            id: "m1".into(),
            content: format!("{long}\nsecond line"),
            channel: "general".into(),
            server: "lab".into(),
            author: "ana".into(),
            timestamp: String::new(),
        });
        assert_eq!(rec.title().chars().count(), 120);
        assert!(rec.body().ends_with("second line"));
        assert_eq!(rec.url(), None);
    }

    #[test]
    fn empty_url_and_id_project_to_none() {
        let rec = SourceRecord::News(Story {
            id: String::new(),
            title: "Show HN".into(),
            url: Some(String::new()),
            points: 10,
            num_comments: 2,
            created_at: String::new(),
            author: String::new(),
        });
        assert_eq!(rec.url(), None);
        assert_eq!(rec.id(), None);
        assert!(rec.authors().is_empty());
        assert_eq!(rec.engagement().get("points"), Some(&10.0));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let rec = SourceRecord::Qa(Question {
            id: 42,
            title: "Why?".into(),
            link: None,
            score: 3,
            answer_count: 1,
            tags: vec![],
            body_snippet: "because".into(),
            is_answered: true,
            view_count: 9,
        });
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["source_kind"], "qa");
        assert_eq!(v["id"], 42);
    }
}
