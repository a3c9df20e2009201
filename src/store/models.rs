// src/store/models.rs
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

pub const NOVELTY_MIN: f64 = 1.0;
pub const NOVELTY_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Done, Status::Blocked];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Done => "DONE",
            Status::Blocked => "BLOCKED",
        }
    }
}

impl FromStr for Status {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| StoreError::validation("status", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Priority {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| StoreError::validation("priority", s))
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A discovered (or manually entered) research gap with backlog metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    /// Store-assigned; absent until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub gap: String,
    pub context: String,
    pub source_citation: String,
    #[serde(default)]
    pub source_url: String,
    pub proposed_solution: String,
    pub novelty_score: f64,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn check_novelty(score: f64) -> Result<f64, StoreError> {
    if score.is_finite() && (NOVELTY_MIN..=NOVELTY_MAX).contains(&score) {
        Ok(score)
    } else {
        Err(StoreError::validation("novelty_score", score))
    }
}

fn clean_tags(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Body of a manual save. Status and priority arrive as raw strings so that
/// an unknown value is reported as a validation error naming the field.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDraft {
    pub gap: String,
    pub context: String,
    pub source_citation: String,
    pub proposed_solution: String,
    pub novelty_score: f64,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

impl CardDraft {
    pub fn into_record(self) -> Result<GapRecord, StoreError> {
        if self.gap.trim().is_empty() {
            return Err(StoreError::validation("gap", &self.gap));
        }
        let status = self
            .status
            .as_deref()
            .map(str::parse::<Status>)
            .transpose()?
            .unwrap_or_default();
        let priority = self
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?
            .unwrap_or_default();
        Ok(GapRecord {
            id: None,
            gap: self.gap,
            context: self.context,
            source_citation: self.source_citation,
            source_url: self.source_url,
            proposed_solution: self.proposed_solution,
            novelty_score: check_novelty(self.novelty_score)?,
            domain: self.domain,
            is_manual: self.is_manual,
            status,
            priority,
            tags: clean_tags(self.tags),
            assignee: self.assignee.filter(|a| !a.trim().is_empty()),
            created_at: Utc::now(),
            updated_at: None,
        })
    }
}

/// Partial update. Every present field replaces the stored one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardPatch {
    pub gap: Option<String>,
    pub context: Option<String>,
    pub source_citation: Option<String>,
    pub source_url: Option<String>,
    pub proposed_solution: Option<String>,
    pub novelty_score: Option<f64>,
    pub domain: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub assignee: Option<String>,
}

/// A patch whose enum fields and ranges have been checked.
#[derive(Debug, Clone, Default)]
pub struct ValidatedPatch {
    gap: Option<String>,
    context: Option<String>,
    source_citation: Option<String>,
    source_url: Option<String>,
    proposed_solution: Option<String>,
    novelty_score: Option<f64>,
    domain: Option<String>,
    status: Option<Status>,
    priority: Option<Priority>,
    tags: Option<BTreeSet<String>>,
    assignee: Option<String>,
}

impl CardPatch {
    pub fn validate(self) -> Result<ValidatedPatch, StoreError> {
        if let Some(gap) = &self.gap {
            if gap.trim().is_empty() {
                return Err(StoreError::validation("gap", gap));
            }
        }
        Ok(ValidatedPatch {
            status: self.status.as_deref().map(str::parse::<Status>).transpose()?,
            priority: self.priority.as_deref().map(str::parse::<Priority>).transpose()?,
            novelty_score: self.novelty_score.map(check_novelty).transpose()?,
            tags: self.tags.map(clean_tags),
            gap: self.gap,
            context: self.context,
            source_citation: self.source_citation,
            source_url: self.source_url,
            proposed_solution: self.proposed_solution,
            domain: self.domain,
            assignee: self.assignee,
        })
    }
}

impl ValidatedPatch {
    pub fn is_empty(&self) -> bool {
        self.gap.is_none()
            && self.context.is_none()
            && self.source_citation.is_none()
            && self.source_url.is_none()
            && self.proposed_solution.is_none()
            && self.novelty_score.is_none()
            && self.domain.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.assignee.is_none()
    }

    pub fn apply_to(&self, card: &mut GapRecord) {
        if let Some(v) = &self.gap {
            card.gap = v.clone();
        }
        if let Some(v) = &self.context {
            card.context = v.clone();
        }
        if let Some(v) = &self.source_citation {
            card.source_citation = v.clone();
        }
        if let Some(v) = &self.source_url {
            card.source_url = v.clone();
        }
        if let Some(v) = &self.proposed_solution {
            card.proposed_solution = v.clone();
        }
        if let Some(v) = self.novelty_score {
            card.novelty_score = v;
        }
        if let Some(v) = &self.domain {
            card.domain = v.clone();
        }
        if let Some(v) = self.status {
            card.status = v;
        }
        if let Some(v) = self.priority {
            card.priority = v;
        }
        if let Some(v) = &self.tags {
            card.tags = v.clone();
        }
        if let Some(v) = &self.assignee {
            // empty string clears the assignee
            card.assignee = (!v.trim().is_empty()).then(|| v.clone());
        }
        card.updated_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Bookmarked,
    Dismissed,
    Upvoted,
    Downvoted,
}

impl FeedbackAction {
    pub const ALL: [FeedbackAction; 4] = [
        FeedbackAction::Bookmarked,
        FeedbackAction::Dismissed,
        FeedbackAction::Upvoted,
        FeedbackAction::Downvoted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::Bookmarked => "bookmarked",
            FeedbackAction::Dismissed => "dismissed",
            FeedbackAction::Upvoted => "upvoted",
            FeedbackAction::Downvoted => "downvoted",
        }
    }
}

impl FromStr for FeedbackAction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackAction::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| StoreError::validation("action", s))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub card_gap: String,
    pub domain: String,
    pub action: String,
}

impl FeedbackRequest {
    pub fn into_entry(self) -> Result<FeedbackEntry, StoreError> {
        Ok(FeedbackEntry {
            id: None,
            action: self.action.parse::<FeedbackAction>()?,
            card_gap: self.card_gap,
            domain: self.domain,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Store-assigned; absent until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub card_gap: String,
    pub domain: String,
    pub action: FeedbackAction,
    pub timestamp: DateTime<Utc>,
}

/// Per-domain feedback aggregate. The gap lists are most-recent-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub domain: String,
    pub total: usize,
    pub counts: BTreeMap<FeedbackAction, usize>,
    pub bookmarked: Vec<String>,
    pub dismissed: Vec<String>,
}

impl FeedbackStats {
    /// `entries` in insertion (oldest-first) order.
    pub fn from_entries<'a>(domain: &str, entries: impl DoubleEndedIterator<Item = &'a FeedbackEntry>) -> Self {
        let mut stats = FeedbackStats {
            domain: domain.to_string(),
            ..Default::default()
        };
        for e in entries.rev().filter(|e| e.domain == domain) {
            stats.total += 1;
            *stats.counts.entry(e.action).or_default() += 1;
            match e.action {
                FeedbackAction::Bookmarked => stats.bookmarked.push(e.card_gap.clone()),
                FeedbackAction::Dismissed => stats.dismissed.push(e.card_gap.clone()),
                _ => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacklogStats {
    pub total_cards: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_domain: BTreeMap<String, usize>,
}

impl BacklogStats {
    pub fn from_cards<'a>(cards: impl Iterator<Item = &'a GapRecord>) -> Self {
        let mut stats = BacklogStats::default();
        for c in cards {
            stats.total_cards += 1;
            *stats.by_status.entry(c.status).or_default() += 1;
            *stats.by_priority.entry(c.priority).or_default() += 1;
            *stats.by_domain.entry(c.domain.clone()).or_default() += 1;
        }
        stats
    }
}

/// Conjunctive backlog filter; `tags` matches any-of.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub domain: Option<String>,
    pub tags: Vec<String>,
}

impl CardFilter {
    /// Build from raw query values; `tags` is comma-separated.
    pub fn parse(
        status: Option<&str>,
        priority: Option<&str>,
        domain: Option<&str>,
        tags: Option<&str>,
    ) -> Result<Self, StoreError> {
        fn non_empty<'a>(s: Option<&'a str>) -> Option<&'a str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        Ok(CardFilter {
            status: non_empty(status).map(str::parse::<Status>).transpose()?,
            priority: non_empty(priority).map(str::parse::<Priority>).transpose()?,
            domain: non_empty(domain).map(str::to_string),
            tags: non_empty(tags)
                .map(|t| {
                    t.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn matches(&self, card: &GapRecord) -> bool {
        self.status.map_or(true, |s| card.status == s)
            && self.priority.map_or(true, |p| card.priority == p)
            && self.domain.as_deref().map_or(true, |d| card.domain == d)
            && (self.tags.is_empty() || self.tags.iter().any(|t| card.tags.contains(t)))
    }
}
