// src/pulse.rs
//! Composite pulse scorer.
//!
//! News, Q&A and forum engagement for a domain are fetched concurrently,
//! averaged per source, normalized with the configured calibration and
//! combined as `0.4*news + 0.3*forum + 0.3*qa + volume bonus`, clamped to
//! [0, 100] and rounded to one decimal.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::normalize::Calibration;
use crate::sources::types::{SourceKind, SourceRecord, Story};
use crate::sources::{fetch_or_empty, SourceSet};

pub const NEWS_SAMPLE: usize = 30;
pub const QA_SAMPLE: usize = 20;
pub const FORUM_SAMPLE: usize = 15;

const NEWS_WEIGHT: f64 = 0.4;
const FORUM_WEIGHT: f64 = 0.3;
const QA_WEIGHT: f64 = 0.3;
const TOP_STORIES: usize = 3;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!("pulse_score", "Most recently computed composite pulse score.");
        describe_counter!("pulse_computed_total", "Pulse computations.");
    });
}

/// Coarse interest label, a pure function of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseLabel {
    #[serde(rename = "DEAD END")]
    DeadEnd,
    #[serde(rename = "LOW INTEREST")]
    LowInterest,
    #[serde(rename = "GROWING")]
    Growing,
    #[serde(rename = "HOT TOPIC")]
    HotTopic,
    #[serde(rename = "BREAKTHROUGH")]
    Breakthrough,
}

impl PulseLabel {
    pub fn for_score(score: f64) -> Self {
        if score <= 25.0 {
            PulseLabel::DeadEnd
        } else if score <= 50.0 {
            PulseLabel::LowInterest
        } else if score <= 75.0 {
            PulseLabel::Growing
        } else if score <= 90.0 {
            PulseLabel::HotTopic
        } else {
            PulseLabel::Breakthrough
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PulseLabel::DeadEnd => "DEAD END",
            PulseLabel::LowInterest => "LOW INTEREST",
            PulseLabel::Growing => "GROWING",
            PulseLabel::HotTopic => "HOT TOPIC",
            PulseLabel::Breakthrough => "BREAKTHROUGH",
        }
    }
}

impl std::fmt::Display for PulseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to `digits` decimals on the exact binary value, so 0.15 (stored
/// just below) becomes 0.1. `(x * 10).round()` would give 0.2.
fn round_to(x: f64, digits: usize) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{x:.digits$}").parse().unwrap_or(x)
}

pub fn round1(x: f64) -> f64 {
    round_to(x, 1)
}

pub fn round2(x: f64) -> f64 {
    round_to(x, 2)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// +10 above 30 items, +5 above 15, else nothing.
pub fn volume_bonus(total_items: usize) -> f64 {
    if total_items > 30 {
        10.0
    } else if total_items > 15 {
        5.0
    } else {
        0.0
    }
}

/// Weighted composite over already-normalized per-source scores.
pub fn composite(news: f64, forum: f64, qa: f64, total_items: usize) -> f64 {
    let raw = NEWS_WEIGHT * news + FORUM_WEIGHT * forum + QA_WEIGHT * qa + volume_bonus(total_items);
    round1(raw.clamp(0.0, 100.0))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsSignals {
    pub avg_points: f64,
    pub avg_comments: f64,
    pub total_stories: usize,
    pub max_points: i64,
    #[serde(default)]
    pub top_stories: Vec<Story>,
}

impl NewsSignals {
    pub fn from_records(records: &[SourceRecord]) -> Self {
        let stories: Vec<&Story> = records
            .iter()
            .filter_map(|r| match r {
                SourceRecord::News(s) => Some(s),
                _ => None,
            })
            .collect();
        Self {
            avg_points: mean(stories.iter().map(|s| s.points as f64)),
            avg_comments: mean(stories.iter().map(|s| s.num_comments as f64)),
            total_stories: stories.len(),
            max_points: stories.iter().map(|s| s.points).max().unwrap_or(0),
            top_stories: stories.iter().take(TOP_STORIES).map(|s| (*s).clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumSignals {
    pub avg_score: f64,
    pub total_discussions: usize,
}

impl ForumSignals {
    pub fn from_records(records: &[SourceRecord]) -> Self {
        let scores: Vec<f64> = records
            .iter()
            .filter_map(|r| match r {
                SourceRecord::Forum(f) => Some(f.score as f64),
                _ => None,
            })
            .collect();
        Self {
            avg_score: mean(scores.iter().copied()),
            total_discussions: scores.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaSignals {
    pub avg_score: f64,
    pub avg_answers: f64,
    pub total_questions: usize,
    pub answered_ratio: f64,
}

impl QaSignals {
    pub fn from_records(records: &[SourceRecord]) -> Self {
        let questions: Vec<_> = records
            .iter()
            .filter_map(|r| match r {
                SourceRecord::Qa(q) => Some(q),
                _ => None,
            })
            .collect();
        let answered = questions.iter().filter(|q| q.is_answered).count();
        Self {
            avg_score: mean(questions.iter().map(|q| q.score as f64)),
            avg_answers: mean(questions.iter().map(|q| q.answer_count as f64)),
            total_questions: questions.len(),
            answered_ratio: if questions.is_empty() {
                0.0
            } else {
                answered as f64 / questions.len() as f64
            },
        }
    }
}

/// Per-source breakdown reported alongside the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseBreakdown {
    pub hackernews: NewsSignals,
    pub reddit: ForumSignals,
    pub stackexchange: QaSignals,
}

impl PulseBreakdown {
    pub fn total_items(&self) -> usize {
        self.hackernews.total_stories + self.reddit.total_discussions + self.stackexchange.total_questions
    }

    /// Composite score from the raw (unrounded) averages.
    pub fn score(&self, calibration: &Calibration) -> f64 {
        composite(
            calibration.normalize(self.hackernews.avg_points, SourceKind::News),
            calibration.normalize(self.reddit.avg_score, SourceKind::Forum),
            calibration.normalize(self.stackexchange.avg_score, SourceKind::Qa),
            self.total_items(),
        )
    }

    /// Reporting form: averages to 1 decimal, ratio to 2.
    pub fn rounded(mut self) -> Self {
        self.hackernews.avg_points = round1(self.hackernews.avg_points);
        self.hackernews.avg_comments = round1(self.hackernews.avg_comments);
        self.reddit.avg_score = round1(self.reddit.avg_score);
        self.stackexchange.avg_score = round1(self.stackexchange.avg_score);
        self.stackexchange.avg_answers = round1(self.stackexchange.avg_answers);
        self.stackexchange.answered_ratio = round2(self.stackexchange.answered_ratio);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    /// Store-assigned once saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub domain: String,
    pub score: f64,
    pub label: PulseLabel,
    pub sources: PulseBreakdown,
    pub timestamp: DateTime<Utc>,
}

impl PulseSnapshot {
    pub fn from_breakdown(domain: &str, breakdown: PulseBreakdown, calibration: &Calibration) -> Self {
        let score = breakdown.score(calibration);
        Self {
            id: None,
            domain: domain.to_string(),
            score,
            label: PulseLabel::for_score(score),
            sources: breakdown.rounded(),
            timestamp: Utc::now(),
        }
    }
}

/// Fetch news, Q&A and forum samples concurrently and score them. A failed
/// or empty source contributes zero items and a zero average.
pub async fn compute_pulse(sources: &SourceSet, calibration: &Calibration, domain: &str) -> PulseSnapshot {
    ensure_metrics_described();
    let (news, qa, forum) = tokio::join!(
        fetch_or_empty(sources.news.as_ref(), domain, NEWS_SAMPLE, sources.timeout),
        fetch_or_empty(sources.qa.as_ref(), domain, QA_SAMPLE, sources.timeout),
        fetch_or_empty(sources.forum.as_ref(), domain, FORUM_SAMPLE, sources.timeout),
    );

    let breakdown = PulseBreakdown {
        hackernews: NewsSignals::from_records(&news),
        reddit: ForumSignals::from_records(&forum),
        stackexchange: QaSignals::from_records(&qa),
    };
    let snapshot = PulseSnapshot::from_breakdown(domain, breakdown, calibration);

    counter!("pulse_computed_total").increment(1);
    gauge!("pulse_score").set(snapshot.score);
    info!(
        target: "pulse",
        domain,
        score = snapshot.score,
        label = snapshot.label.as_str(),
        items = snapshot.sources.total_items(),
        "pulse computed"
    );
    snapshot
}
