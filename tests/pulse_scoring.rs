// tests/pulse_scoring.rs
//
// Composite pulse scoring against fixture adapters: empty, failing and slow
// sources degrade to zero; volume bonus kicks in with item counts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use frontier_map::normalize::{Calibration, CalibrationRange};
use frontier_map::pulse::{compute_pulse, PulseLabel};
use frontier_map::sources::providers::fixture::StaticAdapter;
use frontier_map::sources::types::{SourceKind, SourceRecord};
use frontier_map::sources::SourceSet;

use common::{empty_sources, heart_sources, post, question, story};

fn failing_sources() -> SourceSet {
    SourceSet {
        papers: Arc::new(StaticAdapter::failing(SourceKind::Paper)),
        forum: Arc::new(StaticAdapter::failing(SourceKind::Forum)),
        qa: Arc::new(StaticAdapter::failing(SourceKind::Qa)),
        news: Arc::new(StaticAdapter::failing(SourceKind::News)),
        messages: Arc::new(StaticAdapter::failing(SourceKind::Message)),
        timeout: Duration::from_secs(1),
    }
}

fn zero_stories(n: usize) -> Vec<SourceRecord> {
    (0..n).map(|i| story(&format!("story {i}"), 0)).collect()
}

#[tokio::test]
async fn empty_sources_score_zero_dead_end() {
    let snap = compute_pulse(&empty_sources(), &Calibration::default(), "nothing").await;
    assert_eq!(snap.score, 0.0);
    assert_eq!(snap.label, PulseLabel::DeadEnd);
    assert_eq!(snap.sources.total_items(), 0);
    assert_eq!(snap.sources.stackexchange.answered_ratio, 0.0);
}

#[tokio::test]
async fn failing_sources_degrade_to_zero() {
    let snap = compute_pulse(&failing_sources(), &Calibration::default(), "anything").await;
    assert_eq!(snap.score, 0.0);
    assert_eq!(snap.label, PulseLabel::DeadEnd);
    assert_eq!(snap.domain, "anything");
}

#[tokio::test]
async fn slow_source_is_cut_off_by_timeout() {
    let mut sources = heart_sources();
    sources.timeout = Duration::from_millis(50);
    sources.news = Arc::new(
        StaticAdapter::new(SourceKind::News, vec![story("late", 1_000)]).with_delay(Duration::from_millis(500)),
    );

    let snap = compute_pulse(&sources, &Calibration::default(), "heart").await;
    assert_eq!(snap.sources.hackernews.total_stories, 0, "timed-out source contributes nothing");
    // forum 50 -> 15, qa 15 -> 15
    assert_eq!(snap.score, 30.0);
    assert_eq!(snap.label, PulseLabel::LowInterest);
}

#[tokio::test]
async fn heart_fixture_scores_growing() {
    let snap = compute_pulse(&heart_sources(), &Calibration::default(), "heart").await;
    assert_eq!(snap.score, 70.0);
    assert_eq!(snap.label, PulseLabel::Growing);
    assert_eq!(snap.sources.hackernews.avg_comments, 20.0);
}

#[tokio::test]
async fn volume_bonus_applies_above_fifteen_and_thirty_items() {
    let mut sources = empty_sources();
    sources.news = Arc::new(StaticAdapter::new(SourceKind::News, zero_stories(16)));
    let snap = compute_pulse(&sources, &Calibration::default(), "d").await;
    assert_eq!(snap.score, 5.0);

    // 30 news (sample cap) + 1 question
    sources.news = Arc::new(StaticAdapter::new(SourceKind::News, zero_stories(40)));
    sources.qa = Arc::new(StaticAdapter::new(SourceKind::Qa, vec![question("q", 0, false)]));
    let snap = compute_pulse(&sources, &Calibration::default(), "d").await;
    assert_eq!(snap.sources.hackernews.total_stories, 30);
    assert_eq!(snap.score, 10.0);
}

#[tokio::test]
async fn score_is_clamped_to_one_hundred() {
    let mut sources = empty_sources();
    sources.news = Arc::new(StaticAdapter::new(
        SourceKind::News,
        (0..30).map(|i| story(&format!("s{i}"), 10_000)).collect(),
    ));
    sources.forum = Arc::new(StaticAdapter::new(
        SourceKind::Forum,
        (0..15).map(|i| post(&format!("p{i}"), "", 10_000)).collect(),
    ));
    sources.qa = Arc::new(StaticAdapter::new(
        SourceKind::Qa,
        (0..20).map(|i| question(&format!("q{i}"), 10_000, true)).collect(),
    ));

    let snap = compute_pulse(&sources, &Calibration::default(), "d").await;
    assert_eq!(snap.score, 100.0);
    assert_eq!(snap.label, PulseLabel::Breakthrough);
}

#[tokio::test]
async fn calibration_changes_the_scale() {
    let calibration = Calibration {
        news: CalibrationRange::new(0.0, 400.0),
        ..Calibration::default()
    };
    let snap = compute_pulse(&heart_sources(), &calibration, "heart").await;
    // news avg 200 -> 50 * 0.4 = 20
    assert_eq!(snap.score, 50.0);
    assert_eq!(snap.label, PulseLabel::LowInterest);
}
