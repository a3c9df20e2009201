// src/research.rs
//! Publication metrics over a paper sample: monthly velocity, categories,
//! author frequency and month-over-month growth.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::pulse::{round1, PulseSnapshot};
use crate::sources::types::{Paper, SourceRecord};

pub const PAPER_SAMPLE: usize = 30;
const VELOCITY_MONTHS: usize = 6;
const TOP_N: usize = 10;
const RECENT_PAPERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityPoint {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorStat {
    pub name: String,
    pub paper_count: usize,
    pub field: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchMetrics {
    pub domain: String,
    pub total_papers_indexed: usize,
    pub top_categories: Vec<String>,
    pub top_authors: Vec<AuthorStat>,
    pub recent_papers: Vec<SourceRecord>,
    pub velocity_data: Vec<VelocityPoint>,
    pub growth_rate: f64,
    pub sentiment: PulseSnapshot,
    pub hackernews_mentions: usize,
    pub stackexchange_questions: usize,
}

fn papers_of(records: &[SourceRecord]) -> impl Iterator<Item = &Paper> {
    records.iter().filter_map(|r| match r {
        SourceRecord::Paper(p) => Some(p),
        _ => None,
    })
}

fn month_label(year: i32, month: time::Month) -> String {
    let name = month.to_string();
    format!("{} {year}", &name[..3]).to_uppercase()
}

/// Papers per month, chronological, last six months present in the sample.
/// Fewer than two distinct months collapses to a single `RECENT` point.
pub fn velocity(records: &[SourceRecord]) -> Vec<VelocityPoint> {
    let mut per_month: BTreeMap<(i32, u8), usize> = BTreeMap::new();
    for p in papers_of(records) {
        // unparsable dates are skipped
        if let Ok(ts) = OffsetDateTime::parse(&p.published, &Rfc3339) {
            *per_month.entry((ts.year(), ts.month() as u8)).or_default() += 1;
        }
    }

    if per_month.len() < 2 {
        return vec![VelocityPoint {
            name: "RECENT".to_string(),
            value: papers_of(records).count(),
        }];
    }

    let skip = per_month.len().saturating_sub(VELOCITY_MONTHS);
    per_month
        .into_iter()
        .skip(skip)
        .filter_map(|((year, month), n)| {
            let month = time::Month::try_from(month).ok()?;
            Some(VelocityPoint {
                name: month_label(year, month),
                value: n,
            })
        })
        .collect()
}

/// `(last - prev) / max(prev, 1) * 100`, one decimal; 0 below two points.
pub fn growth_rate(velocity: &[VelocityPoint]) -> f64 {
    match velocity {
        [.., prev, last] => {
            let prev_v = prev.value as f64;
            round1((last.value as f64 - prev_v) / prev_v.max(1.0) * 100.0)
        }
        _ => 0.0,
    }
}

/// Up to ten distinct categories, sorted.
pub fn top_categories(records: &[SourceRecord]) -> Vec<String> {
    papers_of(records)
        .flat_map(|p| p.categories.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(TOP_N)
        .collect()
}

/// Up to ten authors by paper count (ties by name); each is tagged with a
/// category, cycling through `categories`.
pub fn top_authors(records: &[SourceRecord], categories: &[String]) -> Vec<AuthorStat> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for p in papers_of(records) {
        for a in &p.authors {
            *counts.entry(a.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(TOP_N)
        .enumerate()
        .map(|(i, (name, n))| AuthorStat {
            name: name.to_string(),
            paper_count: n,
            field: if categories.is_empty() {
                "GENERAL".to_string()
            } else {
                categories[i % categories.len()].clone()
            },
        })
        .collect()
}

pub fn summarize(domain: &str, papers: Vec<SourceRecord>, pulse: PulseSnapshot) -> ResearchMetrics {
    let velocity_data = velocity(&papers);
    let top_categories = top_categories(&papers);
    let top_authors = top_authors(&papers, &top_categories);
    ResearchMetrics {
        domain: domain.to_string(),
        total_papers_indexed: papers.len(),
        growth_rate: growth_rate(&velocity_data),
        hackernews_mentions: pulse.sources.hackernews.total_stories,
        stackexchange_questions: pulse.sources.stackexchange.total_questions,
        recent_papers: papers.iter().take(RECENT_PAPERS).cloned().collect(),
        top_categories,
        top_authors,
        velocity_data,
        sentiment: pulse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(published: &str, authors: &[&str], cats: &[&str]) -> SourceRecord {
        SourceRecord::Paper(Paper {
            id: published.into(),
            title: "t".into(),
            summary: String::new(),
            authors: authors.iter().map(|s| s.to_string()).collect(),
            published: published.into(),
            url: None,
            categories: cats.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn velocity_is_chronological_and_labelled() {
        let papers = vec![
            paper("2024-03-02T10:00:00Z", &[], &[]),
            paper("2023-12-30T10:00:00Z", &[], &[]),
            paper("2024-03-20T10:00:00Z", &[], &[]),
            paper("not a date", &[], &[]),
        ];
        let v = velocity(&papers);
        assert_eq!(
            v,
            vec![
                VelocityPoint { name: "DEC 2023".into(), value: 1 },
                VelocityPoint { name: "MAR 2024".into(), value: 2 },
            ]
        );
        assert_eq!(growth_rate(&v), 100.0);
    }

    #[test]
    fn velocity_keeps_last_six_months() {
        let papers: Vec<_> = (1..=9)
            .map(|m| paper(&format!("2024-{m:02}-01T00:00:00Z"), &[], &[]))
            .collect();
        let v = velocity(&papers);
        assert_eq!(v.len(), 6);
        assert_eq!(v[0].name, "APR 2024");
        assert_eq!(v[5].name, "SEP 2024");
    }

    #[test]
    fn single_month_collapses_to_recent() {
        let papers = vec![
            paper("2024-03-02T10:00:00Z", &[], &[]),
            paper("2024-03-05T10:00:00Z", &[], &[]),
        ];
        let v = velocity(&papers);
        assert_eq!(v, vec![VelocityPoint { name: "RECENT".into(), value: 2 }]);
        assert_eq!(growth_rate(&v), 0.0);
    }

    #[test]
    fn growth_uses_one_as_floor_for_previous() {
        let v = vec![
            VelocityPoint { name: "A".into(), value: 0 },
            VelocityPoint { name: "B".into(), value: 3 },
        ];
        assert_eq!(growth_rate(&v), 300.0);
    }

    #[test]
    fn authors_ranked_and_tagged_with_cycling_fields() {
        let papers = vec![
            paper("2024-01-01T00:00:00Z", &["Zed", "Amy"], &["cs.LG", "stat.ML"]),
            paper("2024-01-01T00:00:00Z", &["Amy", "Bob"], &["cs.LG"]),
            paper("2024-01-01T00:00:00Z", &["Zed"], &["cs.AI"]),
        ];
        let cats = top_categories(&papers);
        assert_eq!(cats, vec!["cs.AI", "cs.LG", "stat.ML"]);
        let authors = top_authors(&papers, &cats);
        let names: Vec<_> = authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zed", "Bob"]);
        assert_eq!(authors[0].paper_count, 2);
        assert_eq!(authors[2].field, "stat.ML");
        assert_eq!(top_authors(&papers, &[])[0].field, "GENERAL");
    }
}
