// src/extract/prompt.rs
//! Prompt rendering for gap extraction.

use std::fmt::Write as _;

use crate::extract::llm::Message;
use crate::sources::types::SourceRecord;
use crate::sources::{normalize_text, truncate_chars};
use crate::store::FeedbackStats;

pub const SOURCE_HEADER: &str = "--- Source ";
pub const TITLE_PREFIX: &str = "Title: ";
pub const URL_PREFIX: &str = "URL: ";
pub const SNIPPET_PREFIX: &str = "Content Snippet: ";
pub const DOMAIN_PREFIX: &str = "Domain: ";
pub const SUB_TOPIC_PREFIX: &str = "Sub-topic: ";

/// Upper bound on bookmarked and on dismissed hints, whatever the config says.
pub const MAX_FEEDBACK_HINTS: usize = 5;

const OUTPUT_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{"cards": [{"gap": string, "context": string, "source_citation": string, "source_url": string, "proposed_solution": string, "novelty_score": number between 1 and 10}]}"#;

const GAP_SYSTEM: &str = "You are a Senior Research Analyst. Identify the most significant UNSOLVED PROBLEMS or LIMITATIONS in the supplied sources. Focus on 'future work' and 'limitations' sections of papers and on unsolved bugs or challenges discussed in technical threads.";

const GAP_RULES: &str = "Rules:
- source_citation must be copied verbatim from the Title line of the source you used.
- source_url must be copied verbatim from that source's URL line, or left empty if it has none.
- Skip sources that are not relevant to the domain.
- Returning zero cards ({\"cards\": []}) is acceptable.";

const SINGLE_SYSTEM: &str = "You are a Senior Research Analyst. Describe one concrete, currently unsolved research problem for the given sub-topic.";

/// Enumerated context block: 1-based index, title, URL when present, snippet.
pub fn render_sources(records: &[SourceRecord], snippet_chars: usize) -> String {
    let mut out = String::new();
    for (i, rec) in records.iter().enumerate() {
        let _ = writeln!(out, "{SOURCE_HEADER}{} ---", i + 1);
        let _ = writeln!(out, "{TITLE_PREFIX}{}", rec.title());
        if let Some(url) = rec.url() {
            let _ = writeln!(out, "{URL_PREFIX}{url}");
        }
        let snippet = truncate_chars(&normalize_text(rec.body()), snippet_chars);
        let _ = writeln!(out, "{SNIPPET_PREFIX}{snippet}");
        out.push('\n');
    }
    out
}

/// Preference hints from prior feedback; `None` when there is nothing to say.
/// `max_hints` is clamped to `MAX_FEEDBACK_HINTS`.
pub fn render_feedback(stats: &FeedbackStats, max_hints: usize) -> Option<String> {
    let max_hints = max_hints.min(MAX_FEEDBACK_HINTS);
    let liked: Vec<&String> = stats.bookmarked.iter().take(max_hints).collect();
    let disliked: Vec<&String> = stats.dismissed.iter().take(max_hints).collect();
    if liked.is_empty() && disliked.is_empty() {
        return None;
    }

    let mut out = String::from("USER PREFERENCES (from earlier feedback):\n");
    if !liked.is_empty() {
        out.push_str("The user found these gaps valuable; prefer similar ones:\n");
        for g in liked {
            let _ = writeln!(out, "- {g}");
        }
    }
    if !disliked.is_empty() {
        out.push_str("The user dismissed these gaps; avoid similar ones:\n");
        for g in disliked {
            let _ = writeln!(out, "- {g}");
        }
    }
    Some(out)
}

pub fn gap_messages(
    domain: &str,
    records: &[SourceRecord],
    feedback: &FeedbackStats,
    snippet_chars: usize,
    max_hints: usize,
) -> Vec<Message> {
    let mut user = String::new();
    let _ = writeln!(user, "{DOMAIN_PREFIX}{domain}\n");
    user.push_str(GAP_RULES);
    user.push_str("\n\n");
    if let Some(prefs) = render_feedback(feedback, max_hints) {
        user.push_str(&prefs);
        user.push('\n');
    }
    user.push_str("SOURCES:\n");
    user.push_str(&render_sources(records, snippet_chars));
    user.push_str(OUTPUT_CONTRACT);

    vec![Message::system(GAP_SYSTEM), Message::user(user)]
}

pub fn single_card_messages(domain: &str, sub_topic: &str) -> Vec<Message> {
    let user = format!(
        "{DOMAIN_PREFIX}{domain}\n{SUB_TOPIC_PREFIX}{sub_topic}\n\nReturn exactly one card; use a short description of where the problem is discussed as source_citation.\n{OUTPUT_CONTRACT}"
    );
    vec![Message::system(SINGLE_SYSTEM), Message::user(user)]
}
