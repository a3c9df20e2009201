//! # Engagement Normalizer
//! Maps each source's raw engagement average onto a common 0–100 scale.
//!
//! Every source kind has its own fixed calibration range (not derived from
//! observed data): linear min–max scaling, clamped to [0, 100]. A degenerate
//! range (`max <= min`) yields the neutral midpoint 50.

use serde::Deserialize;

use crate::sources::types::SourceKind;

/// Neutral score for a degenerate calibration range.
pub const NEUTRAL_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CalibrationRange {
    pub min: f64,
    pub max: f64,
}

impl CalibrationRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn scale(&self, value: f64) -> f64 {
        if self.max <= self.min {
            return NEUTRAL_SCORE;
        }
        let scaled = ((value - self.min) / (self.max - self.min)) * 100.0;
        if scaled.is_nan() {
            return 0.0;
        }
        scaled.clamp(0.0, 100.0)
    }
}

fn default_news() -> CalibrationRange {
    CalibrationRange::new(0.0, 200.0)
}
fn default_qa() -> CalibrationRange {
    CalibrationRange::new(0.0, 30.0)
}
fn default_forum() -> CalibrationRange {
    CalibrationRange::new(0.0, 100.0)
}

/// Per-source ranges: news average points, Q&A average score, forum average score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_news")]
    pub news: CalibrationRange,
    #[serde(default = "default_qa")]
    pub qa: CalibrationRange,
    #[serde(default = "default_forum")]
    pub forum: CalibrationRange,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            news: default_news(),
            qa: default_qa(),
            forum: default_forum(),
        }
    }
}

impl Calibration {
    pub fn range_for(&self, kind: SourceKind) -> Option<CalibrationRange> {
        match kind {
            SourceKind::News => Some(self.news),
            SourceKind::Qa => Some(self.qa),
            SourceKind::Forum => Some(self.forum),
            SourceKind::Paper | SourceKind::Message => None,
        }
    }

    /// Normalize an engagement average for `kind`. Kinds without a
    /// calibration range score neutral.
    pub fn normalize(&self, value: f64, kind: SourceKind) -> f64 {
        self.range_for(kind)
            .map(|r| r.scale(value))
            .unwrap_or(NEUTRAL_SCORE)
    }
}
