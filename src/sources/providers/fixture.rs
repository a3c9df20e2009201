// src/sources/providers/fixture.rs
//! In-memory adapter for tests and offline runs.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::sources::types::{SourceAdapter, SourceKind, SourceRecord};

/// Returns a fixed record list (ignores the query), or always fails.
pub struct StaticAdapter {
    kind: SourceKind,
    records: Vec<SourceRecord>,
    fail: bool,
    delay: Option<Duration>,
}

impl StaticAdapter {
    pub fn new(kind: SourceKind, records: Vec<SourceRecord>) -> Self {
        Self {
            kind,
            records,
            fail: false,
            delay: None,
        }
    }

    pub fn empty(kind: SourceKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn failing(kind: SourceKind) -> Self {
        Self {
            fail: true,
            ..Self::empty(kind)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SourceRecord>> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(anyhow!("static {} adapter configured to fail", self.kind));
        }
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}
