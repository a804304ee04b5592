/// Segment detection module
///
/// Three independent sources produce raw sponsor segments for a content ID:
/// chapters scraped from the video description, the community segment
/// database, and keyword heuristics over the transcript. The tiered fetcher
/// tries them in that fixed order and normalizes the first non-empty result.

pub mod rules;
pub mod transcript;
pub mod chapters;
pub mod database;
pub mod fetcher;
pub mod cache;
pub mod local;

// Re-export main types
pub use rules::{DetectionRule, RuleSet, RuleSetConfig};
pub use transcript::{DetectedSpan, TranscriptDetector, TranscriptSource, TranscriptTier};
pub use chapters::{ChapterScraper, PageSource};
pub use database::CommunityDatabaseClient;
pub use fetcher::{DetectionOutcome, TieredFetcher};
pub use cache::SegmentCache;

use crate::error::Result;
use crate::segments::Segment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The detection sources, in priority order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Chapters,
    Database,
    Transcript,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Chapters => "chapters",
            Tier::Database => "database",
            Tier::Transcript => "transcript",
        };
        f.write_str(name)
    }
}

/// A detection source producing raw (unnormalized) segments for a content ID
#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn fetch_segments(&self, content_id: &str) -> Result<Vec<Segment>>;
    fn tier(&self) -> Tier;
}
