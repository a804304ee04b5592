/// File-backed page and transcript sources for offline runs
use super::chapters::PageSource;
use super::transcript::{cues_from_panel, parse_json3, TranscriptSource};
use super::{SegmentSource, Tier};
use crate::error::{Result, SkipError};
use crate::segments::{Cue, Segment};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Saved description HTML plus a known video duration
pub struct FilePageSource {
    description_path: PathBuf,
    duration: Option<f64>,
}

impl FilePageSource {
    pub fn new(description_path: PathBuf, duration: Option<f64>) -> Self {
        Self {
            description_path,
            duration,
        }
    }
}

#[async_trait]
impl PageSource for FilePageSource {
    async fn description_html(&self) -> Result<String> {
        debug!("Reading description from {}", self.description_path.display());
        Ok(tokio::fs::read_to_string(&self.description_path).await?)
    }

    async fn video_duration(&self) -> Option<f64> {
        self.duration
    }
}

/// Saved transcript: json3 timed text (`.json`) or panel text with one
/// `M:SS<TAB>text` row per line
pub struct FileTranscriptSource {
    path: PathBuf,
}

impl FileTranscriptSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl TranscriptSource for FileTranscriptSource {
    async fn fetch_cues(&self) -> Result<Vec<Cue>> {
        let content = tokio::fs::read_to_string(&self.path).await?;

        if self.path.extension().map_or(false, |ext| ext == "json") {
            let raw: serde_json::Value = serde_json::from_str(&content)?;
            return Ok(parse_json3(&raw));
        }

        let rows: Vec<(&str, &str)> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split_once('\t').unwrap_or((line, "")))
            .collect();
        if rows.is_empty() {
            return Err(SkipError::Parse(format!("{} holds no transcript rows", self.path.display())));
        }
        Ok(cues_from_panel(rows))
    }
}

/// A tier switched off by configuration; always empty
pub struct DisabledSource {
    tier: Tier,
}

impl DisabledSource {
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }
}

#[async_trait]
impl SegmentSource for DisabledSource {
    async fn fetch_segments(&self, _content_id: &str) -> Result<Vec<Segment>> {
        debug!("{} tier disabled", self.tier);
        Ok(Vec::new())
    }

    fn tier(&self) -> Tier {
        self.tier
    }
}
