/// Segment and cue value types
///
/// Cues are the raw timed transcript units produced per video view; segments are
/// the time ranges the playback controller acts upon once normalized.

pub mod normalize;

pub use normalize::normalize;

use serde::{Deserialize, Serialize};

/// Category tag emitted by the transcript heuristics and kept from the database
pub const SPONSOR_CATEGORY: &str = "sponsor";

/// A single timed caption/transcript unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cue {
    /// Start time in seconds
    pub start: f64,
    /// Caption text, possibly empty
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }
}

/// A time range flagged for a skip/mute action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Optional category tag (e.g. "sponsor")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Segment {
    /// Uncategorized segment
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            category: None,
        }
    }

    pub fn with_category(start: f64, end: f64, category: impl Into<String>) -> Self {
        Self {
            start,
            end,
            category: Some(category.into()),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `time` falls in the half-open range `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Finite, non-negative start and `end > start`
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end > self.start
    }
}
