/// Sponsor Skip - Rust Implementation
///
/// Tiered sponsor-segment detection (description chapters, community database,
/// transcript heuristics) feeding a real-time playback skip controller.

pub mod config;
pub mod error;
pub mod timecode;
pub mod segments;
pub mod retry;
pub mod detection;
pub mod playback;
pub mod session;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Result, SkipError};
pub use crate::segments::{normalize, Cue, Segment, SPONSOR_CATEGORY};
pub use crate::retry::{with_retry, Backoff, RetryPolicy};
pub use crate::detection::{
    ChapterScraper, CommunityDatabaseClient, DetectionOutcome, PageSource, RuleSet, SegmentCache,
    SegmentSource, Tier, TieredFetcher, TranscriptDetector, TranscriptSource, TranscriptTier,
};
pub use crate::playback::{
    ActionMode, Clock, ControllerConfig, ControllerState, PlaybackSurface, SkipController, SkipEvent,
    SkipStats, SystemClock, UserSettings,
};
pub use crate::session::{
    content_id_from_url, run_detection, ControlMessage, ControlReply, DetectionResult,
    DetectionTicket, PageState, PlaybackSession,
};
