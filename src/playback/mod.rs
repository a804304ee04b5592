/// Playback control: the skip controller and the surfaces it talks to
///
/// The controller never touches a concrete player. It reads and writes through
/// [`PlaybackSurface`], reads time through [`Clock`], and reports what it did as
/// [`SkipEvent`]s for whatever notification layer the host provides.

pub mod controller;
pub mod throttle;

pub use controller::{ControllerConfig, SkipController};
pub use throttle::Throttle;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What to do when playback enters a segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Jump to the segment end
    #[default]
    Skip,
    /// Silence the segment, restoring the volume afterwards
    Mute,
    /// Observe only
    Ignore,
}

/// User-facing settings pushed to the controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub enabled: bool,
    #[serde(alias = "sponsorAction", default)]
    pub action: ActionMode,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            action: ActionMode::Skip,
        }
    }
}

/// Per-view statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SkipStats {
    pub total_actions: u64,
    pub total_seconds_saved: f64,
}

/// Controller state for the current view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No segments loaded
    Idle,
    /// Segments loaded, watching time updates
    Armed,
    /// Within the lookahead window before a segment
    Approaching { index: usize },
    /// Inside a segment
    Acting { index: usize },
}

/// Something the controller did or noticed, for the notification layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SkipEvent {
    #[serde(rename_all = "camelCase")]
    Approaching { index: usize, seconds_until: f64 },
    Skipped { index: usize, from: f64, to: f64 },
    Muted { index: usize, until: f64 },
    Unmuted { index: usize, volume: f64 },
    Observed { index: usize },
}

/// The live player: time, duration, volume and seeking
pub trait PlaybackSurface {
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64) -> Result<()>;
    fn seek(&mut self, time: f64) -> Result<()>;
}

/// Monotonic time source for cooldowns and throttling
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}
