/// Skip controller: turns canonical segments and time samples into skip/mute actions
use super::{
    ActionMode, Clock, ControllerState, PlaybackSurface, SkipEvent, SkipStats, SystemClock, Throttle,
    UserSettings,
};
use crate::segments::Segment;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timing knobs for the controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// Minimum time before the same segment may act again while still inside it (ms)
    pub cooldown_ms: u64,
    /// Minimum interval between processed time-update samples (ms)
    pub throttle_ms: u64,
    /// Seconds before a segment start at which it is announced as approaching
    pub lookahead_seconds: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 3000,
            throttle_ms: 500,
            lookahead_seconds: 2.0,
        }
    }
}

/// One-shot volume restore registered by a mute action
#[derive(Debug, Clone)]
struct PendingUnmute {
    index: usize,
    start: f64,
    end: f64,
    restore_volume: f64,
}

/// Per-view state machine over the canonical segment list
pub struct SkipController<C: Clock = SystemClock> {
    clock: C,
    config: ControllerConfig,
    settings: UserSettings,
    segments: Vec<Segment>,
    state: ControllerState,
    acted: HashSet<usize>,
    last_action: HashMap<usize, Instant>,
    announced: Option<usize>,
    ad_playing: bool,
    throttle: Throttle,
    pending_unmute: Option<PendingUnmute>,
    stats: SkipStats,
}

impl SkipController<SystemClock> {
    pub fn new(config: ControllerConfig, settings: UserSettings) -> Self {
        Self::with_clock(config, settings, SystemClock)
    }
}

impl<C: Clock> SkipController<C> {
    pub fn with_clock(config: ControllerConfig, settings: UserSettings, clock: C) -> Self {
        let throttle = Throttle::new(Duration::from_millis(config.throttle_ms));
        Self {
            clock,
            config,
            settings,
            segments: Vec::new(),
            state: ControllerState::Idle,
            acted: HashSet::new(),
            last_action: HashMap::new(),
            announced: None,
            ad_playing: false,
            throttle,
            pending_unmute: None,
            stats: SkipStats::default(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn settings(&self) -> UserSettings {
        self.settings
    }

    pub fn stats(&self) -> SkipStats {
        self.stats
    }

    pub fn is_muted(&self) -> bool {
        self.pending_unmute.is_some()
    }

    /// Load the canonical segments for this view, resetting markers and statistics
    pub fn load_segments(&mut self, segments: Vec<Segment>) {
        info!("🎯 Loaded {} segments", segments.len());
        self.segments = segments;
        self.acted.clear();
        self.last_action.clear();
        self.announced = None;
        self.throttle.reset();
        self.stats = SkipStats::default();
        self.state = if self.segments.is_empty() {
            ControllerState::Idle
        } else {
            ControllerState::Armed
        };
    }

    /// Cached advertisement flag; samples are ignored while it is set
    pub fn set_ad_playing(&mut self, playing: bool) {
        if self.ad_playing != playing {
            debug!("Advertisement playing: {}", playing);
        }
        self.ad_playing = playing;
    }

    /// Apply new settings. Leaving mute mode (or disabling) restores the
    /// volume; when a surface is given and acting is possible, the current
    /// position is evaluated immediately.
    pub fn apply_settings(
        &mut self,
        settings: UserSettings,
        surface: Option<&mut dyn PlaybackSurface>,
    ) -> Vec<SkipEvent> {
        let previous = self.settings;
        self.settings = settings;
        info!("⚙️ Settings updated: enabled={} action={:?}", settings.enabled, settings.action);

        let mut events = Vec::new();
        let Some(surface) = surface else {
            return events;
        };

        let leaving_mute = previous.action == ActionMode::Mute
            && (settings.action != ActionMode::Mute || !settings.enabled);
        if leaving_mute {
            events.extend(self.restore_volume(surface));
        }

        if settings.enabled && settings.action != ActionMode::Ignore {
            let now = self.clock.now();
            events.extend(self.evaluate(surface, now));
        }
        events
    }

    /// Throttled time-update sample
    pub fn on_time_update(&mut self, surface: &mut dyn PlaybackSurface) -> Vec<SkipEvent> {
        let mut events: Vec<SkipEvent> = self.check_pending_unmute(surface).into_iter().collect();

        let now = self.clock.now();
        if !self.throttle.ready(now) {
            return events;
        }
        events.extend(self.evaluate(surface, now));
        events
    }

    /// Seek completed: evaluate immediately, bypassing the throttle
    pub fn on_seeked(&mut self, surface: &mut dyn PlaybackSurface) -> Vec<SkipEvent> {
        self.evaluate_now(surface)
    }

    /// Unthrottled evaluation of the current position
    pub fn evaluate_now(&mut self, surface: &mut dyn PlaybackSurface) -> Vec<SkipEvent> {
        let mut events: Vec<SkipEvent> = self.check_pending_unmute(surface).into_iter().collect();
        let now = self.clock.now();
        events.extend(self.evaluate(surface, now));
        events
    }

    /// Release everything this view holds: volume restored, segments and markers dropped.
    ///
    /// A failed volume restore is retried once; after that the pending unmute
    /// is dropped with a warning, leaving the player muted.
    pub fn teardown(&mut self, surface: Option<&mut dyn PlaybackSurface>) {
        match surface {
            Some(surface) if self.pending_unmute.is_some() => {
                if self.restore_volume(surface).is_none() && self.restore_volume(surface).is_none() {
                    if let Some(pending) = self.pending_unmute.take() {
                        warn!(
                            "⚠️ Volume left muted after teardown, could not restore {:.2}",
                            pending.restore_volume
                        );
                    }
                }
            }
            Some(_) => {}
            None => {
                if let Some(pending) = self.pending_unmute.take() {
                    warn!(
                        "⚠️ Volume left muted after teardown, no surface to restore {:.2} on",
                        pending.restore_volume
                    );
                }
            }
        }
        self.segments.clear();
        self.acted.clear();
        self.last_action.clear();
        self.announced = None;
        self.throttle.reset();
        self.state = ControllerState::Idle;
        debug!("Controller torn down");
    }

    fn evaluate(&mut self, surface: &mut dyn PlaybackSurface, now: Instant) -> Vec<SkipEvent> {
        let mut events = Vec::new();

        if self.ad_playing {
            debug!("Advertisement playing, skipping evaluation");
            return events;
        }
        if !self.settings.enabled || self.segments.is_empty() {
            return events;
        }

        let time = surface.current_time();
        if !time.is_finite() {
            return events;
        }

        let mut inside = None;
        for index in 0..self.segments.len() {
            if self.segments[index].contains(time) {
                inside = Some(index);
            } else if self.acted.remove(&index) {
                debug!("Cleared acted marker for segment {} (playback left it)", index);
            }
        }

        match inside {
            Some(index) => {
                self.announced = None;
                self.state = ControllerState::Acting { index };
                if self.is_eligible(index, now) {
                    events.extend(self.act(index, time, surface, now));
                }
            }
            None => events.extend(self.check_approaching(time)),
        }

        events
    }

    fn is_eligible(&self, index: usize, now: Instant) -> bool {
        if self.pending_unmute.as_ref().map_or(false, |p| p.index == index) {
            return false;
        }
        if !self.acted.contains(&index) {
            return true;
        }
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        self.last_action
            .get(&index)
            .map_or(true, |at| now.saturating_duration_since(*at) > cooldown)
    }

    fn mark_acted(&mut self, index: usize, now: Instant) {
        self.acted.insert(index);
        self.last_action.insert(index, now);
    }

    fn act(
        &mut self,
        index: usize,
        time: f64,
        surface: &mut dyn PlaybackSurface,
        now: Instant,
    ) -> Vec<SkipEvent> {
        let segment = self.segments[index].clone();
        let mut events = Vec::new();

        match self.settings.action {
            ActionMode::Skip => {
                events.extend(self.restore_volume(surface));
                match surface.seek(segment.end) {
                    Ok(()) => {
                        self.mark_acted(index, now);
                        self.record(&segment);
                        self.state = ControllerState::Armed;
                        info!("⏭️ Skipped segment {} ({:.1}s → {:.1}s)", index, time, segment.end);
                        events.push(SkipEvent::Skipped {
                            index,
                            from: time,
                            to: segment.end,
                        });
                    }
                    Err(e) => warn!("❌ Skip of segment {} failed: {}", index, e),
                }
            }
            ActionMode::Mute => {
                let restore_volume = match &self.pending_unmute {
                    Some(pending) => pending.restore_volume,
                    None => surface.volume(),
                };
                match surface.set_volume(0.0) {
                    Ok(()) => {
                        self.pending_unmute = Some(PendingUnmute {
                            index,
                            start: segment.start,
                            end: segment.end,
                            restore_volume,
                        });
                        self.mark_acted(index, now);
                        self.record(&segment);
                        info!("🔇 Muted segment {} until {:.1}s", index, segment.end);
                        events.push(SkipEvent::Muted {
                            index,
                            until: segment.end,
                        });
                    }
                    Err(e) => warn!("❌ Mute of segment {} failed: {}", index, e),
                }
            }
            ActionMode::Ignore => {
                self.mark_acted(index, now);
                info!("👀 Inside segment {} ({:.1}s-{:.1}s), ignoring", index, segment.start, segment.end);
                events.push(SkipEvent::Observed { index });
            }
        }

        events
    }

    fn record(&mut self, segment: &Segment) {
        self.stats.total_actions += 1;
        self.stats.total_seconds_saved += segment.duration();
    }

    fn check_approaching(&mut self, time: f64) -> Option<SkipEvent> {
        let upcoming = self
            .segments
            .iter()
            .enumerate()
            .find(|(_, s)| s.start > time && s.start - time <= self.config.lookahead_seconds)
            .map(|(index, s)| (index, s.start - time));

        match upcoming {
            Some((index, seconds_until)) => {
                self.state = ControllerState::Approaching { index };
                if self.announced == Some(index) {
                    return None;
                }
                self.announced = Some(index);
                debug!("Segment {} starts in {:.1}s", index, seconds_until);
                Some(SkipEvent::Approaching { index, seconds_until })
            }
            None => {
                self.announced = None;
                self.state = ControllerState::Armed;
                None
            }
        }
    }

    /// The one-shot restore: fires once playback passes the muted segment's end
    /// (or seeks back before its start), then unregisters itself
    fn check_pending_unmute(&mut self, surface: &mut dyn PlaybackSurface) -> Option<SkipEvent> {
        let pending = self.pending_unmute.as_ref()?;
        let time = surface.current_time();
        if time >= pending.start && time < pending.end {
            return None;
        }
        self.restore_volume(surface)
    }

    fn restore_volume(&mut self, surface: &mut dyn PlaybackSurface) -> Option<SkipEvent> {
        let pending = self.pending_unmute.take()?;
        match surface.set_volume(pending.restore_volume) {
            Ok(()) => {
                info!("🔊 Volume restored to {:.2}", pending.restore_volume);
                Some(SkipEvent::Unmuted {
                    index: pending.index,
                    volume: pending.restore_volume,
                })
            }
            Err(e) => {
                warn!("❌ Failed to restore volume: {}", e);
                self.pending_unmute = Some(pending);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SkipError};
    use crate::playback::ManualClock;

    #[derive(Default)]
    struct MockSurface {
        time: f64,
        volume: f64,
        seeks: Vec<f64>,
        volume_writes: Vec<f64>,
        fail_writes: bool,
        /// Volume writes to reject before accepting again
        volume_failures: usize,
    }

    impl MockSurface {
        fn at(time: f64) -> Self {
            Self { time, volume: 0.8, ..Default::default() }
        }
    }

    impl PlaybackSurface for MockSurface {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn duration(&self) -> f64 {
            600.0
        }

        fn volume(&self) -> f64 {
            self.volume
        }

        fn set_volume(&mut self, volume: f64) -> Result<()> {
            if self.volume_failures > 0 {
                self.volume_failures -= 1;
                return Err(SkipError::Surface("volume write rejected".to_string()));
            }
            if self.fail_writes {
                return Err(SkipError::Surface("volume write rejected".to_string()));
            }
            self.volume = volume;
            self.volume_writes.push(volume);
            Ok(())
        }

        fn seek(&mut self, time: f64) -> Result<()> {
            if self.fail_writes {
                return Err(SkipError::Surface("currentTime write rejected".to_string()));
            }
            self.time = time;
            self.seeks.push(time);
            Ok(())
        }
    }

    fn controller(action: ActionMode) -> (SkipController<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut controller = SkipController::with_clock(
            ControllerConfig::default(),
            UserSettings { enabled: true, action },
            clock.clone(),
        );
        controller.load_segments(vec![Segment::new(5.0, 10.0), Segment::new(30.0, 40.0)]);
        (controller, clock)
    }

    #[test]
    fn test_skip_fires_once_within_cooldown() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(7.0);

        let events = controller.on_time_update(&mut surface);
        assert_eq!(events, vec![SkipEvent::Skipped { index: 0, from: 7.0, to: 10.0 }]);
        assert_eq!(surface.seeks, vec![10.0]);

        clock.advance(Duration::from_millis(600));
        surface.time = 7.1;
        assert!(controller.on_time_update(&mut surface).is_empty());
        assert_eq!(surface.seeks, vec![10.0]);
    }

    #[test]
    fn test_skip_refires_after_cooldown() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(7.0);
        controller.on_time_update(&mut surface);

        clock.advance(Duration::from_millis(3100));
        surface.time = 7.5;
        controller.on_time_update(&mut surface);
        assert_eq!(surface.seeks, vec![10.0, 10.0]);
        assert_eq!(controller.stats().total_actions, 2);
    }

    #[test]
    fn test_leaving_segment_clears_marker_for_reentry() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(7.0);
        controller.on_time_update(&mut surface);

        // Playback now sits at the segment end, outside it
        clock.advance(Duration::from_millis(600));
        controller.on_time_update(&mut surface);

        // User seeks back in well within the cooldown
        surface.time = 6.0;
        controller.on_seeked(&mut surface);
        assert_eq!(surface.seeks, vec![10.0, 10.0]);
    }

    #[test]
    fn test_throttle_drops_samples() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(1.0);
        controller.on_time_update(&mut surface);

        clock.advance(Duration::from_millis(100));
        surface.time = 6.0;
        assert!(controller.on_time_update(&mut surface).is_empty());
        assert!(surface.seeks.is_empty());

        clock.advance(Duration::from_millis(500));
        controller.on_time_update(&mut surface);
        assert_eq!(surface.seeks, vec![10.0]);
    }

    #[test]
    fn test_mute_and_restore() {
        let (mut controller, clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(31.0);

        let events = controller.on_time_update(&mut surface);
        assert_eq!(events, vec![SkipEvent::Muted { index: 1, until: 40.0 }]);
        assert_eq!(surface.volume, 0.0);
        assert!(controller.is_muted());

        // Staying inside past the cooldown does not re-mute or re-count
        clock.advance(Duration::from_secs(5));
        surface.time = 36.0;
        assert!(controller.on_time_update(&mut surface).is_empty());
        assert_eq!(controller.stats().total_actions, 1);

        // Raw update past the end restores even inside the throttle window
        surface.time = 40.2;
        let events = controller.on_time_update(&mut surface);
        assert_eq!(events, vec![SkipEvent::Unmuted { index: 1, volume: 0.8 }]);
        assert_eq!(surface.volume, 0.8);
        assert!(!controller.is_muted());
        assert_eq!(controller.stats().total_seconds_saved, 10.0);
    }

    #[test]
    fn test_seeking_back_out_of_muted_segment_restores_volume() {
        let (mut controller, _clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(32.0);
        controller.on_time_update(&mut surface);

        surface.time = 20.0;
        let events = controller.on_seeked(&mut surface);
        assert!(events.contains(&SkipEvent::Unmuted { index: 1, volume: 0.8 }));
        assert_eq!(surface.volume, 0.8);
    }

    #[test]
    fn test_ignore_observes_without_counting() {
        let (mut controller, _clock) = controller(ActionMode::Ignore);
        let mut surface = MockSurface::at(8.0);

        let events = controller.on_time_update(&mut surface);
        assert_eq!(events, vec![SkipEvent::Observed { index: 0 }]);
        assert!(surface.seeks.is_empty());
        assert_eq!(controller.stats(), SkipStats::default());
        assert_eq!(controller.state(), ControllerState::Acting { index: 0 });
    }

    #[test]
    fn test_ad_and_disabled_suppress_actions() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(7.0);

        controller.set_ad_playing(true);
        assert!(controller.on_time_update(&mut surface).is_empty());

        controller.set_ad_playing(false);
        controller.apply_settings(UserSettings { enabled: false, action: ActionMode::Skip }, None);
        clock.advance(Duration::from_secs(1));
        assert!(controller.on_time_update(&mut surface).is_empty());
        assert!(surface.seeks.is_empty());

        // Re-enabling with a surface acts immediately
        let events = controller.apply_settings(UserSettings::default(), Some(&mut surface));
        assert_eq!(events, vec![SkipEvent::Skipped { index: 0, from: 7.0, to: 10.0 }]);
    }

    #[test]
    fn test_surface_failure_is_not_fatal() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(7.0);
        surface.fail_writes = true;

        assert!(controller.on_time_update(&mut surface).is_empty());
        assert_eq!(controller.stats().total_actions, 0);

        surface.fail_writes = false;
        clock.advance(Duration::from_millis(600));
        controller.on_time_update(&mut surface);
        assert_eq!(surface.seeks, vec![10.0]);
    }

    #[test]
    fn test_switching_from_mute_to_skip_restores_volume() {
        let (mut controller, _clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(33.0);
        controller.on_time_update(&mut surface);

        let events = controller.apply_settings(UserSettings::default(), Some(&mut surface));
        assert_eq!(events[0], SkipEvent::Unmuted { index: 1, volume: 0.8 });
        assert_eq!(surface.volume, 0.8);
        // Still inside the segment, but it was already acted on within the cooldown
        assert!(surface.seeks.is_empty());
    }

    #[test]
    fn test_approaching_is_announced_once() {
        let (mut controller, clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(3.5);

        let events = controller.on_time_update(&mut surface);
        assert_eq!(events, vec![SkipEvent::Approaching { index: 0, seconds_until: 1.5 }]);
        assert_eq!(controller.state(), ControllerState::Approaching { index: 0 });

        clock.advance(Duration::from_millis(600));
        surface.time = 4.0;
        assert!(controller.on_time_update(&mut surface).is_empty());

        clock.advance(Duration::from_millis(600));
        surface.time = 15.0;
        controller.on_time_update(&mut surface);
        assert_eq!(controller.state(), ControllerState::Armed);
    }

    #[test]
    fn test_load_segments_resets_stats_and_state() {
        let (mut controller, _clock) = controller(ActionMode::Skip);
        let mut surface = MockSurface::at(7.0);
        controller.on_time_update(&mut surface);
        assert_eq!(controller.stats().total_actions, 1);

        controller.load_segments(Vec::new());
        assert_eq!(controller.stats(), SkipStats::default());
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_teardown_restores_volume() {
        let (mut controller, _clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(6.0);
        controller.on_time_update(&mut surface);
        assert_eq!(surface.volume, 0.0);

        controller.teardown(Some(&mut surface));
        assert_eq!(surface.volume, 0.8);
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.segments().is_empty());
    }

    #[test]
    fn test_teardown_retries_a_failed_restore_once() {
        let (mut controller, _clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(6.0);
        controller.on_time_update(&mut surface);
        assert!(controller.is_muted());

        surface.volume_failures = 1;
        controller.teardown(Some(&mut surface));
        assert_eq!(surface.volume, 0.8);
        assert_eq!(surface.volume_failures, 0);
        assert!(!controller.is_muted());
    }

    #[test]
    fn test_teardown_gives_up_when_restore_keeps_failing() {
        let (mut controller, _clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(6.0);
        controller.on_time_update(&mut surface);

        surface.volume_failures = 2;
        controller.teardown(Some(&mut surface));
        assert_eq!(surface.volume, 0.0);
        assert_eq!(surface.volume_writes, vec![0.0]);
        assert!(!controller.is_muted());
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.segments().is_empty());
    }

    #[test]
    fn test_teardown_without_surface_drops_pending_unmute() {
        let (mut controller, _clock) = controller(ActionMode::Mute);
        let mut surface = MockSurface::at(6.0);
        controller.on_time_update(&mut surface);

        controller.teardown(None);
        assert!(!controller.is_muted());
        assert_eq!(controller.state(), ControllerState::Idle);
    }
}
