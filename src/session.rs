/// Per-tab playback session: one controller per video view
///
/// The session tracks which content ID is active, tears the controller down on
/// navigation, and hands out [`DetectionTicket`]s so that a detection started
/// for an earlier view can never load its segments into a later one.
use crate::detection::{DetectionOutcome, TieredFetcher};
use crate::playback::{
    ActionMode, Clock, ControllerConfig, PlaybackSurface, SkipController, SkipEvent, SkipStats,
    SystemClock, UserSettings,
};
use crate::segments::Segment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

/// Read access to the page, for the generic "something changed" notification
pub trait PageState {
    fn current_content_id(&self) -> Option<String>;
}

/// Captured when detection starts; compared when it completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionTicket {
    pub content_id: String,
    pub generation: u64,
}

/// A finished detection run, still bound to the ticket it was started with
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub ticket: DetectionTicket,
    pub outcome: DetectionOutcome,
}

/// Run the tiered fetcher for a ticket. Feed the result back through
/// [`PlaybackSession::complete_detection`].
pub async fn run_detection(fetcher: &TieredFetcher, ticket: DetectionTicket) -> DetectionResult {
    info!("🚀 Detecting segments for {} (generation {})", ticket.content_id, ticket.generation);
    let outcome = fetcher.resolve(&ticket.content_id).await;
    DetectionResult { ticket, outcome }
}

/// Messages from the settings surface and the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SettingsUpdated { settings: UserSettings },
    GetStats,
    AdStateChanged { playing: bool },
    Navigated { url: String },
}

/// Replies, shaped the way the settings surface reads them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Settings {
        success: bool,
        enabled: bool,
        action: ActionMode,
        /// Actions the new settings triggered right away
        #[serde(skip_serializing_if = "Vec::is_empty")]
        events: Vec<SkipEvent>,
    },
    Stats(SkipStats),
    Navigation {
        ticket: Option<DetectionTicket>,
    },
    Ack,
}

/// Extract the content ID from a watch, shorts or short-link URL
pub fn content_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;

    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key.as_ref() == "v") {
        return non_empty(&id);
    }

    let mut path = url.path_segments()?;
    let host = url.host_str().unwrap_or_default();
    if host == "youtu.be" {
        return path.next().and_then(non_empty);
    }
    match path.next() {
        Some("shorts") | Some("embed") | Some("live") => path.next().and_then(non_empty),
        _ => None,
    }
}

fn non_empty(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

pub struct PlaybackSession<C: Clock + Clone = SystemClock> {
    clock: C,
    config: ControllerConfig,
    settings: UserSettings,
    ad_playing: bool,
    content_id: Option<String>,
    generation: u64,
    controller: SkipController<C>,
}

impl PlaybackSession<SystemClock> {
    pub fn new(config: ControllerConfig, settings: UserSettings) -> Self {
        Self::with_clock(config, settings, SystemClock)
    }
}

impl<C: Clock + Clone> PlaybackSession<C> {
    pub fn with_clock(config: ControllerConfig, settings: UserSettings, clock: C) -> Self {
        let controller = SkipController::with_clock(config.clone(), settings, clock.clone());
        Self {
            clock,
            config,
            settings,
            ad_playing: false,
            content_id: None,
            generation: 0,
            controller,
        }
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn controller(&self) -> &SkipController<C> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SkipController<C> {
        &mut self.controller
    }

    pub fn stats(&self) -> SkipStats {
        self.controller.stats()
    }

    /// Page changed in some way; navigate if the content ID did
    pub fn on_external_change(
        &mut self,
        page: &dyn PageState,
        surface: Option<&mut dyn PlaybackSurface>,
    ) -> Option<DetectionTicket> {
        let current = page.current_content_id()?;
        if self.content_id.as_deref() == Some(current.as_str()) {
            return None;
        }
        Some(self.navigate(&current, surface))
    }

    /// Start a new view: the old controller is torn down before the new one exists
    pub fn navigate(
        &mut self,
        content_id: &str,
        surface: Option<&mut dyn PlaybackSurface>,
    ) -> DetectionTicket {
        if let Some(previous) = &self.content_id {
            info!("🔄 Navigation {} → {}", previous, content_id);
        } else {
            info!("🎬 New view {}", content_id);
        }

        self.controller.teardown(surface);
        let mut controller =
            SkipController::with_clock(self.config.clone(), self.settings, self.clock.clone());
        controller.set_ad_playing(self.ad_playing);
        self.controller = controller;

        self.generation += 1;
        self.content_id = Some(content_id.to_string());

        DetectionTicket {
            content_id: content_id.to_string(),
            generation: self.generation,
        }
    }

    /// Load detected segments if the ticket still matches the active view.
    ///
    /// Returns the events of the immediate evaluation against `surface` (empty
    /// without one), or `None` for a stale result, which loads nothing.
    pub fn complete_detection(
        &mut self,
        ticket: &DetectionTicket,
        segments: Vec<Segment>,
        surface: Option<&mut dyn PlaybackSurface>,
    ) -> Option<Vec<SkipEvent>> {
        let current = self.content_id.as_deref() == Some(ticket.content_id.as_str());
        if !current || ticket.generation != self.generation {
            warn!(
                "⏭️ Discarding stale detection for {} (generation {}, active {:?} generation {})",
                ticket.content_id, ticket.generation, self.content_id, self.generation
            );
            return None;
        }

        self.controller.load_segments(segments);
        let events = match surface {
            Some(surface) => self.controller.evaluate_now(surface),
            None => Vec::new(),
        };
        debug!("Immediate evaluation after load produced {} events", events.len());
        Some(events)
    }

    /// Dispatch a control message
    pub fn handle(
        &mut self,
        message: ControlMessage,
        surface: Option<&mut dyn PlaybackSurface>,
    ) -> ControlReply {
        match message {
            ControlMessage::SettingsUpdated { settings } => {
                self.settings = settings;
                let events = self.controller.apply_settings(settings, surface);
                ControlReply::Settings {
                    success: true,
                    enabled: settings.enabled,
                    action: settings.action,
                    events,
                }
            }
            ControlMessage::GetStats => ControlReply::Stats(self.controller.stats()),
            ControlMessage::AdStateChanged { playing } => {
                self.ad_playing = playing;
                self.controller.set_ad_playing(playing);
                ControlReply::Ack
            }
            ControlMessage::Navigated { url } => {
                let ticket = match content_id_from_url(&url) {
                    Some(id) if self.content_id.as_deref() != Some(id.as_str()) => {
                        Some(self.navigate(&id, surface))
                    }
                    Some(_) => None,
                    None => {
                        debug!("No content ID in {}", url);
                        None
                    }
                };
                ControlReply::Navigation { ticket }
            }
        }
    }

    /// Forwarded time update
    pub fn on_time_update(&mut self, surface: &mut dyn PlaybackSurface) -> Vec<SkipEvent> {
        self.controller.on_time_update(surface)
    }

    /// Forwarded seek completion
    pub fn on_seeked(&mut self, surface: &mut dyn PlaybackSurface) -> Vec<SkipEvent> {
        self.controller.on_seeked(surface)
    }
}
