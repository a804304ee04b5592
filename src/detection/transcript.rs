/// Transcript heuristic detection: weighted start/end phrases over timed cues
use super::rules::{best_match, RuleSet};
use super::{SegmentSource, Tier};
use crate::error::{Result, SkipError};
use crate::retry::{with_retry, RetryPolicy};
use crate::segments::{Cue, Segment, SPONSOR_CATEGORY};
use crate::timecode::parse_timestamp;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A detected sponsor span with the confidence of its boundaries
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSpan {
    pub segment: Segment,
    /// Mean of the start and end phrase weights (end weight is 0 when the
    /// fallback duration was used)
    pub confidence: f64,
    /// Whether the end came from the fallback duration rather than an end phrase
    pub used_fallback: bool,
}

/// Keyword/pattern model that turns cues into sponsor segments
#[derive(Debug, Clone)]
pub struct TranscriptDetector {
    rules: RuleSet,
}

impl Default for TranscriptDetector {
    fn default() -> Self {
        Self::new(RuleSet::sponsor_default())
    }
}

impl TranscriptDetector {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Detect sponsor segments, tagged `"sponsor"`
    pub fn detect(&self, cues: &[Cue]) -> Vec<Segment> {
        self.detect_scored(cues).into_iter().map(|span| span.segment).collect()
    }

    /// Detect sponsor spans together with their confidence
    pub fn detect_scored(&self, cues: &[Cue]) -> Vec<DetectedSpan> {
        let rules = &self.rules;

        let mut ordered: Vec<&Cue> = cues
            .iter()
            .filter(|c| c.start.is_finite() && c.start >= 0.0)
            .collect();
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut spans = Vec::new();
        let mut i = 0;

        while i < ordered.len() {
            let cue = ordered[i];

            let start_weight = match best_match(&rules.start_rules, &cue.text) {
                Some(weight) if weight >= rules.min_confidence => weight,
                _ => {
                    i += 1;
                    continue;
                }
            };
            debug!("Candidate sponsor start at {:.1}s (weight {:.2}): {:?}", cue.start, start_weight, cue.text);

            // Running best end phrase inside the bounded window; ties move the end later
            let window_end = cue.start + rules.max_segment_length;
            let mut best_end: Option<(f64, f64)> = None;
            for next in ordered[i + 1..].iter().take_while(|c| c.start <= window_end) {
                if let Some(weight) = best_match(&rules.end_rules, &next.text) {
                    let beats_best = best_end.map_or(true, |(_, best)| weight >= best);
                    if weight >= rules.min_confidence && beats_best {
                        best_end = Some((next.start, weight));
                    }
                }
            }

            let (raw_end, end_weight, used_fallback) = match best_end {
                Some((time, weight)) => (time, weight, false),
                None => {
                    debug!("No end phrase within {:.0}s, using {:.0}s fallback", rules.max_segment_length, rules.fallback_duration);
                    (cue.start + rules.fallback_duration, 0.0, true)
                }
            };

            let start = (cue.start + rules.start_padding).max(0.0);
            let end = raw_end + rules.end_padding;

            if end - start < rules.min_segment_length {
                debug!("Rejected {:.1}s-{:.1}s: shorter than {:.1}s", start, end, rules.min_segment_length);
                i += 1;
                continue;
            }

            spans.push(DetectedSpan {
                segment: Segment::with_category(start, end, SPONSOR_CATEGORY),
                confidence: (start_weight + end_weight) / 2.0,
                used_fallback,
            });

            // Skip every cue inside the accepted span so the same read is not detected twice
            i += 1;
            while i < ordered.len() && ordered[i].start < end {
                i += 1;
            }
        }

        info!("🔎 Transcript heuristics found {} sponsor spans in {} cues", spans.len(), cues.len());
        spans
    }
}

/// Producer of timed cues for the current video view
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_cues(&self) -> Result<Vec<Cue>>;
}

/// Transcript tier: cue source plus detector.
///
/// Any failure to obtain cues is a "no signal" result and yields no segments.
pub struct TranscriptTier {
    source: Box<dyn TranscriptSource>,
    detector: TranscriptDetector,
}

impl TranscriptTier {
    pub fn new(source: Box<dyn TranscriptSource>, detector: TranscriptDetector) -> Self {
        Self { source, detector }
    }
}

#[async_trait]
impl SegmentSource for TranscriptTier {
    async fn fetch_segments(&self, content_id: &str) -> Result<Vec<Segment>> {
        match self.source.fetch_cues().await {
            Ok(cues) => {
                debug!("Loaded {} transcript cues for {}", cues.len(), content_id);
                Ok(self.detector.detect(&cues))
            }
            Err(e) => {
                warn!("❌ Transcript unavailable for {}: {}", content_id, e);
                Ok(Vec::new())
            }
        }
    }

    fn tier(&self) -> Tier {
        Tier::Transcript
    }
}

/// Parse the site's timed-text JSON (`fmt=json3`) into cues.
///
/// Events without text runs (window/style events) are skipped, as are events
/// without a start time.
pub fn parse_json3(raw: &Value) -> Vec<Cue> {
    let events = match raw.get("events").and_then(Value::as_array) {
        Some(events) => events,
        None => return Vec::new(),
    };

    events
        .iter()
        .filter_map(|event| {
            let segs = event.get("segs")?.as_array()?;
            let start_ms = event.get("tStartMs")?.as_f64()?;
            let text: String = segs
                .iter()
                .filter_map(|s| s.get("utf8").and_then(Value::as_str))
                .collect();
            Some(Cue::new(start_ms / 1000.0, text.trim()))
        })
        .collect()
}

/// Build cues from transcript panel rows of `(timestamp, text)`.
///
/// Rows whose timestamp does not parse are dropped.
pub fn cues_from_panel<'a, I>(rows: I) -> Vec<Cue>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    rows.into_iter()
        .filter_map(|(timestamp, text)| match parse_timestamp(timestamp) {
            Some(start) => Some(Cue::new(start, text.trim())),
            None => {
                debug!("Dropping transcript row with unparseable timestamp {:?}", timestamp);
                None
            }
        })
        .collect()
}

/// Fetches a json3 timed-text track over HTTP
pub struct HttpTranscriptSource {
    client: Client,
    track_url: String,
    retry: RetryPolicy,
}

impl HttpTranscriptSource {
    pub fn new(track_url: impl Into<String>, timeout_seconds: u64, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            track_url: track_url.into(),
            retry,
        })
    }

    async fn fetch_once(&self) -> Result<Value> {
        let response = self.client.get(&self.track_url).send().await?;
        if !response.status().is_success() {
            return Err(SkipError::SourceUnavailable(format!(
                "transcript track returned {}",
                response.status()
            )));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl TranscriptSource for HttpTranscriptSource {
    async fn fetch_cues(&self) -> Result<Vec<Cue>> {
        info!("📝 Fetching transcript track: {}", self.track_url);
        let raw = with_retry(&self.retry, "transcript fetch", || self.fetch_once()).await?;
        Ok(parse_json3(&raw))
    }
}
