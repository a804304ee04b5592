/// Tiered fetcher: tries each detection source in fixed priority order
use super::cache::SegmentCache;
use super::{SegmentSource, Tier};
use crate::segments::{normalize, Segment};
use tracing::{error, info, warn};

/// Normalized segments plus the tier that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub segments: Vec<Segment>,
    /// `None` when every tier came back empty (or the result came from cache
    /// without a recorded tier)
    pub tier: Option<Tier>,
    pub from_cache: bool,
}

/// Priority resolver over the chapter, database and transcript tiers.
///
/// Only the first tier with a non-empty result is used; the tiers are never
/// merged. A tier that fails is logged and treated as empty.
pub struct TieredFetcher {
    chapters: Box<dyn SegmentSource>,
    database: Box<dyn SegmentSource>,
    transcript: Box<dyn SegmentSource>,
    merge_padding: f64,
    cache: Option<SegmentCache>,
}

impl TieredFetcher {
    pub fn new(
        chapters: Box<dyn SegmentSource>,
        database: Box<dyn SegmentSource>,
        transcript: Box<dyn SegmentSource>,
    ) -> Self {
        Self {
            chapters,
            database,
            transcript,
            merge_padding: 0.0,
            cache: None,
        }
    }

    /// Padding handed to the normalizer
    pub fn with_merge_padding(mut self, padding: f64) -> Self {
        self.merge_padding = padding;
        self
    }

    /// Consult and populate a segment cache
    pub fn with_cache(mut self, cache: SegmentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Normalized segments of the first non-empty tier, or `[]`
    pub async fn get_segments_by_priority(&self, content_id: &str) -> Vec<Segment> {
        self.resolve(content_id).await.segments
    }

    /// Like [`get_segments_by_priority`](Self::get_segments_by_priority), also
    /// reporting which tier won
    pub async fn resolve(&self, content_id: &str) -> DetectionOutcome {
        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.load(content_id).await {
                // Entries hold raw tier output and may be hand-edited
                let segments = normalize(&entry.segments, self.merge_padding);
                if !segments.is_empty() {
                    return DetectionOutcome {
                        segments,
                        tier: entry.tier,
                        from_cache: true,
                    };
                }
                warn!("⚠️ Cached entry for {} holds no usable segments, detecting again", content_id);
            }
        }

        let tiers: [&dyn SegmentSource; 3] = [&*self.chapters, &*self.database, &*self.transcript];

        for (position, source) in tiers.iter().enumerate() {
            let tier = source.tier();
            let raw = match source.fetch_segments(content_id).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("❌ [Tier {}] {} failed for {}: {}", position + 1, tier, content_id, e);
                    Vec::new()
                }
            };
            info!("🔎 [Tier {}] {}: {} raw segments", position + 1, tier, raw.len());

            // Malformed detections are filtered first, so a tier holding only
            // those counts as empty
            let segments = normalize(&raw, self.merge_padding);
            let is_last = position + 1 == tiers.len();
            if segments.is_empty() && !is_last {
                continue;
            }

            let tier = if segments.is_empty() { None } else { Some(tier) };
            if !segments.is_empty() {
                self.remember(content_id, tier, &raw).await;
            }

            return DetectionOutcome {
                segments,
                tier,
                from_cache: false,
            };
        }

        DetectionOutcome {
            segments: Vec::new(),
            tier: None,
            from_cache: false,
        }
    }

    /// Store the raw output of the winning tier; hits are normalized on read
    async fn remember(&self, content_id: &str, tier: Option<Tier>, segments: &[Segment]) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(content_id, tier, segments).await {
                error!("Failed to cache segments for {}: {}", content_id, e);
            }
        }
    }
}
