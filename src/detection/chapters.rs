/// Description chapter scraper
///
/// Reads the timestamp anchors of the expanded video description, pairs each
/// timestamp with the next one to form chapter ranges, and keeps the chapters
/// whose title names a sponsor.
use super::{SegmentSource, Tier};
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};
use crate::segments::Segment;
use crate::timecode::{contains_timestamp, find_timestamp};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

/// Live page access needed by the chapter scraper
#[async_trait]
pub trait PageSource: Send + Sync {
    /// HTML of the expanded description. Implementations fail while the
    /// description has not rendered yet; the scraper retries.
    async fn description_html(&self) -> Result<String>;

    /// Duration of the current video in seconds, if known
    async fn video_duration(&self) -> Option<f64>;
}

/// A chapter range read from the description
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    pub start: f64,
    pub end: f64,
}

/// Chapter tier over a live page
pub struct ChapterScraper {
    page: Box<dyn PageSource>,
    retry: RetryPolicy,
    /// `None` matches titles containing "sponsor" in any case
    title_filter: Option<Regex>,
}

impl ChapterScraper {
    pub fn new(page: Box<dyn PageSource>, retry: RetryPolicy) -> Self {
        Self {
            page,
            retry,
            title_filter: None,
        }
    }

    /// Replace the title pattern deciding which chapters are skipped
    pub fn with_title_filter(mut self, title_filter: Regex) -> Self {
        self.title_filter = Some(title_filter);
        self
    }

    fn is_sponsor_title(&self, title: &str) -> bool {
        match &self.title_filter {
            Some(filter) => filter.is_match(title),
            None => title.to_lowercase().contains("sponsor"),
        }
    }

    /// Scrape sponsor chapters from the page
    pub async fn scrape_chapter_segments(&self) -> Result<Vec<Segment>> {
        info!("📖 Reading description chapters");
        let html = with_retry(&self.retry, "description expand", || self.page.description_html()).await?;
        let duration = self.page.video_duration().await;

        let chapters = parse_description_chapters(&html, duration);
        let sponsor: Vec<Segment> = chapters
            .into_iter()
            .filter(|c| self.is_sponsor_title(&c.title))
            .map(|c| Segment::new(c.start, c.end))
            .collect();

        info!("📚 Sponsor chapters: {}", sponsor.len());
        Ok(sponsor)
    }
}

#[async_trait]
impl SegmentSource for ChapterScraper {
    async fn fetch_segments(&self, content_id: &str) -> Result<Vec<Segment>> {
        match self.scrape_chapter_segments().await {
            Ok(segments) => Ok(segments),
            Err(e) => {
                warn!("❌ Failed to read chapters for {}: {}", content_id, e);
                Ok(Vec::new())
            }
        }
    }

    fn tier(&self) -> Tier {
        Tier::Chapters
    }
}

/// Parse every chapter from description HTML.
///
/// Only anchors whose text carries a timestamp start a chapter. A chapter ends
/// at the next timestamp anchor; the last one ends at `duration` (and is
/// dropped when the duration is unknown). The title is taken from the next
/// sibling anchor when it has no timestamp, otherwise from the first
/// non-timestamp line of the anchor text.
pub fn parse_description_chapters(html: &str, duration: Option<f64>) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("#description a") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let anchors: Vec<ElementRef> = document.select(&selector).collect();
    debug!("Description anchors: {}", anchors.len());

    let stamped: Vec<(ElementRef, f64)> = anchors
        .into_iter()
        .filter_map(|a| find_timestamp(&element_text(&a)).map(|start| (a, start)))
        .collect();

    if stamped.is_empty() {
        warn!("⚠️ No timestamp anchors in description");
        return Vec::new();
    }
    debug!("Anchors with timestamps: {}", stamped.len());

    let mut chapters = Vec::new();
    for (idx, (anchor, start)) in stamped.iter().enumerate() {
        let end = match stamped.get(idx + 1) {
            Some((_, next_start)) => *next_start,
            None => match duration {
                Some(d) if d.is_finite() => d,
                _ => {
                    debug!("Dropping final chapter at {:.0}s: video duration unknown", start);
                    continue;
                }
            },
        };

        if end <= *start {
            debug!("Dropping chapter with non-increasing range {:.0}s-{:.0}s", start, end);
            continue;
        }

        chapters.push(Chapter {
            title: chapter_title(anchor),
            start: *start,
            end,
        });
    }

    chapters
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

fn chapter_title(anchor: &ElementRef) -> String {
    let sibling_title = anchor
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .filter(|sibling| sibling.value().name() == "a")
        .map(|sibling| element_text(&sibling))
        .filter(|text| !contains_timestamp(text));

    if let Some(title) = sibling_title {
        return title.trim().to_string();
    }

    element_text(anchor)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !contains_timestamp(line))
        .unwrap_or_default()
        .to_string()
}
