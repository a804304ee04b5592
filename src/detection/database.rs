/// Community segment database client
use super::{SegmentSource, Tier};
use crate::error::Result;
use crate::segments::Segment;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Public instance of the community sponsor-segment database
pub const DEFAULT_DATABASE_URL: &str = "https://sponsor.ajay.app";

/// One submitted segment as returned by `/api/skipSegments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSegment {
    #[serde(alias = "range")]
    pub segment: [f64; 2],
    pub category: String,
    #[serde(rename = "UUID", default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// Thin HTTP client: content ID in, categorized segments out.
///
/// Network failures, non-2xx responses (404 means "no submissions") and
/// undecodable bodies all come back as an empty list.
#[derive(Clone)]
pub struct CommunityDatabaseClient {
    client: Client,
    base_url: String,
    categories: Vec<String>,
}

impl CommunityDatabaseClient {
    /// Create a new client instance
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64, categories: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("sponsor-skip/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            categories,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/skipSegments", self.base_url)
    }

    /// Fetch the segments for `content_id`, never failing
    pub async fn fetch_database_segments(&self, content_id: &str) -> Vec<Segment> {
        match self.request(content_id).await {
            Ok(items) => {
                let segments = segments_from_response(items, &self.categories);
                info!("🗄️ Database returned {} segments for {}", segments.len(), content_id);
                segments
            }
            Err(e) => {
                warn!("❌ Database lookup failed for {}: {}", content_id, e);
                Vec::new()
            }
        }
    }

    async fn request(&self, content_id: &str) -> Result<Vec<DatabaseSegment>> {
        let categories = serde_json::to_string(&self.categories)?;
        debug!("GET {} videoID={} categories={}", self.endpoint(), content_id, categories);

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("videoID", content_id), ("categories", categories.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("Database responded {} for {}", response.status(), content_id);
            return Ok(Vec::new());
        }

        Ok(response.json::<Vec<DatabaseSegment>>().await?)
    }
}

#[async_trait]
impl SegmentSource for CommunityDatabaseClient {
    async fn fetch_segments(&self, content_id: &str) -> Result<Vec<Segment>> {
        Ok(self.fetch_database_segments(content_id).await)
    }

    fn tier(&self) -> Tier {
        Tier::Database
    }
}

/// Keep the wanted categories and convert to segments, dropping inverted ranges
pub fn segments_from_response(items: Vec<DatabaseSegment>, categories: &[String]) -> Vec<Segment> {
    items
        .into_iter()
        .filter(|item| categories.iter().any(|c| c == &item.category))
        .filter_map(|item| {
            let [start, end] = item.segment;
            let segment = Segment::with_category(start, end, item.category);
            if segment.is_valid() {
                Some(segment)
            } else {
                debug!("Dropping malformed database segment {:?}", segment);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sponsor_only() -> Vec<String> {
        vec!["sponsor".to_string()]
    }

    #[test]
    fn test_segments_from_response_filters_categories() {
        let body = r#"[
            {"segment": [12.5, 40.0], "category": "sponsor", "UUID": "a1"},
            {"segment": [100.0, 110.0], "category": "selfpromo", "UUID": "b2"},
            {"range": [200.0, 230.0], "category": "sponsor"}
        ]"#;
        let items: Vec<DatabaseSegment> = serde_json::from_str(body).unwrap();

        let segments = segments_from_response(items, &sponsor_only());
        assert_eq!(
            segments,
            vec![
                Segment::with_category(12.5, 40.0, "sponsor"),
                Segment::with_category(200.0, 230.0, "sponsor"),
            ]
        );
    }

    #[test]
    fn test_segments_from_response_drops_malformed_ranges() {
        let items = vec![
            DatabaseSegment { segment: [30.0, 10.0], category: "sponsor".to_string(), uuid: None },
            DatabaseSegment { segment: [5.0, 5.0], category: "sponsor".to_string(), uuid: None },
        ];
        assert!(segments_from_response(items, &sponsor_only()).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_database_yields_empty() {
        let client = CommunityDatabaseClient::new("http://127.0.0.1:1", 2, sponsor_only());
        let segments = client.fetch_segments("dQw4w9WgXcQ").await.unwrap();
        assert!(segments.is_empty());
        assert_eq!(client.tier(), Tier::Database);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = CommunityDatabaseClient::new("https://db.example.org/", 5, sponsor_only());
        assert_eq!(client.endpoint(), "https://db.example.org/api/skipSegments");
    }
}
