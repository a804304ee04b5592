/// Per-content-ID cache of normalized segments
use super::Tier;
use crate::error::Result;
use crate::segments::Segment;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cached detection result for one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSegments {
    pub content_id: String,
    /// Unix timestamp (seconds) of when the entry was written
    pub cached_at: i64,
    /// Tier that produced the segments
    pub tier: Option<Tier>,
    pub segments: Vec<Segment>,
}

/// Manages the JSON segment cache directory
#[derive(Debug, Clone)]
pub struct SegmentCache {
    cache_dir: PathBuf,
    ttl_hours: u64,
}

impl SegmentCache {
    pub fn new(cache_dir: PathBuf, ttl_hours: u64) -> Self {
        Self { cache_dir, ttl_hours }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Create the cache directory
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        info!("📁 Segment cache directory initialized: {}", self.cache_dir.display());
        Ok(())
    }

    /// Content IDs are hashed so any identifier maps to a safe file name
    fn entry_path(&self, content_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{:x}.json", md5::compute(content_id.as_bytes())))
    }

    fn is_fresh(&self, entry: &CachedSegments) -> bool {
        let age_seconds = (Utc::now().timestamp() - entry.cached_at).max(0) as u64;
        age_seconds < self.ttl_hours.saturating_mul(3600)
    }

    /// Load a fresh entry; expired or unreadable entries are misses
    pub async fn load(&self, content_id: &str) -> Option<CachedSegments> {
        let path = self.entry_path(content_id);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => {
                debug!("Cache miss for {}", content_id);
                return None;
            }
        };

        match serde_json::from_str::<CachedSegments>(&content) {
            Ok(entry) if entry.content_id != content_id => {
                warn!("Cache entry {} belongs to {}, ignoring", path.display(), entry.content_id);
                None
            }
            Ok(entry) => {
                if self.is_fresh(&entry) {
                    info!("📚 Cache hit: {} segments for {}", entry.segments.len(), content_id);
                    Some(entry)
                } else {
                    info!("⏰ Cache expired for {}", content_id);
                    let _ = tokio::fs::remove_file(&path).await;
                    None
                }
            }
            Err(e) => {
                warn!("Failed to parse cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write segments for `content_id`, replacing any previous entry
    pub async fn store(&self, content_id: &str, tier: Option<Tier>, segments: &[Segment]) -> Result<()> {
        self.write_entry(CachedSegments {
            content_id: content_id.to_string(),
            cached_at: Utc::now().timestamp(),
            tier,
            segments: segments.to_vec(),
        })
        .await
    }

    async fn write_entry(&self, entry: CachedSegments) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.entry_path(&entry.content_id);
        let json = serde_json::to_string_pretty(&entry)?;
        tokio::fs::write(&path, json).await?;
        info!("💾 Cached {} segments for {}", entry.segments.len(), entry.content_id);
        Ok(())
    }

    /// Remove the entry for `content_id`
    pub async fn invalidate(&self, content_id: &str) -> Result<bool> {
        let path = self.entry_path(content_id);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
            info!("🗑️ Invalidated cache for {}", content_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn entries(&self) -> Result<Vec<(PathBuf, Option<CachedSegments>)>> {
        let mut found = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let parsed = tokio::fs::read_to_string(&path)
                    .await
                    .ok()
                    .and_then(|content| serde_json::from_str::<CachedSegments>(&content).ok());
                found.push((path, parsed));
            }
        }

        Ok(found)
    }

    /// Remove expired and unreadable entries
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let mut cleaned = 0;
        for (path, entry) in self.entries().await? {
            let expired = entry.map_or(true, |e| !self.is_fresh(&e));
            if expired && tokio::fs::remove_file(&path).await.is_ok() {
                cleaned += 1;
                debug!("🗑️ Removed stale cache file {}", path.display());
            }
        }

        if cleaned > 0 {
            info!("🧹 Cleaned up {} expired cache files", cleaned);
        }
        Ok(cleaned)
    }

    /// Remove every entry
    pub async fn clear(&self) -> Result<usize> {
        let mut cleared = 0;
        for (path, _) in self.entries().await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                cleared += 1;
            }
        }
        info!("🧹 Cleared {} cache files", cleared);
        Ok(cleared)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for (_, entry) in self.entries().await? {
            stats.total_files += 1;
            match entry {
                Some(e) if self.is_fresh(&e) => {
                    stats.valid_files += 1;
                    stats.total_segments += e.segments.len();
                }
                _ => stats.expired_files += 1,
            }
        }
        Ok(stats)
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total_files: usize,
    pub valid_files: usize,
    pub expired_files: usize,
    pub total_segments: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SegmentCache::new(temp_dir.path().join("segments"), 24);
        cache.initialize().await.unwrap();

        let segments = vec![Segment::with_category(10.0, 20.0, "sponsor")];
        cache.store("abc123", Some(Tier::Database), &segments).await.unwrap();

        let entry = cache.load("abc123").await.unwrap();
        assert_eq!(entry.segments, segments);
        assert_eq!(entry.tier, Some(Tier::Database));
        assert!(cache.load("other").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SegmentCache::new(temp_dir.path().to_path_buf(), 1);

        cache
            .write_entry(CachedSegments {
                content_id: "old".to_string(),
                cached_at: Utc::now().timestamp() - 2 * 3600,
                tier: None,
                segments: vec![Segment::new(0.0, 5.0)],
            })
            .await
            .unwrap();
        cache.store("new", None, &[Segment::new(1.0, 2.0)]).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.expired_files, 1);
        assert_eq!(stats.total_segments, 1);

        assert_eq!(cache.cleanup_expired().await.unwrap(), 1);
        assert!(cache.load("old").await.is_none());
        assert!(cache.load("new").await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SegmentCache::new(temp_dir.path().to_path_buf(), 24);

        cache.store("a", None, &[Segment::new(0.0, 1.0)]).await.unwrap();
        cache.store("b", None, &[Segment::new(0.0, 1.0)]).await.unwrap();

        assert!(cache.invalidate("a").await.unwrap());
        assert!(!cache.invalidate("a").await.unwrap());
        assert_eq!(cache.clear().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_has_empty_stats() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SegmentCache::new(temp_dir.path().join("missing"), 24);
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());
    }
}
