use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::detection::database::DEFAULT_DATABASE_URL;
use crate::detection::{RuleSet, RuleSetConfig};
use crate::playback::{ActionMode, ControllerConfig, UserSettings};
use crate::retry::RetryPolicy;

/// Configuration for the sponsor skipper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcript heuristics and normalization
    pub detection: DetectionConfig,

    /// Community segment database
    pub database: DatabaseConfig,

    /// Skip controller behaviour
    pub playback: PlaybackConfig,

    /// Bounded retry for page and transcript reads
    pub retry: RetryPolicy,

    /// Detected segment cache
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Padding handed to the normalizer when merging (seconds)
    pub merge_padding: f64,

    /// Use the chapter tier
    pub enable_chapters: bool,

    /// Use the transcript tier
    pub enable_transcript: bool,

    /// Transcript rule set
    pub rules: RuleSetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Use the community database tier
    pub enabled: bool,

    /// Base URL of the segment API
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Segment categories to request and keep
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Act on segments at all
    pub enabled: bool,

    /// Default action when entering a segment
    pub action: ActionMode,

    /// Per-segment cooldown (milliseconds)
    pub cooldown_ms: u64,

    /// Minimum interval between processed time updates (milliseconds)
    pub throttle_ms: u64,

    /// Announce segments this many seconds before they start
    pub lookahead_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching
    pub enabled: bool,

    /// Cache directory
    pub cache_dir: PathBuf,

    /// Cache TTL in hours
    pub ttl_hours: u64,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = ["sponsor-skip.toml", "config/sponsor-skip.toml"];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::load_from(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config file {}: {}", path, e),
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by `SPONSOR_SKIP_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SPONSOR_SKIP_DATABASE_URL") {
            config.database.base_url = url;
        }

        if let Ok(timeout) = std::env::var("SPONSOR_SKIP_DATABASE_TIMEOUT") {
            config.database.timeout_seconds = timeout.parse().unwrap_or(10);
        }

        if let Ok(action) = std::env::var("SPONSOR_SKIP_ACTION") {
            config.playback.action = match action.to_lowercase().as_str() {
                "mute" => ActionMode::Mute,
                "ignore" => ActionMode::Ignore,
                _ => ActionMode::Skip,
            };
        }

        if let Ok(cache_dir) = std::env::var("SPONSOR_SKIP_CACHE_DIR") {
            config.cache.cache_dir = PathBuf::from(cache_dir);
        }

        if let Ok(padding) = std::env::var("SPONSOR_SKIP_MERGE_PADDING") {
            config.detection.merge_padding = padding.parse().unwrap_or(0.0);
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.detection.merge_padding >= 0.0) {
            return Err(anyhow!("merge_padding must be a non-negative number"));
        }

        self.detection.rules.compile()?;

        if self.database.enabled && self.database.categories.is_empty() {
            return Err(anyhow!("database.categories must not be empty"));
        }

        if self.database.timeout_seconds == 0 {
            return Err(anyhow!("database.timeout_seconds must be greater than 0"));
        }

        if !(self.playback.lookahead_seconds >= 0.0) {
            return Err(anyhow!("lookahead_seconds must be a non-negative number"));
        }

        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be greater than 0"));
        }

        if self.cache.enabled && self.cache.ttl_hours == 0 {
            return Err(anyhow!("cache.ttl_hours must be greater than 0"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Compiled transcript rule set
    pub fn rule_set(&self) -> Result<RuleSet> {
        Ok(self.detection.rules.compile()?)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            cooldown_ms: self.playback.cooldown_ms,
            throttle_ms: self.playback.throttle_ms,
            lookahead_seconds: self.playback.lookahead_seconds,
        }
    }

    pub fn user_settings(&self) -> UserSettings {
        UserSettings {
            enabled: self.playback.enabled,
            action: self.playback.action,
        }
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Sponsor Skip Configuration:\n\
            - Tiers: chapters={} database={} transcript={}\n\
            - Database: {} (timeout {}s, categories {})\n\
            - Rule Set: {} ({} start / {} end patterns)\n\
            - Merge Padding: {}s\n\
            - Action: {:?} (enabled: {})\n\
            - Cooldown: {}ms, Throttle: {}ms\n\
            - Caching Enabled: {} ({})",
            self.detection.enable_chapters,
            self.database.enabled,
            self.detection.enable_transcript,
            self.database.base_url,
            self.database.timeout_seconds,
            self.database.categories.join(", "),
            self.detection.rules.name,
            self.detection.rules.start_patterns.len(),
            self.detection.rules.end_patterns.len(),
            self.detection.merge_padding,
            self.playback.action,
            self.playback.enabled,
            self.playback.cooldown_ms,
            self.playback.throttle_ms,
            self.cache.enabled,
            self.cache.cache_dir.display()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let controller = ControllerConfig::default();
        Self {
            detection: DetectionConfig {
                merge_padding: 0.0,
                enable_chapters: true,
                enable_transcript: true,
                rules: RuleSetConfig::default(),
            },
            database: DatabaseConfig {
                enabled: true,
                base_url: DEFAULT_DATABASE_URL.to_string(),
                timeout_seconds: 10,
                categories: vec!["sponsor".to_string()],
            },
            playback: PlaybackConfig {
                enabled: true,
                action: ActionMode::Skip,
                cooldown_ms: controller.cooldown_ms,
                throttle_ms: controller.throttle_ms,
                lookahead_seconds: controller.lookahead_seconds,
            },
            retry: RetryPolicy::default(),
            cache: CacheConfig {
                enabled: true,
                cache_dir: PathBuf::from("./cache/segments"),
                ttl_hours: 24,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.base_url = url.into();
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.config.database.categories = categories;
        self
    }

    pub fn with_action(mut self, action: ActionMode) -> Self {
        self.config.playback.action = action;
        self
    }

    pub fn with_merge_padding(mut self, padding: f64) -> Self {
        self.config.detection.merge_padding = padding;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.cache.cache_dir = dir;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.config.playback.cooldown_ms = cooldown_ms;
        self
    }

    pub fn enable_database(mut self, enable: bool) -> Self {
        self.config.database.enabled = enable;
        self
    }

    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.config.cache.enabled = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
