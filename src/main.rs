use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

use sponsor_skip::detection::local::{DisabledSource, FilePageSource, FileTranscriptSource};
use sponsor_skip::detection::transcript::HttpTranscriptSource;
use sponsor_skip::{
    normalize, ChapterScraper, CommunityDatabaseClient, Config, Segment, SegmentCache,
    SegmentSource, Tier, TieredFetcher, TranscriptDetector, TranscriptTier,
};

#[derive(Parser)]
#[command(name = "sponsor-skip")]
#[command(version)]
#[command(about = "Sponsor segment detection and normalization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to sponsor-skip.toml lookup)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tiered detection pipeline for a content ID
    Detect {
        /// Content (video) ID
        content_id: String,
        /// Saved description HTML for the chapter tier
        #[arg(long)]
        description: Option<PathBuf>,
        /// Video duration in seconds, closes the last chapter
        #[arg(long)]
        duration: Option<f64>,
        /// Saved transcript (json3 `.json` or tab-separated panel text)
        #[arg(long, conflicts_with = "transcript_url")]
        transcript: Option<PathBuf>,
        /// Timed-text URL returning json3
        #[arg(long)]
        transcript_url: Option<String>,
        /// Skip the community database tier
        #[arg(long)]
        no_database: bool,
        /// Bypass the segment cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Normalize a JSON array of segments (file or `-` for stdin)
    Normalize {
        input: String,
        /// Padding applied to each side before merging
        #[arg(long, default_value_t = 0.0)]
        padding: f64,
    },
    /// Segment cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Show the effective configuration or write a default one
    Config {
        /// Write the default configuration to this path
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Get cache statistics
    Stats,
    /// Clean up expired cache entries
    Cleanup,
    /// Clear all cache entries
    Clear,
    /// Invalidate the entry for a content ID
    Invalidate { content_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sponsor_skip=debug,info"
    } else {
        "sponsor_skip=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    config.validate()?;

    match cli.command {
        Commands::Detect {
            content_id,
            description,
            duration,
            transcript,
            transcript_url,
            no_database,
            no_cache,
        } => {
            let fetcher = build_fetcher(
                &config,
                description,
                duration,
                transcript,
                transcript_url,
                no_database,
                no_cache,
            )
            .await?;

            let start_time = std::time::Instant::now();
            let outcome = fetcher.resolve(&content_id).await;
            info!(
                "🎉 Detection finished in {:.2}s: {} segments",
                start_time.elapsed().as_secs_f64(),
                outcome.segments.len()
            );

            let report = json!({
                "contentId": content_id,
                "tier": outcome.tier,
                "fromCache": outcome.from_cache,
                "segments": outcome.segments,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Normalize { input, padding } => {
            let raw = if input == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                std::fs::read_to_string(&input)?
            };
            let segments: Vec<Segment> = serde_json::from_str(&raw)?;
            let normalized = normalize(&segments, padding);
            info!("📐 {} segments → {} after normalization", segments.len(), normalized.len());
            println!("{}", serde_json::to_string_pretty(&normalized)?);
        }

        Commands::Cache { action } => {
            let cache = SegmentCache::new(config.cache.cache_dir.clone(), config.cache.ttl_hours);
            cache.initialize().await?;

            match action {
                CacheCommand::Stats => {
                    let stats = cache.stats().await?;
                    info!("📊 Cache Statistics:");
                    info!("  Total files: {}", stats.total_files);
                    info!("  Valid files: {}", stats.valid_files);
                    info!("  Expired files: {}", stats.expired_files);
                    info!("  Total segments: {}", stats.total_segments);
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
                CacheCommand::Cleanup => {
                    let count = cache.cleanup_expired().await?;
                    info!("🗑️ Cleaned up {} expired cache files", count);
                }
                CacheCommand::Clear => {
                    let count = cache.clear().await?;
                    info!("🧹 Cleared {} cache files", count);
                }
                CacheCommand::Invalidate { content_id } => {
                    if cache.invalidate(&content_id).await? {
                        info!("✅ Successfully invalidated cache for: {}", content_id);
                    } else {
                        warn!("⚠️ No cache entry for: {}", content_id);
                    }
                }
            }
        }

        Commands::Config { init } => match init {
            Some(path) => {
                if path.exists() {
                    return Err(anyhow!("{} already exists", path.display()));
                }
                Config::default().save(&path)?;
            }
            None => println!("{}", config.summary()),
        },
    }

    Ok(())
}

async fn build_fetcher(
    config: &Config,
    description: Option<PathBuf>,
    duration: Option<f64>,
    transcript: Option<PathBuf>,
    transcript_url: Option<String>,
    no_database: bool,
    no_cache: bool,
) -> Result<TieredFetcher> {
    let chapters: Box<dyn SegmentSource> = match description {
        Some(path) if config.detection.enable_chapters => Box::new(ChapterScraper::new(
            Box::new(FilePageSource::new(path, duration)),
            config.retry.clone(),
        )),
        _ => Box::new(DisabledSource::new(Tier::Chapters)),
    };

    let database: Box<dyn SegmentSource> = if config.database.enabled && !no_database {
        Box::new(CommunityDatabaseClient::new(
            config.database.base_url.clone(),
            config.database.timeout_seconds,
            config.database.categories.clone(),
        ))
    } else {
        Box::new(DisabledSource::new(Tier::Database))
    };

    let detector = TranscriptDetector::new(config.rule_set()?);
    let transcript: Box<dyn SegmentSource> = match (transcript, transcript_url) {
        _ if !config.detection.enable_transcript => Box::new(DisabledSource::new(Tier::Transcript)),
        (Some(path), _) => Box::new(TranscriptTier::new(
            Box::new(FileTranscriptSource::new(path)),
            detector,
        )),
        (None, Some(url)) => Box::new(TranscriptTier::new(
            Box::new(HttpTranscriptSource::new(
                url,
                config.database.timeout_seconds,
                config.retry.clone(),
            )?),
            detector,
        )),
        (None, None) => Box::new(DisabledSource::new(Tier::Transcript)),
    };

    let mut fetcher = TieredFetcher::new(chapters, database, transcript)
        .with_merge_padding(config.detection.merge_padding);

    if config.cache.enabled && !no_cache {
        let cache = SegmentCache::new(config.cache.cache_dir.clone(), config.cache.ttl_hours);
        cache.initialize().await?;
        fetcher = fetcher.with_cache(cache);
    }

    Ok(fetcher)
}
