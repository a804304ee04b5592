use sponsor_skip::detection::local::{DisabledSource, FilePageSource, FileTranscriptSource};
use sponsor_skip::playback::ManualClock;
use sponsor_skip::{
    run_detection, ChapterScraper, CommunityDatabaseClient, ControlMessage, ControlReply,
    ControllerConfig, PlaybackSession, PlaybackSurface, RetryPolicy, Segment, SegmentCache, Tier,
    TieredFetcher, TranscriptDetector, TranscriptTier, UserSettings,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const DESCRIPTION: &str = r#"
<div id="description">
  <a href="/watch?v=vid&t=0s">0:00</a> <a href="/x">Intro</a>
  <a href="/watch?v=vid&t=62s">1:02</a> <a href="/x">Sponsor - Acme</a>
  <a href="/watch?v=vid&t=120s">2:00</a> <a href="/x">Build</a>
</div>
"#;

const PLAIN_DESCRIPTION: &str = r#"
<div id="description">
  <a href="/watch?v=vid&t=0s">0:00</a> <a href="/x">Intro</a>
  <a href="/watch?v=vid&t=120s">2:00</a> <a href="/x">Build</a>
</div>
"#;

const TRANSCRIPT: &str = "0:01\twelcome back to the channel\n\
0:30\tthis video is sponsored by Acme\n\
0:45\tuse my code for ten percent off\n\
1:00\tanyway, back to the video\n\
1:30\tso here is the first step\n";

struct Player {
    time: f64,
    volume: f64,
    seeks: Vec<f64>,
}

impl PlaybackSurface for Player {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> f64 {
        300.0
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) -> sponsor_skip::Result<()> {
        self.volume = volume;
        Ok(())
    }

    fn seek(&mut self, time: f64) -> sponsor_skip::Result<()> {
        self.time = time;
        self.seeks.push(time);
        Ok(())
    }
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1), sponsor_skip::Backoff::Linear)
}

async fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}

async fn offline_fetcher(dir: &Path, description: &str) -> TieredFetcher {
    let description = write(dir, "description.html", description).await;
    let transcript = write(dir, "transcript.txt", TRANSCRIPT).await;

    TieredFetcher::new(
        Box::new(ChapterScraper::new(
            Box::new(FilePageSource::new(description, Some(300.0))),
            quick_retry(),
        )),
        Box::new(CommunityDatabaseClient::new("http://127.0.0.1:1", 1, vec!["sponsor".to_string()])),
        Box::new(TranscriptTier::new(
            Box::new(FileTranscriptSource::new(transcript)),
            TranscriptDetector::default(),
        )),
    )
}

#[tokio::test]
async fn test_chapter_tier_wins_when_description_names_a_sponsor() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = offline_fetcher(temp_dir.path(), DESCRIPTION).await;

    let outcome = fetcher.resolve("vid").await;
    assert_eq!(outcome.tier, Some(Tier::Chapters));
    assert_eq!(outcome.segments, vec![Segment::new(62.0, 120.0)]);
}

#[tokio::test]
async fn test_transcript_tier_used_when_other_tiers_are_empty() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = offline_fetcher(temp_dir.path(), PLAIN_DESCRIPTION).await;

    let outcome = fetcher.resolve("vid").await;
    assert_eq!(outcome.tier, Some(Tier::Transcript));
    assert_eq!(outcome.segments, vec![Segment::with_category(28.0, 64.0, "sponsor")]);
}

#[tokio::test]
async fn test_cached_result_served_without_sources() {
    let temp_dir = TempDir::new().unwrap();
    let cache = SegmentCache::new(temp_dir.path().join("cache"), 24);
    cache.initialize().await.unwrap();

    let fetcher = offline_fetcher(temp_dir.path(), DESCRIPTION).await.with_cache(cache.clone());
    fetcher.resolve("vid").await;

    let offline = TieredFetcher::new(
        Box::new(DisabledSource::new(Tier::Chapters)),
        Box::new(DisabledSource::new(Tier::Database)),
        Box::new(DisabledSource::new(Tier::Transcript)),
    )
    .with_cache(cache.clone());

    let outcome = offline.resolve("vid").await;
    assert!(outcome.from_cache);
    assert_eq!(outcome.segments, vec![Segment::new(62.0, 120.0)]);

    assert!(cache.invalidate("vid").await.unwrap());
    assert!(offline.get_segments_by_priority("vid").await.is_empty());
}

#[tokio::test]
async fn test_session_detects_and_skips() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = offline_fetcher(temp_dir.path(), DESCRIPTION).await;
    let clock = ManualClock::new();
    let mut session =
        PlaybackSession::with_clock(ControllerConfig::default(), UserSettings::default(), clock.clone());
    let mut player = Player { time: 0.0, volume: 1.0, seeks: Vec::new() };

    let reply = session.handle(
        ControlMessage::Navigated { url: "https://www.youtube.com/watch?v=vid".to_string() },
        Some(&mut player),
    );
    let ticket = match reply {
        ControlReply::Navigation { ticket: Some(ticket) } => ticket,
        other => panic!("expected a ticket, got {:?}", other),
    };

    let result = run_detection(&fetcher, ticket).await;
    let events = session.complete_detection(&result.ticket, result.outcome.segments, Some(&mut player));
    assert_eq!(events, Some(Vec::new()));

    player.time = 63.0;
    clock.advance(Duration::from_secs(1));
    session.on_time_update(&mut player);
    assert_eq!(player.seeks, vec![120.0]);

    match session.handle(ControlMessage::GetStats, None) {
        ControlReply::Stats(stats) => {
            assert_eq!(stats.total_actions, 1);
            assert_eq!(stats.total_seconds_saved, 58.0);
        }
        other => panic!("expected stats, got {:?}", other),
    }
}

#[tokio::test]
async fn test_detection_finishing_after_navigation_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = offline_fetcher(temp_dir.path(), DESCRIPTION).await;
    let mut session = PlaybackSession::new(ControllerConfig::default(), UserSettings::default());

    let first = session.navigate("vid", None);
    let pending = run_detection(&fetcher, first);

    session.navigate("other", None);
    let result = pending.await;

    assert!(session.complete_detection(&result.ticket, result.outcome.segments, None).is_none());
    assert!(session.controller().segments().is_empty());
}
