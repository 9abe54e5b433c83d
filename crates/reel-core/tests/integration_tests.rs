//! Integration tests for Reel Core

use reel_core::{
    sim::{MemoryMediaSource, RecordingDelivery, ScriptedEngine, TaskQueue},
    EngineKind, EngineSet, LoadOutcome, MediaEvent, MediaSource, PlaybackState, PlayerConfig,
    PlayerSession, PlaylistEntry, ReadyState,
};
use std::cell::RefCell;
use std::rc::Rc;

struct Harness {
    media: Rc<MemoryMediaSource>,
    hls: Rc<ScriptedEngine>,
    dash: Rc<ScriptedEngine>,
    delivery: Rc<RecordingDelivery>,
    tasks: TaskQueue,
    session: PlayerSession,
}

fn harness(config: PlayerConfig) -> Harness {
    let tasks = TaskQueue::new();
    let media = Rc::new(MemoryMediaSource::with_scheduler(tasks.spawner()));
    let hls = Rc::new(ScriptedEngine::new(EngineKind::Hls).attached_to(media.clone(), 120.0));
    let dash = Rc::new(ScriptedEngine::new(EngineKind::Dash).attached_to(media.clone(), 90.0));
    let delivery = Rc::new(RecordingDelivery::new());
    let session = PlayerSession::new(
        config,
        media.clone(),
        EngineSet::new(hls.clone(), dash.clone()),
        Some(delivery.clone()),
        tasks.spawner(),
    )
    .expect("valid config");

    Harness {
        media,
        hls,
        dash,
        delivery,
        tasks,
        session,
    }
}

// =============================================================================
// Event Channel Tests
// =============================================================================

#[tokio::test]
async fn test_every_native_event_publishes_once_while_subscribed() {
    let h = harness(PlayerConfig::default());

    for event in MediaEvent::native() {
        h.delivery.clear();
        h.session.subscribe([event]);
        h.media.fire(event);
        assert_eq!(h.delivery.events(), vec![event], "subscribed {event}");

        h.session.unsubscribe([event]);
        h.media.fire(event);
        assert_eq!(h.delivery.len(), 1, "unsubscribed {event}");
    }
}

#[tokio::test]
async fn test_subscribed_load_reports_lifecycle() {
    let h = harness(PlayerConfig::default());
    h.session.subscribe([
        MediaEvent::LoadedMetadata,
        MediaEvent::CanPlayThrough,
        MediaEvent::Play,
        MediaEvent::Playing,
    ]);

    assert!(h.session.load("https://cdn/show.m3u8", None, true).await.is_ready());
    assert!(h.delivery.is_empty());
    h.tasks.run_until_idle().await;

    let messages = h.delivery.parsed();
    let events: Vec<MediaEvent> = messages.iter().map(|m| m.event()).collect();
    assert_eq!(
        events,
        vec![
            MediaEvent::LoadedMetadata,
            MediaEvent::CanPlayThrough,
            MediaEvent::Play,
            MediaEvent::Playing,
        ]
    );
    assert!(messages.iter().all(|m| m.ready_state() == ReadyState::HaveEnoughData));
}

#[tokio::test]
async fn test_delivery_can_read_session_during_loads() {
    let h = harness(PlayerConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (sink, session) = (seen.clone(), h.session.clone());
    h.session.channel().set_delivery(Rc::new(move |message: &str| {
        sink.borrow_mut().push((message.to_string(), session.state()));
    }));
    h.session.subscribe_all();

    assert!(h.session.load("a.m3u8", None, true).await.is_ready());
    assert!(h.session.load("b.mpd", None, true).await.is_ready());
    assert!(h.session.seek(10.0));
    h.tasks.run_until_idle().await;

    assert!(seen.borrow().len() > 10);
    assert!(seen.borrow().iter().all(|(_, state)| *state == PlaybackState::Playing));
    assert_eq!(h.session.state(), PlaybackState::Playing);
    h.session.channel().clear_delivery();
}

#[tokio::test]
async fn test_missing_delivery_does_not_break_playback() {
    let h = harness(PlayerConfig::default());
    h.session.channel().clear_delivery();
    h.session.subscribe_all();

    assert!(h.session.load("a.mpd", None, true).await.is_ready());
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!(!h.session.publish_external("lost"));
}

// =============================================================================
// Playlist Tests
// =============================================================================

#[tokio::test]
async fn test_end_to_end_playlist_loops() {
    let h = harness(PlayerConfig::default());
    assert!(h.session.load("https://cdn/a.m3u8", Some("A".into()), true).await.is_ready());
    h.session.enqueue("https://cdn/b.mpd", Some("B".into()));
    h.session.enqueue("https://cdn/c.m3u8", Some("C".into()));
    assert_eq!(h.session.state(), PlaybackState::Playing);

    let mut visited = Vec::new();
    for _ in 0..4 {
        h.media.end_of_stream();
        h.tasks.run_until_idle().await;
        let entry = h.session.current_entry().unwrap();
        assert_eq!(h.session.state(), PlaybackState::Playing);
        visited.push(entry.title);
    }

    assert_eq!(visited, vec!["B", "C", "A", "B"]);
    assert_eq!(
        h.hls.loads(),
        vec!["https://cdn/a.m3u8", "https://cdn/c.m3u8", "https://cdn/a.m3u8"]
    );
    assert_eq!(h.dash.loads(), vec!["https://cdn/b.mpd", "https://cdn/b.mpd"]);
}

#[tokio::test]
async fn test_advance_returns_entry_and_wraps() {
    let mut config = PlayerConfig::default();
    config.playlist = vec![
        PlaylistEntry::new("one.mpd", None),
        PlaylistEntry::new("two.mpd", None),
        PlaylistEntry::new("three.m3u8", None),
    ];
    let h = harness(config);
    assert!(h.session.launch().await.unwrap().is_ready());
    assert_eq!(h.session.current_entry().unwrap().url, "one.mpd");

    let len = h.session.playlist().len();
    for _ in 0..len {
        h.session.advance().await;
        let position = h.session.playlist().position().unwrap();
        assert!(position < len);
    }
    assert_eq!(h.session.current_entry().unwrap().url, "one.mpd");

    let next = h.session.advance().await.unwrap();
    assert_eq!(next.url, "two.mpd");
}

#[tokio::test]
async fn test_advance_on_empty_playlist() {
    let h = harness(PlayerConfig::default());
    assert!(h.session.advance().await.is_none());
    assert_eq!(h.session.state(), PlaybackState::Idle);
}

// =============================================================================
// Load Generation Tests
// =============================================================================

#[tokio::test]
async fn test_newer_load_supersedes_inflight_load() {
    let h = harness(PlayerConfig::default());
    let gate = h.hls.hold_next();

    let (first, second) = futures::join!(h.session.load("slow.m3u8", None, true), async {
        let outcome = h.session.load("fast.mpd", None, false).await;
        gate.send(()).expect("slow load still waiting");
        outcome
    });

    assert!(first.is_superseded());
    assert!(second.is_ready());
    assert_eq!(h.session.state(), PlaybackState::Paused);
    assert_eq!(h.session.current_entry().unwrap().url, "fast.mpd");
    assert_eq!(h.session.with_controller(|c| c.active_engine()), Some(EngineKind::Dash));
}

#[tokio::test]
async fn test_reload_supersedes_inflight_load() {
    let h = harness(PlayerConfig::default());
    let gate = h.hls.hold_next();

    let (first, second) = futures::join!(h.session.load("slow.m3u8", None, true), async {
        let outcome = h.session.reload_current().await;
        gate.send(()).expect("slow load still waiting");
        outcome
    });

    assert!(first.is_superseded());
    assert!(second.is_ready());
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert_eq!(h.hls.loads(), vec!["slow.m3u8", "slow.m3u8"]);
    assert_eq!(h.hls.unloads(), 1);
}

#[tokio::test]
async fn test_load_from_end_of_stream_callback() {
    let h = harness(PlayerConfig::default());
    h.session.load("first.m3u8", None, true).await;
    h.session.enqueue("next.mpd", None);
    h.tasks.run_until_idle().await;

    // Host reacts to `ended` by loading something else before auto-advance runs
    h.media.end_of_stream();
    assert_eq!(h.tasks.pending(), 1);
    assert!(h.session.load("override.m3u8", None, true).await.is_ready());
    h.tasks.run_until_idle().await;

    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert_eq!(h.session.current_entry().unwrap().url, "override.m3u8");
    assert_eq!(h.hls.loads(), vec!["first.m3u8", "override.m3u8"]);
    assert!(h.dash.loads().is_empty());
}

#[tokio::test]
async fn test_launch_plays_video_before_playlist() {
    let mut config = PlayerConfig::with_video("intro.m3u8");
    config.playlist = vec![PlaylistEntry::new("main.mpd", Some("Main".into()))];
    let h = harness(config);

    assert!(h.session.launch().await.unwrap().is_ready());
    let playlist = h.session.playlist();
    assert_eq!(playlist.len(), 2);
    assert_eq!(playlist.position(), Some(0));
    assert_eq!(h.session.current_entry().unwrap().url, "intro.m3u8");

    h.media.end_of_stream();
    h.tasks.run_until_idle().await;
    assert_eq!(h.session.current_entry().unwrap().title, "Main");
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test]
async fn test_manifest_failure_stalls_until_reload() {
    let h = harness(PlayerConfig::default());
    h.dash.fail_next("HTTP_404");

    let outcome = h.session.load("missing.mpd", None, true).await;
    assert!(matches!(outcome, LoadOutcome::Failed(ref e) if e.error_code() == "MANIFEST_LOAD"));
    assert_eq!(h.session.state(), PlaybackState::Error);
    assert!(h.media.paused());
    h.tasks.run_until_idle().await;

    h.session.play();
    assert!(h.media.paused());
    assert_eq!(h.media.queued(), 0);
    assert_eq!(h.tasks.pending(), 0);
    assert_eq!(h.dash.loads().len(), 1);

    assert!(h.session.reload_current().await.is_ready());
    assert_eq!(h.session.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_unsupported_environment() {
    let h = harness(PlayerConfig::default());
    h.hls.set_supported(false);
    h.dash.set_supported(false);

    let outcome = h.session.load("a.m3u8", None, true).await;
    assert!(matches!(outcome, LoadOutcome::Failed(ref e) if e.error_code() == "UNSUPPORTED_ENVIRONMENT"));
    assert_eq!(h.session.state(), PlaybackState::Error);
}

#[tokio::test]
async fn test_hls_falls_back_to_dash_engine() {
    let h = harness(PlayerConfig::default());
    h.hls.set_supported(false);

    assert!(h.session.load("a.m3u8", None, true).await.is_ready());
    assert_eq!(h.dash.loads(), vec!["a.m3u8"]);
    assert!(h.hls.loads().is_empty());
}

#[test]
fn test_invalid_config_rejected() {
    let media = Rc::new(MemoryMediaSource::new());
    let engines = EngineSet::new(
        Rc::new(ScriptedEngine::new(EngineKind::Hls)),
        Rc::new(ScriptedEngine::new(EngineKind::Dash)),
    );
    let result = PlayerSession::new(
        PlayerConfig::with_video(""),
        media,
        engines,
        None,
        TaskQueue::new().spawner(),
    );
    assert!(result.is_err());
}

// =============================================================================
// Transport Tests
// =============================================================================

#[tokio::test]
async fn test_seek_and_rate_ignore_invalid_input() {
    let h = harness(PlayerConfig::default());
    h.session.load("a.mpd", None, true).await;

    assert!(h.session.seek(30.0));
    assert!(!h.session.seek(100.0));
    assert_eq!(h.session.current_time(), 30.0);
    assert!(!h.session.seek(-45.0));
    assert_eq!(h.session.current_time(), 30.0);

    assert_eq!(h.session.set_playback_rate(1.5), 1.5);
    assert_eq!(h.session.set_playback_rate(8.0), 1.5);
    assert_eq!(h.session.playback_rate(), 1.5);
}

#[tokio::test]
async fn test_load_without_autoplay_stays_paused() {
    let mut config = PlayerConfig::with_video("https://cdn/a.m3u8");
    config.auto_play = false;
    let h = harness(config);

    assert!(h.session.launch().await.unwrap().is_ready());
    assert_eq!(h.session.state(), PlaybackState::Paused);
    assert!(h.media.paused());

    h.session.play();
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!(!h.media.paused());
}
