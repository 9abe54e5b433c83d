//! Player Session - Main orchestrator for playback
//!
//! Coordinates:
//! - Launch configuration
//! - Manifest loads and their completion
//! - End-of-stream auto-advance
//! - Event channel subscriptions

use crate::{
    channel::{Delivery, EventChannel},
    controller::{LoadOutcome, PendingLoad, PlaylistController},
    engine::EngineSet,
    media::MediaSource,
    MediaEvent, PlaybackState, Playlist, PlaylistEntry, PlayerConfig, Result,
};
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info, instrument};

/// Runs a future on the host's local executor
/// (`wasm_bindgen_futures::spawn_local`, `tokio::task::spawn_local`, ...)
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// Player session managing one media source
#[derive(Clone)]
pub struct PlayerSession {
    inner: Rc<SessionInner>,
}

struct SessionInner {
    config: PlayerConfig,
    media: Rc<dyn MediaSource>,
    channel: EventChannel,
    controller: RefCell<PlaylistController>,
    spawner: Spawner,
    launched: Cell<bool>,
}

impl PlayerSession {
    /// Create a new player session
    pub fn new(
        config: PlayerConfig,
        media: Rc<dyn MediaSource>,
        engines: EngineSet,
        delivery: Option<Rc<dyn Delivery>>,
        spawner: Spawner,
    ) -> Result<Self> {
        config.validate()?;

        let channel = EventChannel::new(Rc::clone(&media), delivery);
        let controller = PlaylistController::new(Rc::clone(&media), engines);
        let inner = Rc::new(SessionInner {
            config,
            media: Rc::clone(&media),
            channel,
            controller: RefCell::new(controller),
            spawner,
            launched: Cell::new(false),
        });

        let weak: Weak<SessionInner> = Rc::downgrade(&inner);
        media.add_listener(
            MediaEvent::Ended,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    if inner.media.looping() {
                        return;
                    }
                    let generation = inner
                        .controller
                        .try_borrow()
                        .ok()
                        .map(|controller| controller.generation());
                    let session = PlayerSession { inner };
                    let task = session.clone();
                    (session.inner.spawner)(Box::pin(async move {
                        task.end_of_stream(generation).await;
                    }));
                }
            }),
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    pub fn channel(&self) -> &EventChannel {
        &self.inner.channel
    }

    /// Apply the launch configuration and load the launch stream.
    ///
    /// The launch stream becomes the first playlist entry; configured
    /// playlist entries follow it. Only the first call does anything.
    #[instrument(skip(self))]
    pub async fn launch(&self) -> Option<LoadOutcome> {
        if self.inner.launched.replace(true) {
            debug!("Session already launched");
            return None;
        }
        let config = &self.inner.config;
        self.inner.media.set_looping(config.loop_playback);
        if config.subscribe_all {
            self.inner.channel.subscribe_all();
        }

        let pending = {
            let mut controller = self.inner.controller.borrow_mut();
            let pending = config.video.as_ref().map(|url| {
                info!(url = %url, "Launching stream");
                controller.load(url, config.title.clone(), config.auto_play)
            });
            for entry in &config.playlist {
                controller.enqueue(&entry.url, Some(entry.title.clone()));
            }
            match pending {
                Some(pending) => Some(pending),
                None if !config.playlist.is_empty() => {
                    info!(entries = config.playlist.len(), "Launching playlist");
                    controller.set_autoplay(config.auto_play);
                    Some(controller.dispatch())
                }
                None => None,
            }
        };

        match pending {
            Some(pending) => Some(self.drive(pending).await),
            None => {
                debug!("No launch stream configured");
                None
            }
        }
    }

    /// Replace the current entry with `url` and load it
    pub async fn load(&self, url: &str, title: Option<String>, autoplay: bool) -> LoadOutcome {
        let pending = self.inner.controller.borrow_mut().load(url, title, autoplay);
        self.drive(pending).await
    }

    /// Advance to the next entry and load it; returns the entry now current
    pub async fn advance(&self) -> Option<PlaylistEntry> {
        let pending = self.inner.controller.borrow_mut().advance();
        let entry = pending.as_ref().ok().map(|p| p.ticket().entry.clone());
        self.drive(pending).await;
        entry
    }

    /// Load the current entry again (error recovery, forced replay)
    pub async fn reload_current(&self) -> LoadOutcome {
        let pending = self.inner.controller.borrow_mut().reload_current();
        self.drive(pending).await
    }

    /// End-of-stream: detach the engine and continue with the next entry
    pub async fn handle_ended(&self) {
        self.end_of_stream(None).await;
    }

    /// `generation` is the load generation current when the media ended;
    /// an end of stream from a superseded load is ignored.
    async fn end_of_stream(&self, generation: Option<u64>) {
        {
            let mut controller = self.inner.controller.borrow_mut();
            if let Some(generation) = generation {
                if generation != controller.generation() {
                    debug!(generation, current = controller.generation(), "Ignoring end of stream from superseded load");
                    return;
                }
            }
            controller.on_ended();
        }
        if let Some(entry) = self.advance().await {
            debug!(url = %entry.url, "Auto-advanced after end of stream");
        }
    }

    /// Drive a dispatched load without holding the controller across the await
    async fn drive(&self, pending: Result<PendingLoad>) -> LoadOutcome {
        let pending = match pending {
            Ok(pending) => pending,
            Err(e) => return LoadOutcome::Failed(e),
        };
        let (ticket, future) = pending.into_parts();
        let result = future.await;
        self.inner.controller.borrow_mut().complete_load(&ticket, result)
    }

    pub fn enqueue(&self, url: &str, title: Option<String>) {
        self.inner.controller.borrow_mut().enqueue(url, title);
    }

    pub fn play(&self) {
        self.inner.controller.borrow_mut().play();
    }

    pub fn pause(&self) {
        self.inner.controller.borrow_mut().pause();
    }

    pub fn seek(&self, by: f64) -> bool {
        self.inner.controller.borrow().seek(by)
    }

    pub fn current_time(&self) -> f64 {
        self.inner.media.current_time()
    }

    pub fn set_current_time(&self, time: f64) -> bool {
        self.inner.controller.borrow().set_current_time(time)
    }

    pub fn playback_rate(&self) -> f64 {
        self.inner.media.playback_rate()
    }

    pub fn set_playback_rate(&self, rate: f64) -> f64 {
        self.inner.controller.borrow().set_playback_rate(rate)
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.controller.borrow().state()
    }

    pub fn current_entry(&self) -> Option<PlaylistEntry> {
        self.inner.controller.borrow().current_entry().cloned()
    }

    /// Snapshot of the playlist
    pub fn playlist(&self) -> Playlist {
        self.inner.controller.borrow().playlist().clone()
    }

    /// Run `f` with the controller borrowed
    pub fn with_controller<T>(&self, f: impl FnOnce(&PlaylistController) -> T) -> T {
        f(&*self.inner.controller.borrow())
    }

    pub fn subscribe(&self, events: impl IntoIterator<Item = MediaEvent>) {
        self.inner.channel.subscribe_many(events);
    }

    pub fn unsubscribe(&self, events: impl IntoIterator<Item = MediaEvent>) {
        self.inner.channel.unsubscribe_many(events);
    }

    pub fn subscribe_all(&self) {
        self.inner.channel.subscribe_all();
    }

    pub fn unsubscribe_all(&self) {
        self.inner.channel.unsubscribe_all();
    }

    /// Deliver a host-defined payload as an `External` message
    pub fn publish_external(&self, payload: &str) -> bool {
        self.inner.channel.publish(MediaEvent::External, payload)
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::{MemoryMediaSource, RecordingDelivery, ScriptedEngine, TaskQueue};
    use crate::EngineKind;

    struct Fixture {
        media: Rc<MemoryMediaSource>,
        hls: Rc<ScriptedEngine>,
        delivery: Rc<RecordingDelivery>,
        tasks: TaskQueue,
        session: PlayerSession,
    }

    fn fixture(config: PlayerConfig) -> Fixture {
        let media = Rc::new(MemoryMediaSource::new());
        let hls = Rc::new(ScriptedEngine::new(EngineKind::Hls).attached_to(media.clone(), 30.0));
        let dash = Rc::new(ScriptedEngine::new(EngineKind::Dash).attached_to(media.clone(), 30.0));
        let delivery = Rc::new(RecordingDelivery::new());
        let tasks = TaskQueue::new();
        let session = PlayerSession::new(
            config,
            media.clone(),
            EngineSet::new(hls.clone(), dash),
            Some(delivery.clone()),
            tasks.spawner(),
        )
        .unwrap();
        Fixture {
            media,
            hls,
            delivery,
            tasks,
            session,
        }
    }

    #[tokio::test]
    async fn test_session_creation() {
        let f = fixture(PlayerConfig::default());
        assert_eq!(f.session.state(), PlaybackState::Idle);
        assert!(f.session.launch().await.is_none());
        assert_eq!(f.session.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_launch_applies_config() {
        let mut config = PlayerConfig::with_video("https://cdn/live.m3u8");
        config.loop_playback = true;
        config.subscribe_all = true;
        let f = fixture(config);

        assert!(f.session.launch().await.unwrap().is_ready());
        assert!(f.media.looping());
        assert_eq!(f.session.channel().subscriptions().len(), 21);
        assert_eq!(f.session.state(), PlaybackState::Playing);
        assert_eq!(f.hls.loads(), vec!["https://cdn/live.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_second_launch_is_ignored() {
        let mut config = PlayerConfig::with_video("intro.m3u8");
        config.playlist = vec![PlaylistEntry::new("main.mpd", None)];
        let f = fixture(config);

        assert!(f.session.launch().await.unwrap().is_ready());
        assert!(f.session.launch().await.is_none());
        assert_eq!(f.session.playlist().len(), 2);
        assert_eq!(f.hls.loads(), vec!["intro.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_end_of_stream_advances() {
        let f = fixture(PlayerConfig::default());
        assert!(f.session.load("a.m3u8", None, true).await.is_ready());
        f.session.enqueue("b.mpd", None);

        f.media.end_of_stream();
        assert_eq!(f.tasks.pending(), 1);
        f.tasks.run_until_idle().await;

        assert_eq!(f.session.current_entry().unwrap().url, "b.mpd");
        assert_eq!(f.session.state(), PlaybackState::Playing);
        assert_eq!(f.hls.unloads(), 1);
    }

    #[tokio::test]
    async fn test_native_loop_does_not_advance() {
        let f = fixture(PlayerConfig::default());
        f.session.load("a.m3u8", None, true).await;
        f.session.enqueue("b.mpd", None);
        f.media.set_looping(true);

        f.media.end_of_stream();
        assert_eq!(f.tasks.pending(), 0);
        assert_eq!(f.session.current_entry().unwrap().url, "a.m3u8");
    }

    #[tokio::test]
    async fn test_publish_external() {
        let f = fixture(PlayerConfig::default());
        assert!(f.session.publish_external("{\"cue\":1}"));
        assert_eq!(f.delivery.events(), vec![MediaEvent::External]);
        assert_eq!(f.delivery.payloads(), vec!["{\"cue\":1}".to_string()]);
    }
}
