//! In-memory host for headless runs and tests
//!
//! - [`MemoryMediaSource`]: a media element that keeps its state in memory
//!   and queues the native events a browser would for each operation
//! - [`ScriptedEngine`]: a playback engine whose load results are scripted
//! - [`RecordingDelivery`]: a delivery that keeps every message
//! - [`TaskQueue`]: a deterministic local executor for [`Spawner`]

use crate::{
    channel::Delivery,
    engine::PlaybackEngine,
    media::{EventHandler, MediaSource},
    session::Spawner,
    EngineKind, Error, MediaEvent, MediaMessage, ReadyState, Result,
};
use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

#[derive(Debug, Clone)]
struct MediaState {
    ready_state: ReadyState,
    current_time: f64,
    duration: f64,
    playback_rate: f64,
    paused: bool,
    volume: f64,
    muted: bool,
    looping: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            ready_state: ReadyState::HaveNothing,
            current_time: 0.0,
            duration: f64::NAN,
            playback_rate: 1.0,
            paused: true,
            volume: 1.0,
            muted: false,
            looping: false,
        }
    }
}

/// Handlers, listeners and events waiting to be dispatched
#[derive(Default)]
struct EventQueue {
    handlers: RefCell<HashMap<MediaEvent, EventHandler>>,
    listeners: RefCell<HashMap<MediaEvent, Vec<EventHandler>>>,
    queued: RefCell<VecDeque<MediaEvent>>,
}

impl EventQueue {
    fn dispatch(&self, event: MediaEvent) {
        let handler = self.handlers.borrow().get(&event).cloned();
        let listeners = self.listeners.borrow().get(&event).cloned().unwrap_or_default();
        if let Some(handler) = handler {
            handler();
        }
        for listener in listeners {
            listener();
        }
    }

    /// Dispatch queued events, including ones queued by their handlers
    fn drain(&self) {
        loop {
            let next = self.queued.borrow_mut().pop_front();
            match next {
                Some(event) => self.dispatch(event),
                None => break,
            }
        }
    }
}

/// Media element kept in memory.
///
/// Operations queue the same native events a browser element would (`play`
/// queues `play` and `playing`, a position change queues `seeking` and
/// `seeked`...). Queued events are dispatched by [`flush`](Self::flush), or
/// by a task on the scheduler given to [`with_scheduler`](Self::with_scheduler),
/// never inside the operation that caused them.
#[derive(Default)]
pub struct MemoryMediaSource {
    state: RefCell<MediaState>,
    events: Rc<EventQueue>,
    scheduler: Option<Spawner>,
}

impl MemoryMediaSource {
    /// Source whose queued events wait for [`flush`](Self::flush)
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that schedules a flush on `scheduler` whenever events are queued
    pub fn with_scheduler(scheduler: Spawner) -> Self {
        Self {
            scheduler: Some(scheduler),
            ..Self::default()
        }
    }

    /// Dispatch `event` right away, as if the element fired it from the event loop
    pub fn fire(&self, event: MediaEvent) {
        self.events.dispatch(event);
    }

    /// Dispatch every queued event
    pub fn flush(&self) {
        self.events.drain();
    }

    /// Number of events waiting to be dispatched
    pub fn queued(&self) -> usize {
        self.events.queued.borrow().len()
    }

    fn queue(&self, event: MediaEvent) {
        let first = {
            let mut queued = self.events.queued.borrow_mut();
            queued.push_back(event);
            queued.len() == 1
        };
        if let (true, Some(schedule)) = (first, &self.scheduler) {
            let events = Rc::clone(&self.events);
            schedule(Box::pin(async move { events.drain() }));
        }
    }

    pub fn has_handler(&self, event: MediaEvent) -> bool {
        self.events.handlers.borrow().contains_key(&event)
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.state.borrow_mut().ready_state = ready_state;
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.borrow_mut().duration = duration;
        self.queue(MediaEvent::DurationChange);
    }

    pub fn set_volume(&self, volume: f64) {
        self.state.borrow_mut().volume = volume.clamp(0.0, 1.0);
        self.queue(MediaEvent::VolumeChange);
    }

    pub fn set_muted(&self, muted: bool) {
        self.state.borrow_mut().muted = muted;
        self.queue(MediaEvent::VolumeChange);
    }

    /// Simulate an engine attaching media of `duration` seconds
    pub fn attach(&self, duration: f64) {
        self.queue(MediaEvent::LoadStart);
        {
            let mut state = self.state.borrow_mut();
            state.duration = duration;
            state.ready_state = ReadyState::HaveMetadata;
        }
        self.queue(MediaEvent::DurationChange);
        self.queue(MediaEvent::LoadedMetadata);
        self.set_ready_state(ReadyState::HaveCurrentData);
        self.queue(MediaEvent::LoadedData);
        self.set_ready_state(ReadyState::HaveFutureData);
        self.queue(MediaEvent::CanPlay);
        self.set_ready_state(ReadyState::HaveEnoughData);
        self.queue(MediaEvent::CanPlayThrough);
    }

    /// Simulate an engine detaching its media
    pub fn detach(&self) {
        let was_loaded = {
            let mut state = self.state.borrow_mut();
            let was_loaded = state.ready_state != ReadyState::HaveNothing;
            state.ready_state = ReadyState::HaveNothing;
            state.duration = f64::NAN;
            state.current_time = 0.0;
            was_loaded
        };
        if was_loaded {
            self.queue(MediaEvent::Aborted);
            self.queue(MediaEvent::DurationChange);
        }
    }

    /// Simulate playback reaching the end of the media.
    ///
    /// Events still queued are dispatched first; the end-of-stream events are
    /// dispatched before this returns.
    pub fn end_of_stream(&self) {
        self.flush();
        let looping = {
            let mut state = self.state.borrow_mut();
            if state.duration.is_finite() {
                state.current_time = state.duration;
            }
            if state.looping {
                state.current_time = 0.0;
            } else {
                state.paused = true;
            }
            state.looping
        };
        self.fire(MediaEvent::TimeUpdate);
        if looping {
            self.fire(MediaEvent::Seeking);
            self.fire(MediaEvent::Seeked);
        } else {
            self.fire(MediaEvent::Pause);
            self.fire(MediaEvent::Ended);
        }
    }
}

impl MediaSource for MemoryMediaSource {
    fn ready_state(&self) -> ReadyState {
        self.state.borrow().ready_state
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn set_current_time(&self, time: f64) {
        self.state.borrow_mut().current_time = time;
        self.queue(MediaEvent::Seeking);
        self.queue(MediaEvent::TimeUpdate);
        self.queue(MediaEvent::Seeked);
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn playback_rate(&self) -> f64 {
        self.state.borrow().playback_rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.playback_rate != rate;
            state.playback_rate = rate;
            changed
        };
        if changed {
            self.queue(MediaEvent::RateChange);
        }
    }

    fn play(&self) {
        let was_paused = std::mem::replace(&mut self.state.borrow_mut().paused, false);
        if was_paused {
            self.queue(MediaEvent::Play);
            self.queue(MediaEvent::Playing);
        }
    }

    fn pause(&self) {
        let was_paused = std::mem::replace(&mut self.state.borrow_mut().paused, true);
        if !was_paused {
            self.queue(MediaEvent::Pause);
        }
    }

    fn paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    fn muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn looping(&self) -> bool {
        self.state.borrow().looping
    }

    fn set_looping(&self, looping: bool) {
        self.state.borrow_mut().looping = looping;
    }

    fn set_handler(&self, event: MediaEvent, handler: Option<EventHandler>) {
        if event.is_external() {
            return;
        }
        let mut handlers = self.events.handlers.borrow_mut();
        match handler {
            Some(handler) => {
                handlers.insert(event, handler);
            }
            None => {
                handlers.remove(&event);
            }
        }
    }

    fn add_listener(&self, event: MediaEvent, listener: EventHandler) {
        if event.is_external() {
            return;
        }
        self.events.listeners.borrow_mut().entry(event).or_default().push(listener);
    }
}

enum Script {
    Ready,
    Fail(String),
    Hold(oneshot::Receiver<()>),
}

/// Playback engine with scripted load results.
///
/// Loads succeed unless a result was queued with [`ScriptedEngine::fail_next`]
/// or [`ScriptedEngine::hold_next`].
pub struct ScriptedEngine {
    kind: EngineKind,
    supported: Cell<bool>,
    scripts: RefCell<VecDeque<Script>>,
    loads: RefCell<Vec<String>>,
    unloads: Cell<usize>,
    media: Option<(Rc<MemoryMediaSource>, f64)>,
}

impl ScriptedEngine {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            supported: Cell::new(true),
            scripts: RefCell::new(VecDeque::new()),
            loads: RefCell::new(Vec::new()),
            unloads: Cell::new(0),
            media: None,
        }
    }

    /// Attach media of `duration` seconds to `media` on every successful load
    pub fn attached_to(mut self, media: Rc<MemoryMediaSource>, duration: f64) -> Self {
        self.media = Some((media, duration));
        self
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.set(supported);
    }

    /// Fail the next load with engine error `code`
    pub fn fail_next(&self, code: impl Into<String>) {
        self.scripts.borrow_mut().push_back(Script::Fail(code.into()));
    }

    /// Hold the next load until the returned sender fires.
    ///
    /// Dropping the sender fails the load.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.scripts.borrow_mut().push_back(Script::Hold(rx));
        tx
    }

    /// URLs passed to `load`, in order
    pub fn loads(&self) -> Vec<String> {
        self.loads.borrow().clone()
    }

    pub fn unloads(&self) -> usize {
        self.unloads.get()
    }

    fn attach(&self) {
        if let Some((media, duration)) = &self.media {
            media.attach(*duration);
        }
    }
}

#[async_trait(?Send)]
impl PlaybackEngine for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn is_supported(&self) -> bool {
        self.supported.get()
    }

    async fn load(&self, url: &str) -> Result<()> {
        self.loads.borrow_mut().push(url.to_string());
        let script = self.scripts.borrow_mut().pop_front().unwrap_or(Script::Ready);
        match script {
            Script::Ready => {}
            Script::Fail(code) => {
                return Err(Error::manifest_load(
                    self.kind,
                    code,
                    format!("scripted failure for {url}"),
                ));
            }
            Script::Hold(gate) => {
                gate.await.map_err(|_| {
                    Error::manifest_load(self.kind, "CANCELLED", format!("load of {url} abandoned"))
                })?;
            }
        }
        self.attach();
        Ok(())
    }

    fn unload(&self) {
        self.unloads.set(self.unloads.get() + 1);
        if let Some((media, _)) = &self.media {
            media.detach();
        }
    }
}

/// Delivery that records every message
#[derive(Default)]
pub struct RecordingDelivery {
    messages: RefCell<Vec<String>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw serialized messages
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// Messages parsed back
    pub fn parsed(&self) -> Vec<MediaMessage> {
        self.messages
            .borrow()
            .iter()
            .filter_map(|m| MediaMessage::from_json(m).ok())
            .collect()
    }

    pub fn events(&self) -> Vec<MediaEvent> {
        self.parsed().iter().map(MediaMessage::event).collect()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.parsed().iter().map(|m| m.message().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl Delivery for RecordingDelivery {
    fn deliver(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

/// FIFO of spawned tasks, run one after another on demand
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<LocalBoxFuture<'static, ()>>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawner that queues tasks here
    pub fn spawner(&self) -> Spawner {
        let tasks = Rc::clone(&self.tasks);
        Rc::new(move |task: LocalBoxFuture<'static, ()>| tasks.borrow_mut().push_back(task))
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run queued tasks, including ones they spawn, until the queue is empty
    pub async fn run_until_idle(&self) {
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            match next {
                Some(task) => task.await,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_fires_on_play_and_pause() {
        let media = MemoryMediaSource::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        for event in [MediaEvent::Play, MediaEvent::Playing, MediaEvent::Pause] {
            let fired = fired.clone();
            media.add_listener(event, Rc::new(move || fired.borrow_mut().push(event)));
        }

        media.play();
        media.play();
        media.pause();
        media.pause();
        assert!(fired.borrow().is_empty());
        assert_eq!(media.queued(), 3);

        media.flush();
        assert_eq!(
            *fired.borrow(),
            vec![MediaEvent::Play, MediaEvent::Playing, MediaEvent::Pause]
        );
        assert_eq!(media.queued(), 0);
    }

    #[test]
    fn test_scheduled_source_dispatches_from_task() {
        let tasks = TaskQueue::new();
        let media = Rc::new(MemoryMediaSource::with_scheduler(tasks.spawner()));
        let fired = Rc::new(Cell::new(0));
        let seen = fired.clone();
        media.add_listener(MediaEvent::Seeked, Rc::new(move || seen.set(seen.get() + 1)));

        media.set_current_time(4.0);
        media.set_playback_rate(2.0);
        assert_eq!(fired.get(), 0);
        assert_eq!(tasks.pending(), 1);

        tokio_test::block_on(tasks.run_until_idle());
        assert_eq!(fired.get(), 1);
        assert_eq!(media.queued(), 0);
    }

    #[test]
    fn test_end_of_stream_flushes_queue_first() {
        let media = MemoryMediaSource::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        for event in [MediaEvent::Playing, MediaEvent::Ended] {
            let fired = fired.clone();
            media.add_listener(event, Rc::new(move || fired.borrow_mut().push(event)));
        }

        media.play();
        media.end_of_stream();
        assert_eq!(*fired.borrow(), vec![MediaEvent::Playing, MediaEvent::Ended]);
        assert!(media.paused());
    }

    #[test]
    fn test_memory_source_attach() {
        let media = MemoryMediaSource::new();
        media.attach(12.5);
        assert_eq!(media.duration(), 12.5);
        assert_eq!(media.ready_state(), ReadyState::HaveEnoughData);

        media.detach();
        assert!(media.duration().is_nan());
        assert_eq!(media.ready_state(), ReadyState::HaveNothing);
    }

    #[test]
    fn test_scripted_engine_results() {
        let engine = ScriptedEngine::new(EngineKind::Hls);
        engine.fail_next("404");

        let first = tokio_test::block_on(engine.load("a.m3u8"));
        assert!(matches!(first, Err(Error::ManifestLoad { .. })));
        assert!(tokio_test::block_on(engine.load("b.m3u8")).is_ok());
        assert_eq!(engine.loads(), vec!["a.m3u8".to_string(), "b.m3u8".to_string()]);
    }

    #[test]
    fn test_dropped_hold_fails_load() {
        let engine = ScriptedEngine::new(EngineKind::Dash);
        drop(engine.hold_next());
        let result = tokio_test::block_on(engine.load("a.mpd"));
        assert!(matches!(result, Err(Error::ManifestLoad { code, .. }) if code == "CANCELLED"));
    }

    #[test]
    fn test_task_queue_runs_nested_tasks() {
        let queue = TaskQueue::new();
        let spawn = queue.spawner();
        let ran = Rc::new(Cell::new(0));

        let inner_ran = ran.clone();
        let inner_spawn = spawn.clone();
        spawn(Box::pin(async move {
            inner_ran.set(inner_ran.get() + 1);
            let nested = inner_ran.clone();
            inner_spawn(Box::pin(async move { nested.set(nested.get() + 1) }));
        }));

        assert_eq!(queue.pending(), 1);
        tokio_test::block_on(queue.run_until_idle());
        assert_eq!(ran.get(), 2);
        assert_eq!(queue.pending(), 0);
    }
}
