//! Playlist Controller - playlist state, engine dispatch, and transport controls
//!
//! Manifest loads are asynchronous. Every dispatch returns a [`PendingLoad`]
//! tagged with a load generation; the caller drives its future and reports the
//! result through [`PlaylistController::complete_load`]. Results from older
//! generations are discarded, so starting a new load always wins over one that
//! is still in flight.

use crate::{
    engine::{EngineSet, PlaybackEngine},
    media::MediaSource,
    EngineKind, Error, PlaybackState, Playlist, PlaylistEntry, ReadyState, Result,
};
use futures::future::LocalBoxFuture;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, instrument, warn};

/// Exclusive lower bound for accepted playback rates
pub const MIN_PLAYBACK_RATE: f64 = -1.0;
/// Exclusive upper bound for accepted playback rates
pub const MAX_PLAYBACK_RATE: f64 = 5.0;

/// Identifies one dispatched load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    /// Load generation; only the newest generation may complete
    pub generation: u64,
    /// Engine the manifest was handed to
    pub engine: EngineKind,
    /// Playlist index being loaded
    pub index: usize,
    /// Entry being loaded
    pub entry: PlaylistEntry,
    /// Start playback once ready
    pub autoplay: bool,
}

/// A dispatched manifest load that still has to be driven to completion
pub struct PendingLoad {
    ticket: LoadTicket,
    future: LocalBoxFuture<'static, Result<()>>,
}

impl PendingLoad {
    pub fn ticket(&self) -> &LoadTicket {
        &self.ticket
    }

    /// Split into the ticket and the engine's load future
    pub fn into_parts(self) -> (LoadTicket, LocalBoxFuture<'static, Result<()>>) {
        (self.ticket, self.future)
    }
}

impl fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoad")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

/// How a load ended
#[derive(Debug)]
pub enum LoadOutcome {
    /// Manifest loaded, controller is `Ready`, `Playing` or `Paused`
    Ready,
    /// Load or dispatch failed; the error has already been logged
    Failed(Error),
    /// A newer load started before this one finished
    Superseded,
}

impl LoadOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadOutcome::Ready)
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadOutcome::Superseded)
    }
}

/// Owns the playlist and the active engine for one media source
pub struct PlaylistController {
    media: Rc<dyn MediaSource>,
    engines: EngineSet,
    playlist: Playlist,
    active: Option<Rc<dyn PlaybackEngine>>,
    state: PlaybackState,
    generation: u64,
    autoplay: bool,
}

impl PlaylistController {
    pub fn new(media: Rc<dyn MediaSource>, engines: EngineSet) -> Self {
        Self {
            media,
            engines,
            playlist: Playlist::new(),
            active: None,
            state: PlaybackState::Idle,
            generation: 0,
            autoplay: false,
        }
    }

    /// Whether the next dispatch starts playback once ready
    pub fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn current_entry(&self) -> Option<&PlaylistEntry> {
        self.playlist.current()
    }

    /// Family of the engine currently attached
    pub fn active_engine(&self) -> Option<EngineKind> {
        self.active.as_ref().map(|engine| engine.kind())
    }

    /// Generation of the most recent dispatch
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn set_state(&mut self, new_state: PlaybackState) -> Result<()> {
        let current = self.state;
        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current,
                to: new_state,
            });
        }
        self.state = new_state;
        info!(from = %current, to = %new_state, "State transition");
        Ok(())
    }

    /// Replace the current entry with `url` and dispatch it.
    ///
    /// Playback is paused and rewound first. Once the load completes playback
    /// starts only when `autoplay` is set.
    #[instrument(skip(self, title))]
    pub fn load(&mut self, url: &str, title: Option<String>, autoplay: bool) -> Result<PendingLoad> {
        self.media.pause();
        self.media.set_current_time(0.0);
        let index = self.playlist.replace_current(PlaylistEntry::new(url, title));
        debug!(index, "Playlist entry replaced");
        self.autoplay = autoplay;
        self.dispatch()
    }

    /// Append an entry without loading it
    pub fn enqueue(&mut self, url: &str, title: Option<String>) {
        self.playlist.push(PlaylistEntry::new(url, title));
    }

    /// Hand the entry under the cursor to the matching engine.
    ///
    /// Starts the playlist if it has not started yet. The previously active
    /// engine is unloaded before the new one begins loading.
    pub fn dispatch(&mut self) -> Result<PendingLoad> {
        let index = match self.playlist.start() {
            Some(_) => self.playlist.position().unwrap_or(0),
            None => return Err(Error::EmptyPlaylist),
        };
        let entry = self.playlist.entries()[index].clone();

        if let Some(previous) = self.active.take() {
            debug!(engine = %previous.kind(), "Unloading previous engine");
            previous.unload();
        }

        // Bumped before selection so a failed dispatch also supersedes older loads
        self.generation += 1;
        let engine = match self.engines.select(&entry.url) {
            Ok(engine) => Rc::clone(engine),
            Err(e) => {
                error!(url = %entry.url, error = %e, code = e.error_code(), "Cannot initialize playback");
                self.state = PlaybackState::Error;
                return Err(e);
            }
        };

        self.set_state(PlaybackState::Loading)?;
        self.active = Some(Rc::clone(&engine));

        info!(
            url = %entry.url,
            title = %entry.title,
            engine = %engine.kind(),
            generation = self.generation,
            "Loading stream"
        );

        let ticket = LoadTicket {
            generation: self.generation,
            engine: engine.kind(),
            index,
            entry: entry.clone(),
            autoplay: self.autoplay,
        };
        let url = entry.url;
        let future: LocalBoxFuture<'static, Result<()>> =
            Box::pin(async move { engine.load(&url).await });

        Ok(PendingLoad { ticket, future })
    }

    /// Move to the next entry (wrapping to the first) and dispatch it.
    ///
    /// The ticket of the returned load carries the entry now under the cursor.
    pub fn advance(&mut self) -> Result<PendingLoad> {
        match self.playlist.advance() {
            Some(entry) => debug!(url = %entry.url, "Advancing playlist"),
            None => return Err(Error::EmptyPlaylist),
        }
        self.autoplay = true;
        self.dispatch()
    }

    /// Pause, rewind, and load the current entry again on a fresh engine
    pub fn reload_current(&mut self) -> Result<PendingLoad> {
        self.media.pause();
        self.media.set_current_time(0.0);
        self.dispatch()
    }

    /// Record the result of a dispatched load
    pub fn complete_load(&mut self, ticket: &LoadTicket, result: Result<()>) -> LoadOutcome {
        if ticket.generation != self.generation {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                url = %ticket.entry.url,
                "Discarding superseded load"
            );
            return LoadOutcome::Superseded;
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.set_state(PlaybackState::Ready) {
                    warn!(error = %e, "Load completed in unexpected state");
                }
                info!(url = %ticket.entry.url, engine = %ticket.engine, "Stream ready");
                if ticket.autoplay {
                    self.play();
                } else {
                    self.pause();
                }
                LoadOutcome::Ready
            }
            Err(e) => {
                error!(
                    url = %ticket.entry.url,
                    engine = %ticket.engine,
                    code = e.error_code(),
                    error = %e,
                    "Manifest load failed"
                );
                if let Err(transition) = self.set_state(PlaybackState::Error) {
                    warn!(error = %transition, "Forcing error state");
                    self.state = PlaybackState::Error;
                }
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Mark end of stream and detach the engine
    pub fn on_ended(&mut self) {
        if let Err(e) = self.set_state(PlaybackState::Ended) {
            debug!(error = %e, "End of stream outside playback");
            return;
        }
        if let Some(engine) = self.active.take() {
            engine.unload();
        }
    }

    /// Whether transport controls reach the media source
    fn has_usable_engine(&self) -> bool {
        self.active.is_some() && self.state != PlaybackState::Error
    }

    pub fn play(&mut self) {
        if !self.has_usable_engine() {
            debug!(state = %self.state, "play() without a usable engine");
            return;
        }
        self.media.play();
        if let Err(e) = self.set_state(PlaybackState::Playing) {
            debug!(error = %e, "play() left state unchanged");
        }
    }

    pub fn pause(&mut self) {
        if !self.has_usable_engine() {
            debug!(state = %self.state, "pause() without a usable engine");
            return;
        }
        self.media.pause();
        if let Err(e) = self.set_state(PlaybackState::Paused) {
            debug!(error = %e, "pause() left state unchanged");
        }
    }

    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    /// Set the position when `0 < time < duration`; anything else is ignored.
    ///
    /// Returns whether the position was changed.
    pub fn set_current_time(&self, time: f64) -> bool {
        let duration = self.media.duration();
        if time > 0.0 && time < duration {
            self.media.set_current_time(time);
            true
        } else {
            debug!(time, duration, "Ignoring out-of-range position");
            false
        }
    }

    /// Relative seek; targets outside `(0, duration)` are ignored, not clamped
    pub fn seek(&self, by: f64) -> bool {
        self.set_current_time(self.current_time() + by)
    }

    pub fn playback_rate(&self) -> f64 {
        self.media.playback_rate()
    }

    /// Set the rate when `-1 < rate < 5` and return the rate now in effect
    pub fn set_playback_rate(&self, rate: f64) -> f64 {
        if rate > MIN_PLAYBACK_RATE && rate < MAX_PLAYBACK_RATE {
            self.media.set_playback_rate(rate);
        } else {
            debug!(rate, "Ignoring out-of-range playback rate");
        }
        self.media.playback_rate()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.media.ready_state()
    }

    pub fn paused(&self) -> bool {
        self.media.paused()
    }

    pub fn duration(&self) -> f64 {
        self.media.duration()
    }

    /// Volume on a 0-100 scale
    pub fn volume(&self) -> f64 {
        self.media.volume() * 100.0
    }

    pub fn muted(&self) -> bool {
        self.media.muted()
    }
}
