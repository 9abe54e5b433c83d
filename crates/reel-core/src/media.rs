//! Media source abstraction
//!
//! The media source is the element that actually renders video: a `<video>`
//! element in the browser, or [`crate::sim::MemoryMediaSource`] in tests.
//! Methods take `&self` because the underlying element is shared with the
//! playback engines and mutates behind our back.

use crate::{MediaEvent, ReadyState};
use std::rc::Rc;

/// Callback bound to a native media event
pub type EventHandler = Rc<dyn Fn()>;

/// Media element surface required by the channel and the controller.
///
/// Handlers and listeners run from the host's event loop. An operation such
/// as [`play`](Self::play) or [`set_current_time`](Self::set_current_time)
/// must not run them before it returns; the events it causes are dispatched
/// afterwards, as a browser queues media element events.
pub trait MediaSource {
    /// Current buffering state
    fn ready_state(&self) -> ReadyState;

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, time: f64);

    /// Content duration in seconds (`NaN` until metadata is known)
    fn duration(&self) -> f64;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64);

    fn play(&self);

    fn pause(&self);

    fn paused(&self) -> bool;

    /// Volume in `[0, 1]`
    fn volume(&self) -> f64;

    fn muted(&self) -> bool;

    /// Native looping of the current media (restarts instead of ending)
    fn looping(&self) -> bool;

    fn set_looping(&self, looping: bool);

    /// Set or clear the single handler slot for `event` (`onended`-style).
    ///
    /// Setting a handler replaces the previous one. Implementations ignore
    /// [`MediaEvent::External`]. Handlers may call back into the player.
    fn set_handler(&self, event: MediaEvent, handler: Option<EventHandler>);

    /// Add a listener for `event` (`addEventListener`-style); listeners stack
    /// and are independent of the handler slot.
    fn add_listener(&self, event: MediaEvent, listener: EventHandler);
}
