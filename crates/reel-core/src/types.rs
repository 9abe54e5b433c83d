//! Core types for media events, engines, and playback state

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Media lifecycle events forwarded to the host.
///
/// Every kind except [`MediaEvent::External`] corresponds to exactly one native
/// event on the media element. `External` marks messages injected by the host
/// itself and is never bound to the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MediaEvent {
    Aborted = 1,
    CanPlay = 2,
    CanPlayThrough = 3,
    DurationChange = 4,
    Ended = 5,
    Error = 6,
    LoadedData = 7,
    LoadedMetadata = 8,
    LoadStart = 9,
    Pause = 10,
    Play = 11,
    Playing = 12,
    Progress = 13,
    RateChange = 14,
    Seeked = 15,
    Seeking = 16,
    Stalled = 17,
    Suspend = 18,
    TimeUpdate = 19,
    VolumeChange = 20,
    Waiting = 21,
    External = 22,
}

/// Event kind to native event name, in code order.
const EVENT_TABLE: [(MediaEvent, Option<&str>); 22] = [
    (MediaEvent::Aborted, Some("abort")),
    (MediaEvent::CanPlay, Some("canplay")),
    (MediaEvent::CanPlayThrough, Some("canplaythrough")),
    (MediaEvent::DurationChange, Some("durationchange")),
    (MediaEvent::Ended, Some("ended")),
    (MediaEvent::Error, Some("error")),
    (MediaEvent::LoadedData, Some("loadeddata")),
    (MediaEvent::LoadedMetadata, Some("loadedmetadata")),
    (MediaEvent::LoadStart, Some("loadstart")),
    (MediaEvent::Pause, Some("pause")),
    (MediaEvent::Play, Some("play")),
    (MediaEvent::Playing, Some("playing")),
    (MediaEvent::Progress, Some("progress")),
    (MediaEvent::RateChange, Some("ratechange")),
    (MediaEvent::Seeked, Some("seeked")),
    (MediaEvent::Seeking, Some("seeking")),
    (MediaEvent::Stalled, Some("stalled")),
    (MediaEvent::Suspend, Some("suspend")),
    (MediaEvent::TimeUpdate, Some("timeupdate")),
    (MediaEvent::VolumeChange, Some("volumechange")),
    (MediaEvent::Waiting, Some("waiting")),
    (MediaEvent::External, None),
];

impl MediaEvent {
    /// All event kinds, in code order
    pub fn all() -> impl Iterator<Item = MediaEvent> {
        EVENT_TABLE.iter().map(|(event, _)| *event)
    }

    /// Event kinds backed by a native media element event
    pub fn native() -> impl Iterator<Item = MediaEvent> {
        EVENT_TABLE
            .iter()
            .filter(|(_, name)| name.is_some())
            .map(|(event, _)| *event)
    }

    /// Wire code of this event
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up an event by its wire code
    pub fn from_code(code: u8) -> Result<Self> {
        EVENT_TABLE
            .get(usize::from(code).wrapping_sub(1))
            .map(|(event, _)| *event)
            .ok_or(Error::UnknownEvent(code.into()))
    }

    /// Native event name on the media element (`None` for `External`)
    pub fn native_name(self) -> Option<&'static str> {
        EVENT_TABLE[usize::from(self.code() - 1)].1
    }

    /// Look up an event by its native name
    pub fn from_native_name(name: &str) -> Option<Self> {
        EVENT_TABLE
            .iter()
            .find(|(_, native)| *native == Some(name))
            .map(|(event, _)| *event)
    }

    /// Name of the element's handler property, e.g. `onended`
    pub fn handler_property(self) -> Option<String> {
        self.native_name().map(|name| format!("on{name}"))
    }

    pub fn is_external(self) -> bool {
        self == MediaEvent::External
    }
}

/// Codes arriving from a host as plain numbers; anything past `u8` is unknown
impl TryFrom<u32> for MediaEvent {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        u8::try_from(code)
            .map_err(|_| Error::UnknownEvent(code))
            .and_then(MediaEvent::from_code)
    }
}

impl fmt::Display for MediaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.native_name().unwrap_or("external"))
    }
}

impl Serialize for MediaEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MediaEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        MediaEvent::from_code(code).map_err(serde::de::Error::custom)
    }
}

/// Media element buffering state (`HTMLMediaElement.readyState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
#[repr(u8)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl From<u8> for ReadyState {
    /// Values above 4 are clamped to `HaveEnoughData`
    fn from(value: u8) -> Self {
        match value {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }
}

impl From<ReadyState> for u8 {
    fn from(state: ReadyState) -> Self {
        state as u8
    }
}

/// Playback engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// HLS engine (hls.js in the browser)
    Hls,
    /// DASH-capable engine (shaka-player in the browser)
    Dash,
}

impl EngineKind {
    /// The engine tried when this one is unavailable.
    ///
    /// shaka-player also plays HLS, so HLS falls back to the DASH engine;
    /// hls.js cannot play DASH, so DASH has no fallback.
    pub fn fallback(self) -> Option<EngineKind> {
        match self {
            EngineKind::Hls => Some(EngineKind::Dash),
            EngineKind::Dash => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Hls => write!(f, "hls"),
            EngineKind::Dash => write!(f, "dash"),
        }
    }
}

/// Controller playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No content dispatched yet
    #[default]
    Idle,
    /// Engine is loading a manifest
    Loading,
    /// Manifest loaded, playback not started
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Reached end of stream
    Ended,
    /// Manifest load failed; waits for reload or advance
    Error,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // Any state can start a new load
            (_, Loading) |
            // From Loading
            (Loading, Ready) | (Loading, Error) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) |
            // From Playing
            (Playing, Paused) | (Playing, Ended) | (Playing, Error) |
            // From Paused
            (Paused, Playing) | (Paused, Ended) |
            // From Ended
            (Ended, Playing)
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_table_is_in_code_order() {
        for (index, event) in MediaEvent::all().enumerate() {
            assert_eq!(usize::from(event.code()), index + 1);
            assert_eq!(MediaEvent::from_code(event.code()).unwrap(), event);
        }
        assert_eq!(MediaEvent::all().count(), 22);
    }

    #[test]
    fn test_native_excludes_external() {
        assert_eq!(MediaEvent::native().count(), 21);
        assert!(MediaEvent::native().all(|e| !e.is_external()));
        assert_eq!(MediaEvent::External.native_name(), None);
        assert_eq!(MediaEvent::External.handler_property(), None);
    }

    #[test]
    fn test_native_names() {
        assert_eq!(MediaEvent::Aborted.native_name(), Some("abort"));
        assert_eq!(MediaEvent::LoadedMetadata.native_name(), Some("loadedmetadata"));
        assert_eq!(MediaEvent::Ended.handler_property().as_deref(), Some("onended"));
        assert_eq!(MediaEvent::from_native_name("timeupdate"), Some(MediaEvent::TimeUpdate));
        assert_eq!(MediaEvent::from_native_name("resize"), None);
    }

    #[test]
    fn test_unknown_codes_rejected() {
        assert!(matches!(MediaEvent::from_code(0), Err(Error::UnknownEvent(0))));
        assert!(matches!(MediaEvent::from_code(23), Err(Error::UnknownEvent(23))));
    }

    #[test]
    fn test_wide_codes_do_not_wrap() {
        assert_eq!(MediaEvent::try_from(22u32).unwrap(), MediaEvent::External);
        assert!(matches!(MediaEvent::try_from(278u32), Err(Error::UnknownEvent(278))));
        assert!(matches!(MediaEvent::try_from(u32::MAX), Err(Error::UnknownEvent(u32::MAX))));
    }

    #[test]
    fn test_engine_fallback() {
        assert_eq!(EngineKind::Hls.fallback(), Some(EngineKind::Dash));
        assert_eq!(EngineKind::Dash.fallback(), None);
    }

    #[test]
    fn test_ready_state_clamps() {
        assert_eq!(ReadyState::from(2), ReadyState::HaveCurrentData);
        assert_eq!(ReadyState::from(9), ReadyState::HaveEnoughData);
        assert_eq!(u8::from(ReadyState::HaveFutureData), 3);
    }

    #[test]
    fn test_playback_state_transitions() {
        use PlaybackState::*;
        assert!(Idle.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Ready));
        assert!(Loading.can_transition_to(Error));
        assert!(Ready.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Ended));
        assert!(Ended.can_transition_to(Loading));
        assert!(Error.can_transition_to(Loading));

        assert!(!Idle.can_transition_to(Playing));
        assert!(!Error.can_transition_to(Playing));
        assert!(!Loading.can_transition_to(Playing));
    }
}
