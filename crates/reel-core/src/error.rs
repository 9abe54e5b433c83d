//! Error types for Reel Core

use crate::types::{EngineKind, PlaybackState};
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Channel errors
    #[error("No delivery function configured; call set_delivery before publishing")]
    DeliveryUnavailable,

    #[error("Unknown media event code: {0}")]
    UnknownEvent(u32),

    // Engine errors
    #[error("Failed to load manifest with {engine} engine (code {code}): {message}")]
    ManifestLoad {
        engine: EngineKind,
        code: String,
        message: String,
    },

    #[error("Neither playback engine is supported in this environment")]
    UnsupportedEnvironment,

    // Playlist errors
    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: PlaybackState,
        to: PlaybackState,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a manifest load error for an engine
    pub fn manifest_load(
        engine: EngineKind,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::ManifestLoad {
            engine,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if an explicit reload or advance can get past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DeliveryUnavailable | Error::ManifestLoad { .. } | Error::InvalidStateTransition { .. }
        )
    }

    /// Returns the error code reported to the host
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::DeliveryUnavailable => "DELIVERY_UNAVAILABLE",
            Error::UnknownEvent(_) => "UNKNOWN_EVENT",
            Error::ManifestLoad { .. } => "MANIFEST_LOAD",
            Error::UnsupportedEnvironment => "UNSUPPORTED_ENVIRONMENT",
            Error::EmptyPlaylist => "EMPTY_PLAYLIST",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Serialization(_) => "SERIALIZATION",
        }
    }
}
