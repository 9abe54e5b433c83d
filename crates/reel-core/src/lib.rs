//! Reel Core - Media Event Channel and Playlist Controller
//!
//! This crate provides the library-independent core of the Reel player:
//! - Media lifecycle events forwarded to the host as JSON messages
//! - Looping playlist with HLS/DASH engine dispatch
//! - Transport controls (play, pause, relative seek, playback rate)
//! - Load generations that discard superseded manifest loads
//! - An in-memory host for tests and headless tools (`sim` feature)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Reel Core                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌──────────────┐                             │
//! │                    │    Player    │                             │
//! │                    │   Session    │                             │
//! │                    └──────┬───────┘                             │
//! │              ┌────────────┴────────────┐                        │
//! │       ┌──────┴───────┐          ┌──────┴───────┐                │
//! │       │    Event     │          │   Playlist   │                │
//! │       │   Channel    │          │  Controller  │                │
//! │       └──────┬───────┘          └──────┬───────┘                │
//! │              │                  ┌──────┴───────┐                │
//! │       ┌──────┴───────┐          │   Engines    │                │
//! │       │   Delivery   │          │  (HLS/DASH)  │                │
//! │       └──────────────┘          └──────────────┘                │
//! │                                                                 │
//! │                    Media Source (<video>)                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod message;
pub mod media;
pub mod channel;
pub mod playlist;
pub mod engine;
pub mod controller;
pub mod config;
pub mod session;
#[cfg(feature = "sim")]
pub mod sim;

pub use error::{Error, Result};
pub use types::*;
pub use message::MediaMessage;
pub use media::{EventHandler, MediaSource};
pub use channel::{Delivery, EventChannel};
pub use playlist::{Playlist, PlaylistEntry};
pub use engine::{detect_engine, EngineSet, PlaybackEngine};
pub use controller::{LoadOutcome, LoadTicket, PendingLoad, PlaylistController};
pub use config::PlayerConfig;
pub use session::{PlayerSession, Spawner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Reel Core initialized");
}
