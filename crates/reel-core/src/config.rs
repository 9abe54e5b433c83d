//! Launch configuration for a player session

use crate::{Error, PlaylistEntry, Result};
use serde::{Deserialize, Serialize};

/// Player launch configuration.
///
/// Field names on the wire follow the embed parameters hosts already use
/// (`video`, `autoPlay`, `loop`, `VRBtn`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Stream to load at launch
    pub video: Option<String>,
    /// Title for the launch stream
    pub title: Option<String>,
    /// Start playing once the launch stream is ready
    pub auto_play: bool,
    /// Loop the current media natively instead of advancing the playlist
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    /// Show the VR entry button (browser hosts only)
    #[serde(rename = "VRBtn")]
    pub vr_button: bool,
    /// Entries queued after the launch stream
    pub playlist: Vec<PlaylistEntry>,
    /// Subscribe every native media event at launch
    pub subscribe_all: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video: None,
            title: None,
            auto_play: true,
            loop_playback: false,
            vr_button: true,
            playlist: Vec::new(),
            subscribe_all: false,
        }
    }
}

impl PlayerConfig {
    /// Config that launches `url`
    pub fn with_video(url: impl Into<String>) -> Self {
        Self {
            video: Some(url.into()),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(video) = &self.video {
            if video.trim().is_empty() {
                return Err(Error::InvalidConfig("video URL is empty".to_string()));
            }
        }
        if let Some(index) = self.playlist.iter().position(|e| e.url.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "playlist entry {index} has an empty URL"
            )));
        }
        Ok(())
    }
}
