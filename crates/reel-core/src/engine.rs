//! Playback engines and format dispatch
//!
//! An engine is a wrapped adaptive-streaming library (hls.js, shaka-player)
//! attached to the media source. The controller only needs to load and unload
//! manifests; segment fetching and ABR stay inside the engine.

use crate::{EngineKind, Error, Result};
use async_trait::async_trait;
use std::rc::Rc;
use tracing::{debug, warn};

/// Substring marking an HLS manifest URL
pub const HLS_MARKER: &str = "m3u8";

/// Trait for playback engines
#[async_trait(?Send)]
pub trait PlaybackEngine {
    /// Which family this engine belongs to
    fn kind(&self) -> EngineKind;

    /// Whether the host environment can run this engine
    fn is_supported(&self) -> bool;

    /// Load a manifest and attach it to the media source.
    ///
    /// Resolves once the manifest is ready for playback; fails with
    /// [`Error::ManifestLoad`] when it cannot be loaded or parsed.
    async fn load(&self, url: &str) -> Result<()>;

    /// Detach the current manifest, if any
    fn unload(&self);
}

/// Pick the engine family for a URL.
///
/// This is a heuristic on the URL text only: anything containing `m3u8` goes
/// to HLS, everything else to the DASH-capable engine. The content type is
/// never probed.
pub fn detect_engine(url: &str) -> EngineKind {
    if url.contains(HLS_MARKER) {
        EngineKind::Hls
    } else {
        EngineKind::Dash
    }
}

/// The two engines available to the controller
#[derive(Clone)]
pub struct EngineSet {
    hls: Rc<dyn PlaybackEngine>,
    dash: Rc<dyn PlaybackEngine>,
}

impl EngineSet {
    pub fn new(hls: Rc<dyn PlaybackEngine>, dash: Rc<dyn PlaybackEngine>) -> Self {
        Self { hls, dash }
    }

    pub fn get(&self, kind: EngineKind) -> &Rc<dyn PlaybackEngine> {
        match kind {
            EngineKind::Hls => &self.hls,
            EngineKind::Dash => &self.dash,
        }
    }

    /// Choose a supported engine for `url`.
    ///
    /// An HLS URL falls back to the DASH engine when hls.js is not supported
    /// by the host. A DASH URL has no fallback.
    pub fn select(&self, url: &str) -> Result<&Rc<dyn PlaybackEngine>> {
        let preferred = detect_engine(url);
        let engine = self.get(preferred);
        if engine.is_supported() {
            debug!(engine = %preferred, url, "Engine selected");
            return Ok(engine);
        }

        if let Some(fallback) = preferred.fallback().map(|kind| self.get(kind)) {
            if fallback.is_supported() {
                warn!(
                    preferred = %preferred,
                    fallback = %fallback.kind(),
                    "Preferred engine unsupported, falling back"
                );
                return Ok(fallback);
            }
        }

        warn!(engine = %preferred, url, "Browser not supported");
        Err(Error::UnsupportedEnvironment)
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::ScriptedEngine;

    #[test]
    fn test_detect_hls() {
        assert_eq!(detect_engine("https://example.com/master.m3u8"), EngineKind::Hls);
        assert_eq!(detect_engine("https://example.com/live.m3u8?token=1"), EngineKind::Hls);
        assert_eq!(detect_engine("https://example.com/m3u8/stream"), EngineKind::Hls);
    }

    #[test]
    fn test_detect_dash() {
        assert_eq!(detect_engine("https://example.com/manifest.mpd"), EngineKind::Dash);
        assert_eq!(detect_engine("https://example.com/video.mp4"), EngineKind::Dash);
        assert_eq!(detect_engine(""), EngineKind::Dash);
    }

    #[test]
    fn test_select_falls_back() {
        let hls = Rc::new(ScriptedEngine::new(EngineKind::Hls));
        let dash = Rc::new(ScriptedEngine::new(EngineKind::Dash));
        let engines = EngineSet::new(hls.clone(), dash.clone());

        assert_eq!(engines.select("a.m3u8").unwrap().kind(), EngineKind::Hls);

        hls.set_supported(false);
        assert_eq!(engines.select("a.m3u8").unwrap().kind(), EngineKind::Dash);

        dash.set_supported(false);
        assert!(matches!(engines.select("a.mpd"), Err(Error::UnsupportedEnvironment)));
    }

    #[test]
    fn test_dash_has_no_fallback() {
        let hls = Rc::new(ScriptedEngine::new(EngineKind::Hls));
        let dash = Rc::new(ScriptedEngine::new(EngineKind::Dash));
        let engines = EngineSet::new(hls, dash.clone());

        dash.set_supported(false);
        assert!(matches!(engines.select("a.mpd"), Err(Error::UnsupportedEnvironment)));
        assert_eq!(engines.select("a.m3u8").unwrap().kind(), EngineKind::Hls);
    }
}
