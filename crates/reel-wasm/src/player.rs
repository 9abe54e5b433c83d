//! `ReelPlayer` - the page-facing player object

use crate::engines::{HlsJsEngine, ShakaEngine};
use crate::media::VideoElementSource;
use futures::future::LocalBoxFuture;
use js_sys::{Function, Promise};
use reel_core::{
    EngineSet, Error, LoadOutcome, MediaEvent, MediaSource, PlayerConfig, PlayerSession, Spawner,
};
use std::rc::Rc;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

fn to_js(e: Error) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

fn outcome_to_js(outcome: &LoadOutcome) -> JsValue {
    let label = match outcome {
        LoadOutcome::Ready => "ready",
        LoadOutcome::Failed(_) => "failed",
        LoadOutcome::Superseded => "superseded",
    };
    JsValue::from_str(label)
}

/// `load(url)` without `autoPlay` leaves the new stream paused
fn load_autoplay(auto_play: Option<bool>) -> bool {
    auto_play.unwrap_or(false)
}

fn parse_codes(codes: &[u32]) -> Result<Vec<MediaEvent>, JsValue> {
    codes
        .iter()
        .map(|code| MediaEvent::try_from(*code).map_err(to_js))
        .collect()
}

/// Player bound to one `<video>` element
#[wasm_bindgen]
pub struct ReelPlayer {
    session: PlayerSession,
    media: Rc<VideoElementSource>,
}

#[wasm_bindgen]
impl ReelPlayer {
    /// Create a player for the element with id `video_id`.
    ///
    /// `config` is an optional object with `video`, `title`, `autoPlay`,
    /// `loop`, `VRBtn`, `playlist` and `subscribeAll`.
    #[wasm_bindgen(constructor)]
    pub fn new(video_id: &str, config: JsValue) -> Result<ReelPlayer, JsValue> {
        let config: PlayerConfig = if config.is_undefined() || config.is_null() {
            PlayerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let media = Rc::new(VideoElementSource::from_id(video_id)?);
        let element = media.element().clone();
        let engines = EngineSet::new(
            Rc::new(HlsJsEngine::new(element.clone())),
            Rc::new(ShakaEngine::new(element)),
        );
        let spawner: Spawner =
            Rc::new(|task: LocalBoxFuture<'static, ()>| wasm_bindgen_futures::spawn_local(task));

        let session =
            PlayerSession::new(config, media.clone(), engines, None, spawner).map_err(to_js)?;
        Ok(Self { session, media })
    }

    /// Route event messages to `deliver(message)`
    #[wasm_bindgen(js_name = setDelivery)]
    pub fn set_delivery(&self, deliver: Function) {
        self.session
            .channel()
            .set_delivery(Rc::new(move |message: &str| {
                if let Err(e) = deliver.call1(&JsValue::NULL, &JsValue::from_str(message)) {
                    warn!(error = ?e, "Delivery callback threw");
                }
            }));
    }

    /// Route event messages to the embedding window via `postMessage`
    #[wasm_bindgen(js_name = deliverToParent)]
    pub fn deliver_to_parent(&self, target_origin: Option<String>) -> Result<(), JsValue> {
        let parent = web_sys::window()
            .ok_or_else(|| JsValue::from_str("no window available"))?
            .parent()?
            .ok_or_else(|| JsValue::from_str("no embedding window"))?;
        let origin = target_origin.unwrap_or_else(|| "*".to_string());
        self.session
            .channel()
            .set_delivery(Rc::new(move |message: &str| {
                if let Err(e) = parent.post_message(&JsValue::from_str(message), &origin) {
                    warn!(error = ?e, "postMessage failed");
                }
            }));
        Ok(())
    }

    #[wasm_bindgen(js_name = clearDelivery)]
    pub fn clear_delivery(&self) {
        self.session.channel().clear_delivery();
    }

    /// Apply the configuration and load the launch stream.
    /// Resolves to `"ready"`, `"failed"`, `"superseded"` or `null`.
    pub fn launch(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            Ok(match session.launch().await {
                Some(outcome) => outcome_to_js(&outcome),
                None => JsValue::NULL,
            })
        })
    }

    /// Replace the current entry with `url` and load it.
    /// Playback starts once ready only when `autoPlay` is `true`.
    pub fn load(&self, url: String, title: Option<String>, auto_play: Option<bool>) -> Promise {
        let session = self.session.clone();
        let autoplay = load_autoplay(auto_play);
        future_to_promise(async move {
            let outcome = session.load(&url, title, autoplay).await;
            Ok(outcome_to_js(&outcome))
        })
    }

    /// Advance to the next entry; resolves to its URL or `null`
    pub fn advance(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            Ok(session
                .advance()
                .await
                .map(|entry| JsValue::from_str(&entry.url))
                .unwrap_or(JsValue::NULL))
        })
    }

    /// Load the current entry again
    #[wasm_bindgen(js_name = forceReplay)]
    pub fn force_replay(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let outcome = session.reload_current().await;
            Ok(outcome_to_js(&outcome))
        })
    }

    pub fn enqueue(&self, url: &str, title: Option<String>) {
        self.session.enqueue(url, title);
    }

    pub fn play(&self) {
        self.session.play();
    }

    pub fn pause(&self) {
        self.session.pause();
    }

    /// Seek relative to the current position; false when out of range
    pub fn seek(&self, by: f64) -> bool {
        self.session.seek(by)
    }

    #[wasm_bindgen(getter, js_name = currentTime)]
    pub fn current_time(&self) -> f64 {
        self.session.current_time()
    }

    #[wasm_bindgen(js_name = setCurrentTime)]
    pub fn set_current_time(&self, time: f64) -> bool {
        self.session.set_current_time(time)
    }

    #[wasm_bindgen(getter, js_name = playbackRate)]
    pub fn playback_rate(&self) -> f64 {
        self.session.playback_rate()
    }

    /// Returns the rate in effect afterwards
    #[wasm_bindgen(js_name = setPlaybackRate)]
    pub fn set_playback_rate(&self, rate: f64) -> f64 {
        self.session.set_playback_rate(rate)
    }

    #[wasm_bindgen(getter, js_name = readyState)]
    pub fn ready_state(&self) -> u8 {
        self.session.with_controller(|c| c.ready_state().into())
    }

    #[wasm_bindgen(getter)]
    pub fn paused(&self) -> bool {
        self.session.with_controller(|c| c.paused())
    }

    #[wasm_bindgen(getter)]
    pub fn duration(&self) -> f64 {
        self.session.with_controller(|c| c.duration())
    }

    /// Volume in percent
    #[wasm_bindgen(getter)]
    pub fn volume(&self) -> f64 {
        self.session.with_controller(|c| c.volume())
    }

    #[wasm_bindgen(getter, js_name = isMuted)]
    pub fn is_muted(&self) -> bool {
        self.session.with_controller(|c| c.muted())
    }

    /// Controller state as a lowercase string
    #[wasm_bindgen(getter, js_name = playbackState)]
    pub fn playback_state(&self) -> String {
        self.session.state().to_string()
    }

    #[wasm_bindgen(getter, js_name = currentTitle)]
    pub fn current_title(&self) -> Option<String> {
        self.session.current_entry().map(|entry| entry.title)
    }

    /// Whether the page should show its VR button
    #[wasm_bindgen(getter, js_name = vrButton)]
    pub fn vr_button(&self) -> bool {
        self.session.config().vr_button
    }

    #[wasm_bindgen(getter)]
    pub fn looping(&self) -> bool {
        self.media.looping()
    }

    /// Subscribe to event codes (1-21 native, 22 is accepted and ignored)
    pub fn subscribe(&self, codes: Vec<u32>) -> Result<(), JsValue> {
        self.session.subscribe(parse_codes(&codes)?);
        Ok(())
    }

    pub fn unsubscribe(&self, codes: Vec<u32>) -> Result<(), JsValue> {
        self.session.unsubscribe(parse_codes(&codes)?);
        Ok(())
    }

    #[wasm_bindgen(js_name = subscribeToAllEvents)]
    pub fn subscribe_to_all_events(&self) {
        self.session.subscribe_all();
    }

    #[wasm_bindgen(js_name = unsubscribeFromAllEvents)]
    pub fn unsubscribe_from_all_events(&self) {
        self.session.unsubscribe_all();
    }

    /// Deliver a host payload as an `External` message
    #[wasm_bindgen(js_name = publishExternal)]
    pub fn publish_external(&self, payload: &str) -> bool {
        self.session.publish_external(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults_to_paused() {
        assert!(!load_autoplay(None));
        assert!(!load_autoplay(Some(false)));
        assert!(load_autoplay(Some(true)));
    }
}
