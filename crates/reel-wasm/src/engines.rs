//! hls.js and shaka-player bindings
//!
//! Both libraries are loaded by the page as globals (`Hls`, `shaka`). An
//! engine reports itself unsupported when its global is missing.

use async_trait::async_trait;
use futures::channel::oneshot;
use js_sys::{Function, Promise, Reflect};
use reel_core::{EngineKind, Error, PlaybackEngine, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlMediaElement;

/// hls.js event fired once the manifest has been parsed
const HLS_MANIFEST_PARSED: &str = "hlsManifestParsed";
/// hls.js error event
const HLS_ERROR: &str = "hlsError";

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = Hls)]
    type HlsJs;

    #[wasm_bindgen(constructor, js_class = "Hls")]
    fn new() -> HlsJs;

    #[wasm_bindgen(static_method_of = HlsJs, js_class = "Hls", js_name = isSupported)]
    fn is_supported() -> bool;

    #[wasm_bindgen(method, js_class = "Hls", js_name = loadSource)]
    fn load_source(this: &HlsJs, url: &str);

    #[wasm_bindgen(method, js_class = "Hls", js_name = attachMedia)]
    fn attach_media(this: &HlsJs, media: &HtmlMediaElement);

    #[wasm_bindgen(method, js_class = "Hls")]
    fn on(this: &HlsJs, event: &str, listener: &Function);

    #[wasm_bindgen(method, js_class = "Hls")]
    fn destroy(this: &HlsJs);
}

#[wasm_bindgen(js_namespace = shaka)]
extern "C" {
    #[wasm_bindgen(js_name = Player)]
    #[derive(Clone)]
    type ShakaPlayer;

    #[wasm_bindgen(constructor, js_class = "Player")]
    fn new(media: &HtmlMediaElement) -> ShakaPlayer;

    #[wasm_bindgen(static_method_of = ShakaPlayer, js_class = "Player", js_name = isBrowserSupported)]
    fn is_browser_supported() -> bool;

    #[wasm_bindgen(method, catch, js_class = "Player")]
    fn load(this: &ShakaPlayer, uri: &str) -> std::result::Result<Promise, JsValue>;

    #[wasm_bindgen(method, js_class = "Player")]
    fn unload(this: &ShakaPlayer) -> Promise;

    #[wasm_bindgen(method, js_class = "Player", js_name = addEventListener)]
    fn add_event_listener(this: &ShakaPlayer, event: &str, listener: &Function);
}

#[wasm_bindgen(js_namespace = ["shaka", "polyfill"])]
extern "C" {
    #[wasm_bindgen(js_name = installAll)]
    fn install_all_polyfills();
}

fn global_defined(name: &str) -> bool {
    Reflect::get(&js_sys::global(), &JsValue::from_str(name))
        .map(|value| !value.is_undefined())
        .unwrap_or(false)
}

fn string_field(value: &JsValue, field: &str) -> Option<String> {
    let field = Reflect::get(value, &JsValue::from_str(field)).ok()?;
    field
        .as_string()
        .or_else(|| field.as_f64().map(|n| n.to_string()))
}

type LoadSender = Rc<RefCell<Option<oneshot::Sender<Result<()>>>>>;

struct HlsInstance {
    hls: HlsJs,
    _on_parsed: Closure<dyn FnMut(JsValue, JsValue)>,
    _on_error: Closure<dyn FnMut(JsValue, JsValue)>,
}

/// HLS engine over hls.js; a fresh `Hls` instance per load
pub struct HlsJsEngine {
    media: HtmlMediaElement,
    instance: RefCell<Option<HlsInstance>>,
}

impl HlsJsEngine {
    pub fn new(media: HtmlMediaElement) -> Self {
        Self {
            media,
            instance: RefCell::new(None),
        }
    }
}

#[async_trait(?Send)]
impl PlaybackEngine for HlsJsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Hls
    }

    fn is_supported(&self) -> bool {
        global_defined("Hls") && HlsJs::is_supported()
    }

    async fn load(&self, url: &str) -> Result<()> {
        self.unload();

        let (tx, rx) = oneshot::channel();
        let tx: LoadSender = Rc::new(RefCell::new(Some(tx)));

        let on_parsed = {
            let tx = Rc::clone(&tx);
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_event: JsValue, _data: JsValue| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Ok(()));
                }
            })
        };
        let on_error = {
            let tx = Rc::clone(&tx);
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_event: JsValue, data: JsValue| {
                let fatal = Reflect::get(&data, &JsValue::from_str("fatal"))
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let details = string_field(&data, "details").unwrap_or_else(|| "unknown".into());
                if !fatal {
                    debug!(details = %details, "Recoverable hls.js error");
                    return;
                }
                let kind = string_field(&data, "type").unwrap_or_else(|| "unknown".into());
                error!(details = %details, kind = %kind, "Fatal hls.js error");
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Err(Error::manifest_load(EngineKind::Hls, details, kind)));
                }
            })
        };

        let hls = HlsJs::new();
        hls.on(HLS_MANIFEST_PARSED, on_parsed.as_ref().unchecked_ref());
        hls.on(HLS_ERROR, on_error.as_ref().unchecked_ref());
        hls.load_source(url);
        hls.attach_media(&self.media);
        *self.instance.borrow_mut() = Some(HlsInstance {
            hls,
            _on_parsed: on_parsed,
            _on_error: on_error,
        });

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::manifest_load(
                EngineKind::Hls,
                "ABORTED",
                "instance destroyed before the manifest was parsed",
            )),
        }
    }

    fn unload(&self) {
        if let Some(instance) = self.instance.borrow_mut().take() {
            instance.hls.destroy();
        }
    }
}

/// DASH engine over shaka-player; one `shaka.Player` reused across loads
pub struct ShakaEngine {
    media: HtmlMediaElement,
    player: RefCell<Option<ShakaPlayer>>,
    on_error: RefCell<Option<Closure<dyn FnMut(JsValue)>>>,
    polyfilled: Cell<bool>,
}

impl ShakaEngine {
    pub fn new(media: HtmlMediaElement) -> Self {
        Self {
            media,
            player: RefCell::new(None),
            on_error: RefCell::new(None),
            polyfilled: Cell::new(false),
        }
    }

    fn player(&self) -> ShakaPlayer {
        if let Some(player) = self.player.borrow().as_ref() {
            return player.clone();
        }

        let player = ShakaPlayer::new(&self.media);
        let on_error = Closure::<dyn FnMut(JsValue)>::new(|event: JsValue| {
            let detail = Reflect::get(&event, &JsValue::from_str("detail")).unwrap_or(event);
            let code = string_field(&detail, "code").unwrap_or_else(|| "unknown".into());
            error!(code = %code, "shaka-player error");
        });
        player.add_event_listener("error", on_error.as_ref().unchecked_ref());
        *self.on_error.borrow_mut() = Some(on_error);
        *self.player.borrow_mut() = Some(player.clone());
        info!("shaka-player attached");
        player
    }
}

#[async_trait(?Send)]
impl PlaybackEngine for ShakaEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Dash
    }

    fn is_supported(&self) -> bool {
        if !global_defined("shaka") {
            return false;
        }
        if !self.polyfilled.replace(true) {
            install_all_polyfills();
        }
        ShakaPlayer::is_browser_supported()
    }

    async fn load(&self, url: &str) -> Result<()> {
        let player = self.player();
        let to_error = |e: JsValue| {
            let code = string_field(&e, "code").unwrap_or_else(|| "unknown".into());
            let message = string_field(&e, "message").unwrap_or_else(|| format!("{e:?}"));
            Error::manifest_load(EngineKind::Dash, code, message)
        };
        let promise = player.load(url).map_err(to_error)?;
        JsFuture::from(promise).await.map_err(to_error)?;
        Ok(())
    }

    fn unload(&self) {
        if let Some(player) = self.player.borrow().as_ref() {
            // Completion is not awaited; the next load supersedes it
            let _ = player.unload();
        }
    }
}
