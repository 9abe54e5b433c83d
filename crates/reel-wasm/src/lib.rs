//! Reel WASM - Browser bindings for the Reel player
//!
//! Wires the core event channel and playlist controller to a page:
//! - `<video>` element as the media source
//! - hls.js for HLS manifests, shaka-player for DASH
//! - Event messages posted to a host callback or the embedding window
//!
//! ## Usage
//!
//! ```javascript
//! import init, { ReelPlayer } from '@reel/wasm';
//!
//! await init();
//! const player = new ReelPlayer('video', { video: 'https://cdn/show.m3u8', autoPlay: true });
//! player.setDelivery((message) => console.log(message));
//! player.subscribe([5, 6, 17]);
//! await player.launch();
//! ```

use wasm_bindgen::prelude::*;

mod engines;
mod logging;
mod media;
mod player;

pub use engines::{HlsJsEngine, ShakaEngine};
pub use media::VideoElementSource;
pub use player::ReelPlayer;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init_console_logging(tracing::Level::INFO);
    reel_core::init();
    web_sys::console::log_1(&"[Reel WASM] Initialized".into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    reel_core::VERSION.to_string()
}

/// Native event names in code order, index 0 is code 1
#[wasm_bindgen(js_name = eventNames)]
pub fn event_names() -> Vec<JsValue> {
    reel_core::MediaEvent::all()
        .map(|event| JsValue::from_str(&event.to_string()))
        .collect()
}
