//! `<video>` element as a media source

use reel_core::{EventHandler, MediaEvent, MediaSource, ReadyState};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlMediaElement;

/// Media source backed by an `HtmlMediaElement`
pub struct VideoElementSource {
    element: HtmlMediaElement,
    /// Closures installed in `on<event>` slots, one per event
    handlers: RefCell<HashMap<MediaEvent, Closure<dyn Fn()>>>,
    /// Closures registered with `addEventListener`, kept alive for the element's lifetime
    listeners: RefCell<Vec<(&'static str, Closure<dyn Fn()>)>>,
}

impl VideoElementSource {
    pub fn new(element: HtmlMediaElement) -> Self {
        Self {
            element,
            handlers: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Look up a media element by id in the current document
    pub fn from_id(id: &str) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("no document available"))?;
        let element = document
            .get_element_by_id(id)
            .ok_or_else(|| JsValue::from_str(&format!("no element with id '{id}'")))?
            .dyn_into::<HtmlMediaElement>()
            .map_err(|_| JsValue::from_str(&format!("element '{id}' is not a media element")))?;
        Ok(Self::new(element))
    }

    pub fn element(&self) -> &HtmlMediaElement {
        &self.element
    }
}

impl MediaSource for VideoElementSource {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.element.ready_state().min(u8::MAX as u16) as u8)
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn set_current_time(&self, time: f64) {
        self.element.set_current_time(time);
    }

    fn duration(&self) -> f64 {
        self.element.duration()
    }

    fn playback_rate(&self) -> f64 {
        self.element.playback_rate()
    }

    fn set_playback_rate(&self, rate: f64) {
        self.element.set_playback_rate(rate);
    }

    fn play(&self) {
        match self.element.play() {
            // Rejected by autoplay policy or an interrupting load; the element stays paused
            Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    warn!(error = ?e, "play() rejected");
                }
            }),
            Err(e) => warn!(error = ?e, "play() threw"),
        }
    }

    fn pause(&self) {
        if let Err(e) = self.element.pause() {
            warn!(error = ?e, "pause() threw");
        }
    }

    fn paused(&self) -> bool {
        self.element.paused()
    }

    fn volume(&self) -> f64 {
        self.element.volume()
    }

    fn muted(&self) -> bool {
        self.element.muted()
    }

    fn looping(&self) -> bool {
        self.element.loop_()
    }

    fn set_looping(&self, looping: bool) {
        self.element.set_loop(looping);
    }

    fn set_handler(&self, event: MediaEvent, handler: Option<EventHandler>) {
        let Some(property) = event.handler_property() else {
            return;
        };
        let property = JsValue::from_str(&property);

        let closure = handler.map(|handler| Closure::<dyn Fn()>::new(move || handler()));
        let value = closure
            .as_ref()
            .map(|closure| closure.as_ref().clone())
            .unwrap_or(JsValue::NULL);
        if let Err(e) = js_sys::Reflect::set(&self.element, &property, &value) {
            warn!(%event, error = ?e, "Failed to set media handler");
            return;
        }

        // The replaced closure is dropped only after the slot no longer points at it
        let mut handlers = self.handlers.borrow_mut();
        match closure {
            Some(closure) => {
                handlers.insert(event, closure);
            }
            None => {
                handlers.remove(&event);
            }
        }
    }

    fn add_listener(&self, event: MediaEvent, listener: EventHandler) {
        let Some(name) = event.native_name() else {
            return;
        };
        let closure = Closure::<dyn Fn()>::new(move || listener());
        if let Err(e) = self
            .element
            .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
        {
            warn!(%event, error = ?e, "Failed to add media listener");
            return;
        }
        self.listeners.borrow_mut().push((name, closure));
    }
}

impl Drop for VideoElementSource {
    fn drop(&mut self) {
        for property in self.handlers.borrow().keys().filter_map(|e| e.handler_property()) {
            let _ = js_sys::Reflect::set(&self.element, &JsValue::from_str(&property), &JsValue::NULL);
        }
        for (name, closure) in self.listeners.borrow().iter() {
            let _ = self
                .element
                .remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
        }
    }
}
