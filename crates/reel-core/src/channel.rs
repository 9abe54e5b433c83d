//! Event Channel - forwards media lifecycle events to the host
//!
//! The channel binds handlers for a chosen set of [`MediaEvent`]s on a
//! [`MediaSource`]. When one fires it builds a [`MediaMessage`] and hands the
//! serialized text to the configured [`Delivery`].

use crate::{media::MediaSource, Error, MediaEvent, MediaMessage, Result};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Outbound transport for serialized messages (window messaging, a native
/// bridge, a test recorder...)
pub trait Delivery {
    fn deliver(&self, message: &str);
}

impl<F> Delivery for F
where
    F: Fn(&str),
{
    fn deliver(&self, message: &str) {
        self(message)
    }
}

/// Media event channel bound to a single media source
#[derive(Clone)]
pub struct EventChannel {
    inner: Rc<ChannelInner>,
}

struct ChannelInner {
    source: Rc<dyn MediaSource>,
    delivery: RefCell<Option<Rc<dyn Delivery>>>,
    subscriptions: RefCell<BTreeSet<MediaEvent>>,
}

impl EventChannel {
    /// Create a channel for `source`, optionally with a delivery already set
    pub fn new(source: Rc<dyn MediaSource>, delivery: Option<Rc<dyn Delivery>>) -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                source,
                delivery: RefCell::new(delivery),
                subscriptions: RefCell::new(BTreeSet::new()),
            }),
        }
    }

    /// Install the delivery used by every later publish
    pub fn set_delivery(&self, delivery: Rc<dyn Delivery>) {
        *self.inner.delivery.borrow_mut() = Some(delivery);
    }

    pub fn clear_delivery(&self) {
        self.inner.delivery.borrow_mut().take();
    }

    /// Bind `event` to delivery, replacing any handler already on the element
    pub fn subscribe(&self, event: MediaEvent) {
        if event.is_external() {
            debug!(event = event.code(), "External events have no native source; not subscribing");
            return;
        }

        let weak: Weak<ChannelInner> = Rc::downgrade(&self.inner);
        self.inner.source.set_handler(
            event,
            Some(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.publish(event, "");
                }
            })),
        );
        self.inner.subscriptions.borrow_mut().insert(event);
        trace!(%event, "Subscribed");
    }

    /// Remove the handler for `event`; unsubscribing twice is a no-op
    pub fn unsubscribe(&self, event: MediaEvent) {
        if event.is_external() {
            return;
        }
        self.inner.source.set_handler(event, None);
        if self.inner.subscriptions.borrow_mut().remove(&event) {
            trace!(%event, "Unsubscribed");
        }
    }

    pub fn subscribe_many(&self, events: impl IntoIterator<Item = MediaEvent>) {
        for event in events {
            self.subscribe(event);
        }
    }

    pub fn unsubscribe_many(&self, events: impl IntoIterator<Item = MediaEvent>) {
        for event in events {
            self.unsubscribe(event);
        }
    }

    /// Subscribe every native event
    pub fn subscribe_all(&self) {
        self.subscribe_many(MediaEvent::native());
    }

    /// Unsubscribe every native event
    pub fn unsubscribe_all(&self) {
        self.unsubscribe_many(MediaEvent::native());
    }

    pub fn is_subscribed(&self, event: MediaEvent) -> bool {
        self.inner.subscriptions.borrow().contains(&event)
    }

    /// Currently subscribed events, in code order
    pub fn subscriptions(&self) -> Vec<MediaEvent> {
        self.inner.subscriptions.borrow().iter().copied().collect()
    }

    /// Publish `event` with `payload`; failures are logged and reported as `false`
    pub fn publish(&self, event: MediaEvent, payload: &str) -> bool {
        self.inner.publish(event, payload)
    }

    /// Publish `event` with `payload`, returning the failure instead of logging it
    pub fn try_publish(&self, event: MediaEvent, payload: &str) -> Result<()> {
        self.inner.try_publish(event, payload)
    }
}

impl ChannelInner {
    fn publish(&self, event: MediaEvent, payload: &str) -> bool {
        match self.try_publish(event, payload) {
            Ok(()) => true,
            Err(e) => {
                warn!(%event, error = %e, code = e.error_code(), "Failed to publish media event");
                false
            }
        }
    }

    fn try_publish(&self, event: MediaEvent, payload: &str) -> Result<()> {
        let message = MediaMessage::new(self.source.ready_state(), event, payload);
        // Cloned out so a delivery may call back into the channel
        let delivery = self
            .delivery
            .borrow()
            .clone()
            .ok_or(Error::DeliveryUnavailable)?;
        let json = message.to_json()?;
        delivery.deliver(&json);
        Ok(())
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        for event in self.subscriptions.get_mut().iter() {
            self.source.set_handler(*event, None);
        }
    }
}
