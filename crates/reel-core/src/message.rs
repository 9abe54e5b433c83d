//! Wire message delivered to the host for every published event

use crate::{MediaEvent, ReadyState, Result};
use serde::{Deserialize, Serialize};

/// One media event, as seen by the host.
///
/// Serializes to compact JSON with the keys `readyState`, `event` and
/// `message`, always in that order:
///
/// ```
/// use reel_core::{MediaEvent, MediaMessage, ReadyState};
///
/// let msg = MediaMessage::new(ReadyState::HaveEnoughData, MediaEvent::Ended, "");
/// assert_eq!(msg.to_json().unwrap(), r#"{"readyState":4,"event":5,"message":""}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMessage {
    #[serde(rename = "readyState")]
    ready_state: ReadyState,
    event: MediaEvent,
    message: String,
}

impl MediaMessage {
    pub fn new(ready_state: ReadyState, event: MediaEvent, message: impl Into<String>) -> Self {
        Self {
            ready_state,
            event,
            message: message.into(),
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn event(&self) -> MediaEvent {
        self.event
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Serialize to the canonical compact form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a message produced by [`MediaMessage::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order_is_fixed() {
        let msg = MediaMessage::new(ReadyState::HaveMetadata, MediaEvent::External, "hello");
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"readyState":1,"event":22,"message":"hello"}"#
        );
    }

    #[test]
    fn test_payload_is_escaped() {
        let msg = MediaMessage::new(ReadyState::HaveNothing, MediaEvent::Error, "bad \"url\"");
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"readyState":0,"event":6,"message":"bad \"url\""}"#);
        assert_eq!(MediaMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_unknown_event_code_rejected() {
        let result = MediaMessage::from_json(r#"{"readyState":0,"event":40,"message":""}"#);
        assert!(result.is_err());
    }
}
