// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded events delivered to observers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{Frame, Target};

/// Payload of a decoded event: either data or a failure message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPayload {
    /// The parsed JSON payload.
    Data(Value),
    /// A server-side failure, or a frame that could not be decoded.
    Error(String),
}

/// A live event for one target.
///
/// Serializes flat, as `{host, device, attribute, type, timestamp, data}` or
/// `{host, device, attribute, type, timestamp, error}`.
///
/// # Examples
///
/// ```
/// use tango_rest_client::types::{Frame, Target, TargetEvent};
///
/// let target = Target::new("localhost:10000", "sys/tg_test/1", "double_scalar", "change");
/// let event = TargetEvent::from_frame(&target, &Frame::new("1", "1553697634000", r#"{"value":42}"#));
///
/// assert_eq!(event.timestamp, 1553697634000);
/// assert_eq!(event.data().unwrap()["value"], 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetEvent {
    /// The target the frame was delivered for.
    #[serde(flatten)]
    pub target: Target,
    /// The frame's sequence token as an integer.
    pub timestamp: i64,
    /// Data or error.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl TargetEvent {
    /// Decodes a frame received for `target`.
    ///
    /// Decoding never fails: a frame with an unparsable sequence token or
    /// payload is turned into an error event for this target only.
    #[must_use]
    pub fn from_frame(target: &Target, frame: &Frame) -> Self {
        let Some(timestamp) = frame.sequence() else {
            return Self::error(
                target,
                0,
                format!("invalid event sequence token {:?}", frame.last_event_id),
            );
        };

        if let Some(message) = frame.error_message() {
            return Self::error(target, timestamp, message);
        }

        match serde_json::from_str(&frame.data) {
            Ok(data) => Self {
                target: target.clone(),
                timestamp,
                payload: EventPayload::Data(data),
            },
            Err(e) => Self::error(target, timestamp, format!("invalid event payload: {e}")),
        }
    }

    fn error(target: &Target, timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            target: target.clone(),
            timestamp,
            payload: EventPayload::Error(message.into()),
        }
    }

    /// Returns the data payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match &self.payload {
            EventPayload::Data(data) => Some(data),
            EventPayload::Error(_) => None,
        }
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Error(message) => Some(message),
            EventPayload::Data(_) => None,
        }
    }

    /// Returns `true` if this event carries a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.payload, EventPayload::Error(_))
    }

    /// Interprets the timestamp as milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}
