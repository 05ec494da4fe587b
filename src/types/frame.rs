// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw live event frames.

/// Prefix marking a server-side delivery failure.
const ERROR_PREFIX: &str = "error";

/// Fixed-width prefix preceding the message of an error frame.
const ERROR_MESSAGE_PREFIX: &str = "error: ";

/// One unit of data pushed over the live event stream.
///
/// Frames are typed by the event id assigned at registration and carry the
/// server's sequence token for that id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event id the frame was published under.
    pub id: String,
    /// Monotonic per-id sequence token (a millisecond timestamp).
    pub last_event_id: String,
    /// Raw payload: JSON, or `error: <message>` for failures.
    pub data: String,
}

impl Frame {
    /// Creates a new frame.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        last_event_id: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            last_event_id: last_event_id.into(),
            data: data.into(),
        }
    }

    /// Returns `true` if the payload encodes a server-side failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.data.starts_with(ERROR_PREFIX)
    }

    /// Returns the failure message if the payload encodes one.
    ///
    /// ```
    /// use tango_rest_client::types::Frame;
    ///
    /// let frame = Frame::new("1", "1553697634000", "error: device not found");
    /// assert_eq!(frame.error_message(), Some("device not found"));
    /// ```
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        if let Some(message) = self.data.strip_prefix(ERROR_MESSAGE_PREFIX) {
            return Some(message);
        }
        self.data
            .strip_prefix(ERROR_PREFIX)
            .map(|rest| rest.trim_start_matches(':').trim_start())
    }

    /// Parses the sequence token as an integer.
    ///
    /// Leading whitespace and an optional sign are accepted and parsing stops
    /// at the first non-digit, so `"1553697634000-0"` yields `1553697634000`.
    /// Returns `None` if the token does not start with a number.
    #[must_use]
    pub fn sequence(&self) -> Option<i64> {
        parse_leading_integer(&self.last_event_id)
    }
}

fn parse_leading_integer(token: &str) -> Option<i64> {
    let token = token.trim_start();
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
