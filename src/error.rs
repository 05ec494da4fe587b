// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Tango REST client.
//!
//! This module provides the error hierarchy for the library: argument
//! validation, protocol communication, JSON parsing, and the live event
//! subscription layer. Failures reported by the REST server itself are
//! carried as an [`ErrorEnvelope`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Target;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a response.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred in the event subscription layer.
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),
}

impl Error {
    /// Returns the server error envelope if this error carries one.
    #[must_use]
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Protocol(ProtocolError::Api(envelope)) => Some(envelope),
            _ => None,
        }
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A required identifier was empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// Errors related to protocol communication with the REST server.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a structured failure.
    #[error("request rejected: {0}")]
    Api(ErrorEnvelope),

    /// Connection to the server failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,
}

/// Errors related to parsing REST responses and event frames.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),
}

/// Errors raised by the live event subscription layer.
///
/// Unlike [`Error`], this type is `Clone`: a single settled registration is
/// shared with every caller that was waiting on it, and a transport failure
/// is fanned out to every observer of a channel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubscriptionError {
    /// The server rejected or did not acknowledge a target registration.
    #[error("registration of {target} failed: {reason}")]
    RegistrationFailed {
        /// The target that was being registered.
        target: Target,
        /// Human readable cause.
        reason: String,
        /// Server-side errors, if the server returned an envelope.
        errors: Vec<ApiError>,
    },

    /// Creating the server-side subscription resource failed.
    #[error("failed to open subscription session: {reason}")]
    SessionOpenFailed {
        /// Human readable cause.
        reason: String,
        /// Server-side errors, if the server returned an envelope.
        errors: Vec<ApiError>,
    },

    /// The event stream could not be re-established within the retry policy.
    #[error("event stream unavailable after {attempts} attempts: {reason}")]
    ReconnectExhausted {
        /// Number of connection attempts made.
        attempts: u32,
        /// Cause of the last failed attempt.
        reason: String,
    },

    /// The registry or session was shut down.
    #[error("subscription registry is closed")]
    Closed,
}

impl SubscriptionError {
    /// Builds a [`SubscriptionError::RegistrationFailed`] from a request error.
    pub(crate) fn registration_failed(target: &Target, error: &Error) -> Self {
        Self::RegistrationFailed {
            target: target.clone(),
            reason: error.to_string(),
            errors: api_errors(error),
        }
    }

    /// Builds a [`SubscriptionError::SessionOpenFailed`] from a request error.
    pub(crate) fn session_open_failed(error: &Error) -> Self {
        Self::SessionOpenFailed {
            reason: error.to_string(),
            errors: api_errors(error),
        }
    }
}

fn api_errors(error: &Error) -> Vec<ApiError> {
    error
        .envelope()
        .map(|envelope| envelope.errors.clone())
        .unwrap_or_default()
}

/// A single error entry reported by the REST server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Short reason code (e.g. `API_DeviceNotExported`).
    pub reason: String,
    /// Detailed description.
    #[serde(default)]
    pub description: String,
    /// Severity (`ERR`, `WARN`, `PANIC`).
    #[serde(default)]
    pub severity: String,
    /// Where the error originated.
    #[serde(default)]
    pub origin: String,
}

/// Structured failure returned by the REST API.
///
/// ```
/// use tango_rest_client::error::ErrorEnvelope;
///
/// let envelope: ErrorEnvelope = serde_json::from_str(r#"{
///     "errors": [{"reason": "API_DeviceNotExported", "description": "not exported",
///                 "severity": "ERR", "origin": "sys/tg_test/1"}],
///     "quality": "FAILURE",
///     "timestamp": 1553697634000
/// }"#).unwrap();
/// assert_eq!(envelope.errors[0].reason, "API_DeviceNotExported");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Individual errors, most specific first.
    #[serde(default)]
    pub errors: Vec<ApiError>,
    /// Always `FAILURE` for error responses.
    #[serde(default = "failure_quality")]
    pub quality: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

fn failure_quality() -> String {
    ErrorEnvelope::FAILURE.to_string()
}

impl ErrorEnvelope {
    /// Quality marker used by failure responses.
    pub const FAILURE: &'static str = "FAILURE";

    /// Creates an envelope holding a single locally generated error.
    #[must_use]
    pub fn single(
        reason: impl Into<String>,
        description: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            errors: vec![ApiError {
                reason: reason.into(),
                description: description.into(),
                severity: "ERR".to_string(),
                origin: origin.into(),
            }],
            quality: Self::FAILURE.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) if first.description.is_empty() => write!(f, "{}", first.reason),
            Some(first) => write!(f, "{}: {}", first.reason, first.description),
            None => write!(f, "{}", self.quality),
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
