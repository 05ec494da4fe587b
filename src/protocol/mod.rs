// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol implementations for talking to a Tango REST server.
//!
//! # Components
//!
//! - [`Transport`]: the seam between the client and the network. It issues
//!   JSON requests and opens live event streams.
//! - [`HttpClient`]: the `reqwest` implementation of [`Transport`]
//! - [`RestClient`] / [`ApiRequest`]: fluent URL builder over a [`Transport`]
//! - [`SseDecoder`]: incremental decoder for `text/event-stream` bodies

mod http;
mod request;
mod sse;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

pub use http::{Credentials, HttpClient, HttpConfig};
pub use request::{ApiRequest, DEFAULT_TANGO_PORT, RestClient};
pub use reqwest::Method;
pub use sse::{SseDecoder, decode_frames};

use crate::error::{ProtocolError, Result};
use crate::types::Frame;

/// A live stream of frames from one event-stream connection.
///
/// The stream ends when the server closes the connection and yields an
/// error if the connection fails mid-stream.
pub type FrameStream = BoxStream<'static, std::result::Result<Frame, ProtocolError>>;

/// Trait for transports that can reach a Tango REST server.
///
/// The subscription layer only talks to the network through this trait, so
/// alternative HTTP stacks or in-memory fakes can be injected.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends a JSON request and returns the parsed JSON response.
    ///
    /// An empty response body yields [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Api`] if the server reports a failure, or
    /// another error if the request cannot be completed or parsed.
    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value>;

    /// Opens a live event stream at `url`.
    ///
    /// Returns once the server has accepted the connection.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be established.
    async fn event_stream(&self, url: &str) -> std::result::Result<FrameStream, ProtocolError>;
}
