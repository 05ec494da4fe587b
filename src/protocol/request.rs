// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fluent request builder for the Tango REST resource tree.

use std::fmt::Write as _;
use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ParseError, Result};
use crate::protocol::Transport;

/// Default port of the Tango database server.
pub const DEFAULT_TANGO_PORT: u16 = 10000;

/// Entry point for building requests against one API root.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tango_rest_client::protocol::{HttpConfig, RestClient};
///
/// # async fn example() -> tango_rest_client::Result<()> {
/// let transport = Arc::new(HttpConfig::new("localhost:10001").into_client()?);
/// let rest = RestClient::new("http://localhost:10001/tango/rest/v11", transport);
///
/// let value = rest
///     .request()
///     .hosts("localhost", 10000)
///     .device("sys/tg_test/1")
///     .attribute("double_scalar")
///     .value()
///     .get()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    url: String,
    transport: Arc<dyn Transport>,
}

impl RestClient {
    /// Creates a client rooted at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// Returns the API root URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Starts a new request at the API root.
    pub fn request(&self) -> ApiRequest {
        ApiRequest {
            url: self.url.clone(),
            query: Vec::new(),
            transport: Arc::clone(&self.transport),
        }
    }
}

/// A request under construction.
///
/// Path segments are appended in call order; a terminal method
/// ([`get`](Self::get), [`post`](Self::post), [`put`](Self::put),
/// [`delete`](Self::delete)) sends it.
#[derive(Debug, Clone)]
#[must_use]
pub struct ApiRequest {
    url: String,
    query: Vec<(String, String)>,
    transport: Arc<dyn Transport>,
}

impl ApiRequest {
    fn segment(mut self, collection: &str, name: Option<&str>) -> Self {
        self.url.push('/');
        self.url.push_str(collection);
        if let Some(name) = name {
            self.url.push('/');
            self.url.push_str(name);
        }
        self
    }

    /// Appends `/hosts/{host}`, plus `;port={port}` for non-default ports.
    pub fn hosts(mut self, host: &str, port: u16) -> Self {
        self = self.segment("hosts", Some(host));
        if port != DEFAULT_TANGO_PORT {
            let _ = write!(self.url, ";port={port}");
        }
        self
    }

    /// Appends `/devices`.
    pub fn devices(self) -> Self {
        self.segment("devices", None)
    }

    /// Appends `/devices/{name}`.
    pub fn device(self, name: &str) -> Self {
        self.segment("devices", Some(name))
    }

    /// Appends `/attributes`.
    pub fn attributes(self) -> Self {
        self.segment("attributes", None)
    }

    /// Appends `/attributes/{name}`.
    pub fn attribute(self, name: &str) -> Self {
        self.segment("attributes", Some(name))
    }

    /// Appends `/commands`.
    pub fn commands(self) -> Self {
        self.segment("commands", None)
    }

    /// Appends `/commands/{name}`.
    pub fn command(self, name: &str) -> Self {
        self.segment("commands", Some(name))
    }

    /// Appends `/pipes`.
    pub fn pipes(self) -> Self {
        self.segment("pipes", None)
    }

    /// Appends `/pipes/{name}`.
    pub fn pipe(self, name: &str) -> Self {
        self.segment("pipes", Some(name))
    }

    /// Appends `/properties`.
    pub fn properties(self) -> Self {
        self.segment("properties", None)
    }

    /// Appends `/properties/{name}`.
    pub fn property(self, name: &str) -> Self {
        self.segment("properties", Some(name))
    }

    /// Appends `/subscriptions`.
    pub fn subscriptions(self) -> Self {
        self.segment("subscriptions", None)
    }

    /// Appends `/subscriptions/{id}`.
    pub fn subscription(self, id: &str) -> Self {
        self.segment("subscriptions", Some(id))
    }

    /// Appends `/value`.
    pub fn value(self) -> Self {
        self.segment("value", None)
    }

    /// Appends a raw path suffix, e.g. `event-stream`.
    pub fn path(self, suffix: &str) -> Self {
        self.segment(suffix.trim_start_matches('/'), None)
    }

    /// Adds a query parameter. Values are URL-encoded; repeated keys are kept.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Returns the full URL, including the query string.
    #[must_use]
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }

    /// Sends a `GET`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn get(self) -> Result<Value> {
        self.send(Method::GET, None).await
    }

    /// Sends a `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be serialized, the request fails or
    /// the server reports a failure.
    pub async fn post<B: Serialize + ?Sized>(self, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body).map_err(ParseError::Json)?;
        self.send(Method::POST, Some(body)).await
    }

    /// Sends a `PUT` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be serialized, the request fails or
    /// the server reports a failure.
    pub async fn put<B: Serialize + ?Sized>(self, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body).map_err(ParseError::Json)?;
        self.send(Method::PUT, Some(body)).await
    }

    /// Sends a `PUT` without a body.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn put_empty(self) -> Result<Value> {
        self.send(Method::PUT, None).await
    }

    /// Sends a `DELETE`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn delete(self) -> Result<Value> {
        self.send(Method::DELETE, None).await
    }

    /// Sends a `GET` and deserializes the response.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response has an unexpected shape.
    pub async fn get_as<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.get().await?;
        Ok(serde_json::from_value(value).map_err(ParseError::Json)?)
    }

    async fn send(self, method: Method, body: Option<Value>) -> Result<Value> {
        let url = self.url();
        self.transport.request(method, &url, body.as_ref()).await
    }
}
