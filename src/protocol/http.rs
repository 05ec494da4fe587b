// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for the Tango REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::error::{ErrorEnvelope, ParseError, ProtocolError, Result};
use crate::protocol::{FrameStream, Transport, decode_frames};

// ============================================================================
// HttpConfig - Connection parameters
// ============================================================================

/// Configuration for connecting to a Tango REST server.
///
/// # Examples
///
/// ```
/// use tango_rest_client::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("http://localhost:10001")
///     .with_credentials("tango-cs", "tango")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.base_url(), "http://localhost:10001");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    base_url: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
    connect_timeout: Duration,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default connection establishment timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the server at `base_url`.
    ///
    /// A missing scheme defaults to `http://`; a trailing slash is removed.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url
        } else {
            format!("http://{base_url}")
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            timeout: Self::DEFAULT_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets HTTP basic authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the timeout for plain REST requests.
    ///
    /// Live event streams are exempt; only their connection phase is bounded
    /// by [`with_connect_timeout`](Self::with_connect_timeout).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the credentials if set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates an `HttpClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> std::result::Result<HttpClient, ProtocolError> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        let credentials = self
            .credentials
            .map(|(username, password)| Credentials { username, password });

        Ok(HttpClient {
            client,
            credentials,
            timeout: self.timeout,
        })
    }
}

// ============================================================================
// HttpClient - reqwest transport
// ============================================================================

/// HTTP basic authentication credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
}

/// `reqwest` based [`Transport`].
///
/// The client is cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl HttpClient {
    /// Creates a client with default settings and no credentials.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new() -> std::result::Result<Self, ProtocolError> {
        HttpConfig::new("localhost").into_client()
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!(method = %method, url = %url, "Sending REST request");

        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header(ACCEPT, "application/json");
        builder = self.authorize(builder);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ProtocolError::Http)?;
        let response = check_status(url, response).await?;
        let body = response.text().await.map_err(ProtocolError::Http)?;

        tracing::debug!(body = %body, "Received REST response");

        parse_body(&body)
    }

    async fn event_stream(&self, url: &str) -> std::result::Result<FrameStream, ProtocolError> {
        tracing::debug!(url = %url, "Opening event stream");

        let builder = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream");
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ProtocolError::AuthenticationFailed);
        }
        if !response.status().is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(decode_frames(response.bytes_stream()))
    }
}

/// Turns a non-success response into a [`ProtocolError`].
///
/// The server's own error envelope is preserved when the body carries one.
async fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ProtocolError::AuthenticationFailed.into());
    }
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let envelope = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .filter(|envelope| !envelope.errors.is_empty())
        .unwrap_or_else(|| {
            let description = if body.is_empty() {
                "Unspecified error".to_string()
            } else {
                body
            };
            ErrorEnvelope::single(status.as_u16().to_string(), description, url)
        });

    tracing::debug!(url = %url, status = status.as_u16(), error = %envelope, "REST request failed");
    Err(ProtocolError::Api(envelope).into())
}

/// Parses a success body; a `FAILURE` quality marker still counts as an error.
fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_str(body).map_err(ParseError::Json)?;
    if value.get("quality").and_then(Value::as_str) == Some(ErrorEnvelope::FAILURE)
        && value.get("errors").is_some()
    {
        let envelope: ErrorEnvelope =
            serde_json::from_value(value).map_err(ParseError::Json)?;
        return Err(ProtocolError::Api(envelope).into());
    }
    Ok(value)
}
