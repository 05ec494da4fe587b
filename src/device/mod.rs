// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object model of the Tango REST API.
//!
//! Facades are cheap handles: constructing one performs no request. Every
//! operation maps to a single REST call.
//!
//! ```text
//! TangoRestApi
//!  └─ TangoHost            /hosts/{host}[;port={port}]
//!      ├─ TangoDatabase    (the host's database device)
//!      └─ TangoDevice      /devices/{name}
//!          ├─ TangoAttribute   /attributes/{name}
//!          ├─ TangoCommand     /commands/{name}
//!          └─ TangoPipe        /pipes/{name}
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use tango_rest_client::device::TangoRestApi;
//! use tango_rest_client::protocol::HttpConfig;
//!
//! # async fn example() -> tango_rest_client::Result<()> {
//! let api = TangoRestApi::connect(
//!     HttpConfig::new("localhost:10001").with_credentials("tango-cs", "tango"),
//! )?;
//! api.ping().await?;
//!
//! let device = api.device("localhost", 10000, "sys/tg_test/1");
//! let state = device.command("State").execute(&()).await?;
//! println!("{}", state["output"]);
//! # Ok(())
//! # }
//! ```

mod attribute;
mod command;
mod database;
mod host;
mod pipe;
mod reactive;
mod tango_device;

pub use attribute::TangoAttribute;
pub use command::TangoCommand;
pub use database::TangoDatabase;
pub use host::TangoHost;
pub use pipe::TangoPipe;
pub use reactive::ReactiveAttribute;
pub use tango_device::TangoDevice;

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::protocol::{HttpConfig, RestClient, Transport};
use crate::subscription::{SubscriptionRegistry, SubscriptionRegistryBuilder};

/// Path of the REST API below the server base URL.
pub const API_PATH: &str = "tango/rest/v11";

/// Entry point of the Tango REST API.
#[derive(Debug, Clone)]
pub struct TangoRestApi {
    base_url: String,
    rest: RestClient,
}

impl TangoRestApi {
    /// Creates an API handle for the server at `base_url`, e.g.
    /// `http://localhost:10001`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let rest = RestClient::new(format!("{base_url}/{API_PATH}"), transport);
        Self { base_url, rest }
    }

    /// Creates an API handle backed by an [`HttpClient`](crate::protocol::HttpClient).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn connect(config: HttpConfig) -> Result<Self> {
        let base_url = config.base_url().to_string();
        let client = config.into_client()?;
        Ok(Self::new(base_url, Arc::new(client)))
    }

    /// Returns the REST API root, `{base}/tango/rest/v11`.
    #[must_use]
    pub fn url(&self) -> &str {
        self.rest.url()
    }

    /// Returns the request builder rooted at the API.
    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Fetches the API root.
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or reports a failure.
    pub async fn ping(&self) -> Result<Value> {
        self.rest.request().get().await
    }

    /// Returns a handle to the Tango host `host:port`.
    #[must_use]
    pub fn host(&self, host: &str, port: u16) -> TangoHost {
        TangoHost::new(self.rest.clone(), host, port)
    }

    /// Returns a handle to device `name` on `host:port`.
    #[must_use]
    pub fn device(&self, host: &str, port: u16, name: &str) -> TangoDevice {
        TangoDevice::new(self.rest.clone(), host, port, name)
    }

    /// Returns a handle to attribute `name` of `device`.
    #[must_use]
    pub fn attribute(&self, host: &str, port: u16, device: &str, name: &str) -> TangoAttribute {
        TangoAttribute::new(self.rest.clone(), host, port, device, name)
    }

    /// Returns a handle to command `name` of `device`.
    #[must_use]
    pub fn command(&self, host: &str, port: u16, device: &str, name: &str) -> TangoCommand {
        TangoCommand::new(self.rest.clone(), host, port, device, name)
    }

    /// Returns a handle to pipe `name` of `device`.
    #[must_use]
    pub fn pipe(&self, host: &str, port: u16, device: &str, name: &str) -> TangoPipe {
        TangoPipe::new(self.rest.clone(), host, port, device, name)
    }

    /// Returns a subscription registry with default settings.
    ///
    /// Each call opens an independent registry; share the returned handle to
    /// share its event stream.
    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionRegistry {
        self.subscriptions_builder().build()
    }

    /// Returns a builder for a subscription registry bound to `{base}/tango`.
    #[must_use]
    pub fn subscriptions_builder(&self) -> SubscriptionRegistryBuilder {
        SubscriptionRegistry::builder(
            format!("{}/tango", self.base_url),
            Arc::clone(self.rest.transport()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn api() -> TangoRestApi {
        TangoRestApi::new("http://localhost:10001/", Arc::new(MockTransport::new()))
    }

    #[test]
    fn api_root_is_versioned() {
        assert_eq!(api().url(), "http://localhost:10001/tango/rest/v11");
    }

    #[test]
    fn factories_share_location() {
        let attribute = api().attribute("tango-cs", 10000, "sys/tg_test/1", "ampli");

        assert_eq!(attribute.id().as_str(), "tango-cs:10000/sys/tg_test/1/ampli");
        assert_eq!(attribute.tango_device().name(), "sys/tg_test/1");
        assert_eq!(attribute.tango_host().port(), 10000);
    }

    #[tokio::test]
    async fn ping_gets_root() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            reqwest::Method::GET,
            "http://localhost:10001/tango/rest/v11",
            serde_json::json!({"hosts": "http://localhost:10001/tango/rest/v11/hosts"}),
        );
        let api = TangoRestApi::new(
            "http://localhost:10001",
            Arc::clone(&transport) as Arc<dyn Transport>,
        );

        let root = api.ping().await.unwrap();

        assert!(root.get("hosts").is_some());
    }
}
