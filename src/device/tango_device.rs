// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde_json::Value;

use super::{TangoAttribute, TangoCommand, TangoHost, TangoPipe};
use crate::error::{ParseError, Result};
use crate::protocol::{ApiRequest, RestClient};

/// A Tango device on a given host.
///
/// Creating a device performs no request; members are resolved lazily.
#[derive(Debug, Clone)]
pub struct TangoDevice {
    rest: RestClient,
    host: String,
    port: u16,
    name: String,
}

impl TangoDevice {
    pub(crate) fn new(rest: RestClient, host: &str, port: u16, name: &str) -> Self {
        Self {
            rest,
            host: host.to_string(),
            port,
            name: name.to_string(),
        }
    }

    /// Returns the device name (`domain/family/member`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the host this device is registered on.
    #[must_use]
    pub fn tango_host(&self) -> TangoHost {
        TangoHost::new(self.rest.clone(), &self.host, self.port)
    }

    fn request(&self) -> ApiRequest {
        self.rest
            .request()
            .hosts(&self.host, self.port)
            .device(&self.name)
    }

    /// Returns the device description (the `info` member of the device resource).
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response has no `info`.
    pub async fn info(&self) -> Result<Value> {
        let mut response = self.request().get().await?;
        response
            .get_mut("info")
            .map(Value::take)
            .ok_or_else(|| ParseError::MissingField("info".to_string()).into())
    }

    /// Returns the device properties.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn properties(&self) -> Result<Value> {
        self.request().properties().get().await
    }

    /// Lists the device attributes.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn attributes(&self) -> Result<Value> {
        self.request().attributes().get().await
    }

    /// Lists the device commands.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn commands(&self) -> Result<Value> {
        self.request().commands().get().await
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> TangoAttribute {
        TangoAttribute::new(self.rest.clone(), &self.host, self.port, &self.name, name)
    }

    #[must_use]
    pub fn command(&self, name: &str) -> TangoCommand {
        TangoCommand::new(self.rest.clone(), &self.host, self.port, &self.name, name)
    }

    #[must_use]
    pub fn pipe(&self, name: &str) -> TangoPipe {
        TangoPipe::new(self.rest.clone(), &self.host, self.port, &self.name, name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::protocol::Transport;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn info_and_properties() {
        let transport = Arc::new(MockTransport::new());
        let base = "http://api/hosts/localhost;port=10001/devices/sys/tg_test/1";
        transport.respond(
            Method::GET,
            base,
            json!({"name": "sys/tg_test/1", "info": {"server": "TangoTest/test"}}),
        );
        transport.respond(
            Method::GET,
            &format!("{base}/properties"),
            json!([{"name": "polled_attr", "values": ["ampli", "1000"]}]),
        );
        let rest = RestClient::new(
            "http://api",
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        let device = TangoDevice::new(rest, "localhost", 10001, "sys/tg_test/1");

        assert_eq!(device.info().await.unwrap()["server"], "TangoTest/test");
        assert_eq!(device.properties().await.unwrap()[0]["name"], "polled_attr");
    }

    #[test]
    fn members_inherit_location() {
        let transport = Arc::new(MockTransport::new());
        let rest = RestClient::new("http://api", transport as Arc<dyn Transport>);
        let device = TangoDevice::new(rest, "tango-cs", 10001, "sys/tg_test/1");

        let attribute = device.attribute("double_scalar");

        assert_eq!(attribute.host(), "tango-cs");
        assert_eq!(attribute.port(), 10001);
        assert_eq!(attribute.device(), "sys/tg_test/1");
        assert_eq!(device.command("State").name(), "State");
        assert_eq!(device.pipe("string_long_short_ro").name(), "string_long_short_ro");
    }
}
