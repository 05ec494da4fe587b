// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device attribute facade.

use std::fmt::Display;

use serde_json::Value;

use super::{TangoDevice, TangoHost};
use crate::error::Result;
use crate::event::AttributeId;
use crate::protocol::{ApiRequest, RestClient};
use crate::types::Target;

/// An attribute of a Tango device.
///
/// # Examples
///
/// ```no_run
/// use tango_rest_client::device::TangoRestApi;
/// use tango_rest_client::protocol::HttpConfig;
///
/// # async fn example() -> tango_rest_client::Result<()> {
/// let api = TangoRestApi::connect(HttpConfig::new("localhost:10001"))?;
/// let attribute = api.attribute("localhost", 10000, "sys/tg_test/1", "double_scalar");
///
/// let value = attribute.read().await?;
/// println!("{}", value["value"]);
///
/// attribute.write(3.14).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TangoAttribute {
    rest: RestClient,
    host: String,
    port: u16,
    device: String,
    name: String,
}

impl TangoAttribute {
    pub(crate) fn new(rest: RestClient, host: &str, port: u16, device: &str, name: &str) -> Self {
        Self {
            rest,
            host: host.to_string(),
            port,
            device: device.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns the Tango host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the Tango host port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the device name.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the `host:port/device/name` identifier.
    #[must_use]
    pub fn id(&self) -> AttributeId {
        AttributeId::new(&format!("{}:{}", self.host, self.port), &self.device, &self.name)
    }

    /// Returns the host this attribute lives on.
    #[must_use]
    pub fn tango_host(&self) -> TangoHost {
        TangoHost::new(self.rest.clone(), &self.host, self.port)
    }

    /// Returns the device this attribute belongs to.
    #[must_use]
    pub fn tango_device(&self) -> TangoDevice {
        TangoDevice::new(self.rest.clone(), &self.host, self.port, &self.device)
    }

    /// Returns the subscription target for `event_type` events of this attribute.
    #[must_use]
    pub fn target(&self, event_type: &str) -> Target {
        Target::new(
            format!("{}:{}", self.host, self.port),
            &self.device,
            &self.name,
            event_type,
        )
    }

    fn request(&self) -> ApiRequest {
        self.rest
            .request()
            .hosts(&self.host, self.port)
            .device(&self.device)
            .attribute(&self.name)
    }

    /// Reads the current value.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn read(&self) -> Result<Value> {
        self.request().value().get().await
    }

    /// Writes `value` and returns the value reported back by the server.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn write(&self, value: impl Display) -> Result<Value> {
        self.request()
            .value()
            .query("v", value.to_string())
            .put_empty()
            .await
    }

    /// Returns the attribute configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn info(&self) -> Result<Value> {
        self.request().path("info").get().await
    }

    /// Returns the attribute properties.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn properties(&self) -> Result<Value> {
        self.request().properties().get().await
    }
}
