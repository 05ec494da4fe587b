// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tango host facade.

use serde::Deserialize;
use serde_json::Value;

use super::{TangoDatabase, TangoDevice};
use crate::error::{ParseError, Result};
use crate::protocol::{ApiRequest, RestClient};

#[derive(Deserialize)]
struct HostName {
    name: String,
}

/// A Tango host (database server) reachable through the REST API.
#[derive(Debug, Clone)]
pub struct TangoHost {
    rest: RestClient,
    host: String,
    port: u16,
}

impl TangoHost {
    pub(crate) fn new(rest: RestClient, host: &str, port: u16) -> Self {
        Self {
            rest,
            host: host.to_string(),
            port,
        }
    }

    /// Returns the host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    fn request(&self) -> ApiRequest {
        self.rest.request().hosts(&self.host, self.port)
    }

    /// Returns the host description (the `info` member of the host resource).
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

    /// Returns a device on this host.
    #[must_use]
    pub fn device(&self, name: &str) -> TangoDevice {
        TangoDevice::new(self.rest.clone(), &self.host, self.port, name)
    }

    /// Lists the devices matching any of `wildcards`, or all devices when empty.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn devices(&self, wildcards: &[&str]) -> Result<Value> {
        wildcards
            .iter()
            .fold(self.request().devices(), |request, wildcard| {
                request.query("wildcard", *wildcard)
            })
            .get()
            .await
    }

    /// Resolves the database device of this host.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the host does not report its
    /// database name.
    pub async fn database(&self) -> Result<TangoDatabase> {
        let host: HostName = self.request().query("filter", "name").get_as().await?;
        Ok(TangoDatabase::new(self.device(&host.name)))
    }
}
