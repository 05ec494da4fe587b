// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device pipe facade.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{ApiRequest, RestClient};

/// A pipe of a Tango device.
#[derive(Debug, Clone)]
pub struct TangoPipe {
    rest: RestClient,
    host: String,
    port: u16,
    device: String,
    name: String,
}

impl TangoPipe {
    pub(crate) fn new(rest: RestClient, host: &str, port: u16, device: &str, name: &str) -> Self {
        Self {
            rest,
            host: host.to_string(),
            port,
            device: device.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns the pipe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn request(&self) -> ApiRequest {
        self.rest
            .request()
            .hosts(&self.host, self.port)
            .device(&self.device)
            .pipe(&self.name)
    }

    /// Reads the pipe blob.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn read(&self) -> Result<Value> {
        self.request().get().await
    }

    /// Writes a pipe blob.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn write<B: Serialize + ?Sized>(&self, blob: &B) -> Result<Value> {
        self.request().put(blob).await
    }
}
