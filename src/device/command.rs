// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device command facade.

use serde::Serialize;
use serde_json::Value;

use super::TangoDevice;
use crate::error::Result;
use crate::protocol::RestClient;

/// A command of a Tango device.
#[derive(Debug, Clone)]
pub struct TangoCommand {
    rest: RestClient,
    host: String,
    port: u16,
    device: String,
    name: String,
}

impl TangoCommand {
    pub(crate) fn new(rest: RestClient, host: &str, port: u16, device: &str, name: &str) -> Self {
        Self {
            rest,
            host: host.to_string(),
            port,
            device: device.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns the command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the device this command belongs to.
    #[must_use]
    pub fn tango_device(&self) -> TangoDevice {
        TangoDevice::new(self.rest.clone(), &self.host, self.port, &self.device)
    }

    /// Executes the command with `argin` as input.
    ///
    /// Pass `&()` for commands without input. The response carries the
    /// result under `output`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server reports a failure.
    pub async fn execute<A: Serialize + ?Sized>(&self, argin: &A) -> Result<Value> {
        self.rest
            .request()
            .hosts(&self.host, self.port)
            .device(&self.device)
            .command(&self.name)
            .put(argin)
            .await
    }
}
