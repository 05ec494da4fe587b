// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tango database device facade.
//!
//! Every operation executes one `Db*` command of the database device. Lookups
//! return the command `output`; administrative commands return the full
//! command response.

use serde::Serialize;
use serde_json::Value;

use super::TangoDevice;
use crate::error::{ParseError, Result};

/// The database device of a Tango host.
///
/// Obtained through [`TangoHost::database`](super::TangoHost::database).
#[derive(Debug, Clone)]
pub struct TangoDatabase {
    device: TangoDevice,
}

impl TangoDatabase {
    pub(crate) fn new(device: TangoDevice) -> Self {
        Self { device }
    }

    /// Returns the underlying device.
    #[must_use]
    pub fn device(&self) -> &TangoDevice {
        &self.device
    }

    async fn execute<A: Serialize + ?Sized>(&self, command: &str, argin: &A) -> Result<Value> {
        self.device.command(command).execute(argin).await
    }

    async fn output<A: Serialize + ?Sized>(&self, command: &str, argin: &A) -> Result<Value> {
        let mut response = self.execute(command, argin).await?;
        response
            .get_mut("output")
            .map(Value::take)
            .ok_or_else(|| ParseError::MissingField("output".to_string()).into())
    }

    /// Returns the alias of `device`.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails or returns no output.
    pub async fn device_alias(&self, device: &str) -> Result<Value> {
        self.output("DbGetDeviceAlias", device).await
    }

    /// Returns all device aliases.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails or returns no output.
    pub async fn device_alias_list(&self) -> Result<Value> {
        self.output("DbGetDeviceAliasList", "*").await
    }

    /// Returns the device behind `alias`.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails or returns no output.
    pub async fn device_by_alias(&self, alias: &str) -> Result<Value> {
        self.output("DbGetAliasDevice", alias).await
    }

    /// Registers a device; `svalue` is `[server, device, class]`.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn add_device(&self, svalue: &[&str]) -> Result<Value> {
        self.execute("DbAddDevice", svalue).await
    }

    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn device_domain_list(&self, wildcard: &str) -> Result<Value> {
        self.execute("DbGetDeviceDomainList", wildcard).await
    }

    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn device_family_list(&self, wildcard: &str) -> Result<Value> {
        self.execute("DbGetDeviceFamilyList", wildcard).await
    }

    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn device_member_list(&self, wildcard: &str) -> Result<Value> {
        self.execute("DbGetDeviceMemberList", wildcard).await
    }

    /// Reads device properties; `args` is `[device, property, ...]`.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn device_property(&self, args: &[&str]) -> Result<Value> {
        self.execute("DbGetDeviceProperty", args).await
    }

    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn delete_device(&self, device: &str) -> Result<Value> {
        self.execute("DbDeleteDevice", device).await
    }

    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn put_device_alias(&self, device: &str, alias: &str) -> Result<Value> {
        self.execute("DbPutDeviceAlias", &[device, alias]).await
    }

    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn delete_device_alias(&self, alias: &str) -> Result<Value> {
        self.execute("DbDeleteDeviceAlias", alias).await
    }
}
