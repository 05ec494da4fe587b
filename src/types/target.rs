// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription targets and their server-side registrations.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValueError;

/// Well-known Tango event types.
pub mod event_type {
    /// Fired when the value changes beyond the configured thresholds.
    pub const CHANGE: &str = "change";
    /// Fired at a fixed period.
    pub const PERIODIC: &str = "periodic";
    /// Fired according to the archiving configuration.
    pub const ARCHIVE: &str = "archive";
    /// Pushed explicitly by the device server.
    pub const USER: &str = "user";
}

/// Identifies a subscribable endpoint on a Tango control system.
///
/// Equality and hashing are structural over all four fields, so a `Target`
/// can be used directly as a lookup key.
///
/// On the wire the event type is serialized as `type`. Older API versions
/// name the attribute field `name`; both spellings are accepted.
///
/// # Examples
///
/// ```
/// use tango_rest_client::types::{Target, event_type};
///
/// let target = Target::new("localhost:10000", "sys/tg_test/1", "double_scalar", event_type::CHANGE);
/// let json = serde_json::to_value(&target).unwrap();
/// assert_eq!(json["type"], "change");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Tango host, usually `host:port` of the database server.
    pub host: String,
    /// Device name, e.g. `sys/tg_test/1`.
    pub device: String,
    /// Attribute name.
    #[serde(alias = "name")]
    pub attribute: String,
    /// Event type, see [`event_type`].
    #[serde(rename = "type")]
    pub event_type: String,
}

impl Target {
    /// Creates a new target.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        device: impl Into<String>,
        attribute: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            device: device.into(),
            attribute: attribute.into(),
            event_type: event_type.into(),
        }
    }

    /// Checks that no field is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::EmptyField`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ValueError> {
        let fields = [
            ("host", &self.host),
            ("device", &self.device),
            ("attribute", &self.attribute),
            ("event type", &self.event_type),
        ];
        match fields.into_iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(ValueError::EmptyField(name)),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} ({})",
            self.host, self.device, self.attribute, self.event_type
        )
    }
}

/// A target registered with a subscription session.
///
/// The `id` is opaque and assigned by the server; frames on the event
/// stream are typed with it. Servers send it either as a string or as an
/// integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribedEvent {
    /// Server-assigned event id.
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    /// The target this id was registered for.
    pub target: Target,
}

impl SubscribedEvent {
    /// Creates a new subscribed event.
    #[must_use]
    pub fn new(id: impl Into<String>, target: Target) -> Self {
        Self {
            id: id.into(),
            target,
        }
    }

    /// Returns `true` if this event was registered for `target`.
    #[must_use]
    pub fn matches(&self, target: &Target) -> bool {
        self.target == *target
    }
}

/// Deserializes an identifier sent either as a JSON string or number.
pub(crate) fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(id) => id,
        Id::Number(id) => id.to_string(),
    })
}
