// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Target;

/// Fully qualified attribute name, `host:port/device/attribute`.
///
/// # Examples
///
/// ```
/// use tango_rest_client::event::AttributeId;
///
/// let id = AttributeId::new("localhost:10000", "sys/tg_test/1", "double_scalar");
/// assert_eq!(id.to_string(), "localhost:10000/sys/tg_test/1/double_scalar");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(String);

impl AttributeId {
    /// Creates an identifier from its parts.
    #[must_use]
    pub fn new(host: &str, device: &str, attribute: &str) -> Self {
        Self(format!("{host}/{device}/{attribute}"))
    }

    /// Returns the identifier of the attribute a target points at.
    #[must_use]
    pub fn of_target(target: &Target) -> Self {
        Self::new(&target.host, &target.device, &target.attribute)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeId({})", self.0)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_id_ignores_event_type() {
        let change = Target::new("localhost:10000", "sys/tg_test/1", "state", "change");
        let periodic = Target::new("localhost:10000", "sys/tg_test/1", "state", "periodic");

        assert_eq!(AttributeId::of_target(&change), AttributeId::of_target(&periodic));
    }

    #[test]
    fn debug_format() {
        let id = AttributeId::new("h:1", "a/b/c", "x");
        assert_eq!(format!("{id:?}"), "AttributeId(h:1/a/b/c/x)");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AttributeId::new("h:1", "a/b/c", "x");
        assert_eq!(serde_json::to_value(&id).unwrap(), "h:1/a/b/c/x");
    }
}
