// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event types carried by the [`EventBus`](super::EventBus).

use serde::Serialize;
use serde_json::Value;

use super::AttributeId;
use crate::types::TargetEvent;

/// Events published on an [`EventBus`](super::EventBus).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TangoEvent {
    /// A decoded frame from a live subscription.
    Subscription(TargetEvent),

    /// An attribute was read or written successfully.
    AttributeRead {
        /// The attribute.
        attribute: AttributeId,
        /// The value returned by the server.
        value: Value,
    },

    /// Reading or writing an attribute failed.
    AttributeFailure {
        /// The attribute.
        attribute: AttributeId,
        /// Description of the failure.
        error: String,
    },
}

impl TangoEvent {
    /// Returns the attribute this event concerns.
    #[must_use]
    pub fn attribute_id(&self) -> AttributeId {
        match self {
            Self::Subscription(event) => AttributeId::of_target(&event.target),
            Self::AttributeRead { attribute, .. } | Self::AttributeFailure { attribute, .. } => {
                attribute.clone()
            }
        }
    }

    /// Returns `true` if this event reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        match self {
            Self::Subscription(event) => event.is_error(),
            Self::AttributeRead { .. } => false,
            Self::AttributeFailure { .. } => true,
        }
    }
}

impl From<TargetEvent> for TangoEvent {
    fn from(event: TargetEvent) -> Self {
        Self::Subscription(event)
    }
}
