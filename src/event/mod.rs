// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for attribute reads and live subscription events.
//!
//! The [`EventBus`] is passed explicitly to whoever publishes or listens;
//! there is no process-wide default. A
//! [`SubscriptionRegistry`](crate::subscription::SubscriptionRegistry)
//! publishes every decoded live event to its bus, and a
//! [`ReactiveAttribute`](crate::device::ReactiveAttribute) publishes the
//! outcome of each read and write.
//!
//! # Examples
//!
//! ```
//! use tango_rest_client::event::{AttributeId, EventBus, TangoEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! let id = AttributeId::new("localhost:10000", "sys/tg_test/1", "double_scalar");
//! bus.publish(TangoEvent::AttributeRead {
//!     attribute: id,
//!     value: serde_json::json!({"value": 1.5}),
//! });
//! ```

mod attribute_id;
mod event_bus;
mod tango_event;

pub use attribute_id::AttributeId;
pub use event_bus::EventBus;
pub use tango_event::TangoEvent;
