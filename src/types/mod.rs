// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the REST and subscription layers.
//!
//! # Types
//!
//! - [`Target`] - A subscribable `(host, device, attribute, event type)` tuple
//! - [`SubscribedEvent`] - Server-assigned event id bound to a [`Target`]
//! - [`Frame`] - One raw unit pushed over the live event stream
//! - [`TargetEvent`] - A decoded frame, as delivered to observers

mod frame;
mod target;
mod target_event;

pub use frame::Frame;
pub use target::{SubscribedEvent, Target, event_type};
pub use target_event::{EventPayload, TargetEvent};
pub(crate) use target::opaque_id;
