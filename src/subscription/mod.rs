// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live event subscriptions.
//!
//! The Tango REST API pushes attribute events over one server-sent event
//! stream per subscription resource. This module multiplexes any number of
//! observers over that single connection.
//!
//! # Overview
//!
//! - [`SubscriptionRegistry`] - Entry point. Deduplicates registrations and
//!   fans frames out to per-target observers
//! - [`SubscriptionSession`] - Mirror of the server-side subscription
//!   resource; re-establishes the event stream after failures
//! - [`PushSource`] - One event stream connection, demultiplexed by event id
//! - [`RetryPolicy`] - How often and how fast to retry opening the stream
//!
//! # Protocol
//!
//! ```text
//! POST {api}/subscriptions          [target, ...]  -> {id, events, failures}
//! PUT  {api}/subscriptions/{id}     [target]       -> [{id, target}, ...]
//! GET  {api}/subscriptions/{id}/event-stream       -> text/event-stream
//! ```
//!
//! Each frame on the stream is typed with the event id the server assigned
//! at registration and carries a sequence token used as the event
//! timestamp.

mod push_source;
mod registry;
mod retry;
mod session;

pub use push_source::{ConnectionState, PushSource};
pub use registry::{
    DEFAULT_CHANNEL_CAPACITY, SubscriptionRegistry, SubscriptionRegistryBuilder, TargetEventStream,
};
pub use retry::RetryPolicy;
pub use session::{SessionState, SubscriptionSession};
