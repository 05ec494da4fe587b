// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tango REST Client - an async Rust client for the Tango Controls REST API.
//!
//! # Features
//!
//! - **Object model**: hosts, devices, attributes, commands, pipes and the
//!   Tango database as cheap facade handles
//! - **Live events**: any number of observers multiplexed over one
//!   server-sent event stream, with deduplicated server registrations and
//!   automatic reconnection
//! - **Event bus**: polled reads and writes published next to pushed events
//!
//! # Quick Start
//!
//! ## Reading and writing attributes
//!
//! ```no_run
//! use tango_rest_client::{HttpConfig, TangoRestApi};
//!
//! #[tokio::main]
//! async fn main() -> tango_rest_client::Result<()> {
//!     let api = TangoRestApi::connect(
//!         HttpConfig::new("localhost:10001").with_credentials("tango-cs", "tango"),
//!     )?;
//!
//!     let ampli = api.attribute("localhost", 10000, "sys/tg_test/1", "ampli");
//!     ampli.write(2.5).await?;
//!     println!("{}", ampli.read().await?["value"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Observing live events
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use futures::StreamExt;
//! use tango_rest_client::{HttpConfig, TangoRestApi, Target, event_type};
//!
//! #[tokio::main]
//! async fn main() -> tango_rest_client::Result<()> {
//!     let api = TangoRestApi::connect(HttpConfig::new("localhost:10001"))?;
//!     let registry = api.subscriptions();
//!     registry.shutdown_on(tokio::time::sleep(Duration::from_secs(60)));
//!
//!     let target = Target::new("localhost:10000", "sys/tg_test/1", "double_scalar", event_type::CHANGE);
//!     let mut events = registry.observe(target).await?;
//!
//!     while let Some(event) = events.next().await {
//!         match event {
//!             Ok(event) => println!("{} = {:?}", event.target, event.data()),
//!             Err(e) => eprintln!("subscription ended: {e}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

pub mod device;
pub mod error;
pub mod event;
pub mod protocol;
pub mod subscription;
pub mod types;

#[cfg(test)]
mod testing;

pub use device::{
    ReactiveAttribute, TangoAttribute, TangoCommand, TangoDatabase, TangoDevice, TangoHost,
    TangoPipe, TangoRestApi,
};
pub use error::{Error, ErrorEnvelope, ParseError, ProtocolError, Result, SubscriptionError, ValueError};
pub use event::{AttributeId, EventBus, TangoEvent};
pub use protocol::{HttpClient, HttpConfig, Transport};
pub use subscription::{RetryPolicy, SubscriptionRegistry, TargetEventStream};
pub use types::{Frame, Target, TargetEvent, event_type};
