// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute whose reads, writes and live events all flow through one bus.

use std::fmt::Display;

use futures::stream::BoxStream;
use serde_json::Value;

use super::TangoAttribute;
use crate::error::Result;
use crate::event::{AttributeId, EventBus, TangoEvent};
use crate::subscription::{SubscriptionRegistry, TargetEventStream};

/// Decorates a [`TangoAttribute`] with event publication.
///
/// Every [`read`](Self::read) and [`write`](Self::write) publishes its
/// outcome on the bus under the attribute id `host:port/device/name`, so
/// [`updates`](Self::updates) sees polled values next to pushed ones. Live
/// events only reach [`updates`](Self::updates) if the registry publishes
/// on the same bus, which [`TangoAttribute::reactive`] guarantees.
///
/// # Examples
///
/// ```no_run
/// use futures::StreamExt;
/// use tango_rest_client::device::TangoRestApi;
/// use tango_rest_client::protocol::HttpConfig;
/// use tango_rest_client::types::event_type;
///
/// # async fn example() -> tango_rest_client::Result<()> {
/// let api = TangoRestApi::connect(HttpConfig::new("localhost:10001"))?;
/// let registry = api.subscriptions();
/// let ampli = api
///     .attribute("localhost", 10000, "sys/tg_test/1", "ampli")
///     .reactive(&registry);
///
/// let mut updates = ampli.updates();
/// let _events = ampli.observe(event_type::CHANGE).await?;
/// ampli.write(2.5).await?;
///
/// while let Some(event) = updates.next().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReactiveAttribute {
    attribute: TangoAttribute,
    bus: EventBus,
    registry: SubscriptionRegistry,
    id: AttributeId,
}

impl ReactiveAttribute {
    /// Wraps `attribute`, publishing on `bus` and subscribing through `registry`.
    #[must_use]
    pub fn new(attribute: TangoAttribute, bus: EventBus, registry: SubscriptionRegistry) -> Self {
        let id = attribute.id();
        Self {
            attribute,
            bus,
            registry,
            id,
        }
    }

    /// Returns the wrapped attribute.
    #[must_use]
    pub fn attribute(&self) -> &TangoAttribute {
        &self.attribute
    }

    /// Returns the id events are published under.
    #[must_use]
    pub fn id(&self) -> &AttributeId {
        &self.id
    }

    /// Reads the attribute and publishes the outcome.
    ///
    /// # Errors
    ///
    /// Returns the read error after publishing it.
    pub async fn read(&self) -> Result<Value> {
        let outcome = self.attribute.read().await;
        self.publish(&outcome);
        outcome
    }

    /// Writes the attribute and publishes the outcome.
    ///
    /// # Errors
    ///
    /// Returns the write error after publishing it.
    pub async fn write(&self, value: impl Display) -> Result<Value> {
        let outcome = self.attribute.write(value).await;
        self.publish(&outcome);
        outcome
    }

    fn publish(&self, outcome: &Result<Value>) {
        let event = match outcome {
            Ok(value) => TangoEvent::AttributeRead {
                attribute: self.id.clone(),
                value: value.clone(),
            },
            Err(err) => TangoEvent::AttributeFailure {
                attribute: self.id.clone(),
                error: err.to_string(),
            },
        };
        self.bus.publish(event);
    }

    /// Subscribes to live `event_type` events of the attribute.
    ///
    /// # Errors
    ///
    /// See [`SubscriptionRegistry::observe`].
    pub async fn observe(&self, event_type: &str) -> Result<TargetEventStream> {
        self.registry.observe(self.attribute.target(event_type)).await
    }

    /// Streams every bus event concerning this attribute.
    pub fn updates(&self) -> BoxStream<'static, TangoEvent> {
        self.bus.attribute_events(self.id.clone())
    }
}

impl TangoAttribute {
    /// Wraps this attribute, publishing on the bus of `registry`.
    #[must_use]
    pub fn reactive(self, registry: &SubscriptionRegistry) -> ReactiveAttribute {
        ReactiveAttribute::new(self, registry.event_bus().clone(), registry.clone())
    }
}
