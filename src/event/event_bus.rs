// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast bus for [`TangoEvent`]s.

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{AttributeId, TangoEvent};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for [`TangoEvent`]s.
///
/// Every subscriber gets its own copy of each event published after it
/// subscribed. A subscriber that falls more than the capacity behind loses
/// the oldest events (`RecvError::Lagged`).
///
/// Clones share the same channel.
///
/// # Examples
///
/// ```
/// use tango_rest_client::event::{AttributeId, EventBus, TangoEvent};
///
/// let bus = EventBus::with_capacity(16);
/// let mut rx = bus.subscribe();
/// let other = bus.clone();
///
/// other.publish(TangoEvent::AttributeFailure {
///     attribute: AttributeId::new("localhost:10000", "sys/tg_test/1", "ampli"),
///     error: "timeout".to_string(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TangoEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus buffering at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TangoEvent> {
        self.sender.subscribe()
    }

    /// Returns a stream of the events concerning one attribute.
    ///
    /// Lagged events are skipped; the stream ends when every bus handle
    /// has been dropped.
    pub fn attribute_events(&self, attribute: AttributeId) -> BoxStream<'static, TangoEvent> {
        let rx = self.subscribe();
        stream::unfold((rx, attribute), |(mut rx, attribute)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.attribute_id() == attribute => {
                        return Some((event, (rx, attribute)));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(attribute = %attribute, skipped, "Event bus subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all subscribers.
    ///
    /// Without subscribers the event is discarded.
    pub fn publish(&self, event: TangoEvent) {
        let _ = self.sender.send(event);
    }

    /// Publishes an event and returns the number of receivers that got it.
    #[must_use]
    pub fn publish_counted(&self, event: TangoEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
