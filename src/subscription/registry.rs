// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-target fan-out of one shared subscription session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::session::Delivery;
use super::{RetryPolicy, SessionState, SubscriptionSession};
use crate::error::SubscriptionError;
use crate::event::{EventBus, TangoEvent};
use crate::protocol::{RestClient, Transport};
use crate::types::{SubscribedEvent, Target, TargetEvent};

/// Default number of frames buffered per target channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Decoded events for one target.
///
/// Yields `Ok` events until the registry shuts down or the target is
/// unsubscribed, then ends. If the event stream cannot be re-established it
/// yields one [`SubscriptionError::ReconnectExhausted`] and ends.
pub type TargetEventStream = BoxStream<'static, Result<TargetEvent, SubscriptionError>>;

type PendingRegistration = Shared<BoxFuture<'static, Result<Channel, SubscriptionError>>>;

#[derive(Debug, Clone)]
struct Channel {
    event: SubscribedEvent,
    sender: broadcast::Sender<Delivery>,
}

#[derive(Debug)]
struct ChannelEntry {
    channel: Channel,
    publisher: JoinHandle<()>,
    session_state: watch::Receiver<SessionState>,
}

impl ChannelEntry {
    fn is_live(&self) -> bool {
        !self.session_state.borrow().is_terminal()
    }

    fn close(self) {
        self.publisher.abort();
        let _ = self.channel.sender.send(Delivery::Closed);
    }
}

#[derive(Default)]
struct Routes {
    channels: HashMap<Target, ChannelEntry>,
    pending: HashMap<Target, PendingRegistration>,
}

struct RegistryInner {
    client: RestClient,
    policy: RetryPolicy,
    capacity: usize,
    bus: EventBus,
    session: tokio::sync::Mutex<Option<SubscriptionSession>>,
    routes: Mutex<Routes>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for RegistryInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("url", &self.client.url())
            .field("channels", &self.routes.lock().channels.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Builder for [`SubscriptionRegistry`].
#[derive(Debug)]
#[must_use]
pub struct SubscriptionRegistryBuilder {
    client: RestClient,
    policy: RetryPolicy,
    capacity: usize,
    bus: Option<EventBus>,
}

impl SubscriptionRegistryBuilder {
    /// Sets the policy for opening and re-opening the event stream.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets how many frames each target channel buffers for slow observers.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Publishes decoded events to `bus` instead of a private bus.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the registry. No request is sent until the first
    /// [`observe`](SubscriptionRegistry::observe).
    pub fn build(self) -> SubscriptionRegistry {
        SubscriptionRegistry {
            inner: Arc::new(RegistryInner {
                client: self.client,
                policy: self.policy,
                capacity: self.capacity,
                bus: self.bus.unwrap_or_default(),
                session: tokio::sync::Mutex::new(None),
                routes: Mutex::new(Routes::default()),
                shutdown: watch::channel(false).0,
            }),
        }
    }
}

/// Entry point for live events.
///
/// All targets share one [`SubscriptionSession`] and therefore one event
/// stream connection. The session is created by the first
/// [`observe`](Self::observe) and replaced if it fails for good.
///
/// Concurrent `observe` calls for the same target share a single server
/// registration; each call still gets its own stream.
///
/// Clones share the same session.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use tango_rest_client::protocol::HttpClient;
/// use tango_rest_client::subscription::SubscriptionRegistry;
/// use tango_rest_client::types::{Target, event_type};
///
/// # async fn example() -> tango_rest_client::Result<()> {
/// let registry = SubscriptionRegistry::new(
///     "http://localhost:10001/tango",
///     Arc::new(HttpClient::new()?),
/// );
///
/// let target = Target::new("localhost:10000", "sys/tg_test/1", "double_scalar", event_type::CHANGE);
/// let mut events = registry.observe(target).await?;
///
/// while let Some(event) = events.next().await {
///     let event = event?;
///     println!("{} @ {}: {:?}", event.target, event.timestamp, event.payload);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Creates a registry with default settings.
    ///
    /// `api_url` is the subscription API root, `{base}/tango`.
    #[must_use]
    pub fn new(api_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self::builder(api_url, transport).build()
    }

    /// Creates a builder.
    pub fn builder(
        api_url: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> SubscriptionRegistryBuilder {
        SubscriptionRegistryBuilder {
            client: RestClient::new(api_url, transport),
            policy: RetryPolicy::default(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            bus: None,
        }
    }

    /// Subscribes to `target`.
    ///
    /// Opens the shared session if needed and registers the target with the
    /// server unless it already is. Events that arrive before this returns
    /// are not replayed.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`](crate::error::ValueError) for a target with an
    /// empty field, or a [`SubscriptionError`] if the session cannot be
    /// opened, the target is rejected, or the registry is shut down.
    pub async fn observe(&self, target: Target) -> crate::Result<TargetEventStream> {
        target.validate()?;
        let channel = self.inner.channel(target).await?;
        Ok(decode(&channel))
    }

    /// Returns decoded events of every target, as published on the bus.
    pub fn events(&self) -> BoxStream<'static, TargetEvent> {
        let rx = self.inner.bus.subscribe();
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(TangoEvent::Subscription(event)) => return Some((event, rx)),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Merged event stream lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Returns the bus decoded events are published on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Stops delivering events for `target` and completes its observers.
    ///
    /// Returns `false` if the target was not observed. The registration is
    /// kept on the server; observing the target again reuses it.
    pub async fn unsubscribe(&self, target: &Target) -> bool {
        let entry = self.inner.routes.lock().channels.remove(target);
        let Some(entry) = entry else {
            return false;
        };

        if let Some(session) = self.inner.session.lock().await.as_ref() {
            session.detach(&entry.channel.event.id);
        }
        entry.close();
        tracing::info!(endpoint = %target, "Unsubscribed; server-side registration kept");
        true
    }

    /// Closes the session and completes every observer.
    ///
    /// Later calls to [`observe`](Self::observe) fail with
    /// [`SubscriptionError::Closed`].
    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }

    /// Shuts the registry down once `signal` completes.
    ///
    /// The task does not keep the registry alive.
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use tango_rest_client::protocol::HttpClient;
    /// # use tango_rest_client::subscription::SubscriptionRegistry;
    /// # async fn example() -> tango_rest_client::Result<()> {
    /// let registry = SubscriptionRegistry::new("http://localhost:10001/tango", Arc::new(HttpClient::new()?));
    /// registry.shutdown_on(async {
    ///     let _ = tokio::signal::ctrl_c().await;
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn shutdown_on<F>(&self, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            signal.await;
            if let Some(inner) = Weak::upgrade(&inner) {
                inner.shutdown().await;
            }
        })
    }

    /// Returns true once the registry has been shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Returns the number of targets with a live channel.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.routes.lock().channels.len()
    }

    /// Returns the registrations of the current session.
    pub async fn session_events(&self) -> Vec<SubscribedEvent> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(SubscriptionSession::events)
            .unwrap_or_default()
    }
}

impl RegistryInner {
    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once the registry is shut down.
    async fn closing(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let _ = shutdown.wait_for(|closed| *closed).await;
    }

    /// Returns the live channel for `target`, registering it if needed.
    ///
    /// The registration runs on its own task, so it settles and leaves the
    /// pending map even if every caller stops waiting for it.
    async fn channel(self: &Arc<Self>, target: Target) -> Result<Channel, SubscriptionError> {
        if self.is_closed() {
            return Err(SubscriptionError::Closed);
        }

        let registration = {
            let mut routes = self.routes.lock();
            if !routes.pending.contains_key(&target)
                && let Some(entry) = routes.channels.get(&target)
                && entry.is_live()
            {
                return Ok(entry.channel.clone());
            }
            routes
                .pending
                .entry(target.clone())
                .or_insert_with(|| {
                    let task = tokio::spawn(Arc::clone(self).register(target));
                    async move {
                        match task.await {
                            Ok(result) => result,
                            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                            Err(_) => Err(SubscriptionError::Closed),
                        }
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };
        registration.await
    }

    async fn register(self: Arc<Self>, target: Target) -> Result<Channel, SubscriptionError> {
        let result = self.open_channel(&target).await;
        self.routes.lock().pending.remove(&target);
        result
    }

    async fn open_channel(&self, target: &Target) -> Result<Channel, SubscriptionError> {
        let mut slot = tokio::select! {
            slot = self.session.lock() => slot,
            () = self.closing() => return Err(SubscriptionError::Closed),
        };
        if self.is_closed() {
            return Err(SubscriptionError::Closed);
        }

        // Shutdown abandons the work in flight; a session being created is
        // dropped, which closes it.
        tokio::select! {
            result = self.open_channel_locked(&mut slot, target) => result,
            () = self.closing() => Err(SubscriptionError::Closed),
        }
    }

    async fn open_channel_locked(
        &self,
        slot: &mut Option<SubscriptionSession>,
        target: &Target,
    ) -> Result<Channel, SubscriptionError> {
        let session = match slot.take() {
            Some(session) if !session.state().is_terminal() => session,
            previous => {
                if previous.is_some() {
                    tracing::info!("Replacing failed subscription session");
                }
                drop(previous);
                self.discard_channels();
                self.start_session(target).await?
            }
        };
        let session = &*slot.insert(session);

        let event = match session.find_event(target) {
            Some(event) => event,
            None => session.register_target(target).await?,
        };
        Ok(self.install(session, event))
    }

    /// Creates and connects a session with `target` as its initial target.
    ///
    /// Channels for the targets accepted at creation are wired before the
    /// stream opens so their first frames are not lost.
    async fn start_session(&self, target: &Target) -> Result<SubscriptionSession, SubscriptionError> {
        let session =
            SubscriptionSession::create(&self.client, std::slice::from_ref(target), self.policy.clone())
                .await?;
        for event in session.events() {
            self.install(&session, event);
        }

        if let Err(e) = session.connect().await {
            self.discard_channels();
            return Err(e);
        }
        Ok(session)
    }

    /// Wires a channel for `event`, or returns the existing one.
    fn install(&self, session: &SubscriptionSession, event: SubscribedEvent) -> Channel {
        let mut routes = self.routes.lock();
        if let Some(entry) = routes.channels.get(&event.target) {
            return entry.channel.clone();
        }

        let (sender, _) = broadcast::channel(self.capacity);
        session.attach(&event.id, sender.clone());
        let publisher = spawn_publisher(
            event.target.clone(),
            sender.subscribe(),
            self.bus.clone(),
        );
        let channel = Channel { event, sender };
        tracing::debug!(event_id = %channel.event.id, endpoint = %channel.event.target, "Channel created");

        routes.channels.insert(
            channel.event.target.clone(),
            ChannelEntry {
                channel: channel.clone(),
                publisher,
                session_state: session.state_changes(),
            },
        );
        channel
    }

    fn discard_channels(&self) {
        let stale: Vec<_> = self.routes.lock().channels.drain().collect();
        for (_, entry) in stale {
            entry.close();
        }
    }

    async fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        if let Some(session) = self.session.lock().await.take() {
            session.close();
        }
        self.discard_channels();
        tracing::info!(url = %self.client.url(), "Subscription registry shut down");
    }
}

/// Decodes one channel's deliveries for a single observer.
fn decode(channel: &Channel) -> TargetEventStream {
    let state = (Some(channel.sender.subscribe()), channel.event.target.clone());
    stream::unfold(state, |(rx, target)| async move {
        let mut rx = rx?;
        loop {
            match rx.recv().await {
                Ok(Delivery::Frame(frame)) => {
                    let event = TargetEvent::from_frame(&target, &frame);
                    return Some((Ok(event), (Some(rx), target)));
                }
                Ok(Delivery::Terminated(error)) => return Some((Err(error), (None, target))),
                Ok(Delivery::Closed) | Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(endpoint = %target, skipped, "Observer lagged");
                }
            }
        }
    })
    .boxed()
}

/// Publishes one channel's decoded events on the bus.
fn spawn_publisher(
    target: Target,
    mut rx: broadcast::Receiver<Delivery>,
    bus: EventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(Delivery::Frame(frame)) => {
                    let event = TargetEvent::from_frame(&target, &frame);
                    if let Some(error) = event.error_message() {
                        tracing::debug!(endpoint = %target, error = %error, "Error event");
                    }
                    bus.publish(TangoEvent::Subscription(event));
                }
                Ok(Delivery::Terminated(_) | Delivery::Closed) | Err(RecvError::Closed) => return,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(endpoint = %target, skipped, "Event publisher lagged");
                }
            }
        }
    })
}
