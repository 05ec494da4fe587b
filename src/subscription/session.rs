// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server-side subscription resource and its live event stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{PushSource, RetryPolicy};
use crate::error::SubscriptionError;
use crate::protocol::{FrameStream, RestClient};
use crate::types::{Frame, SubscribedEvent, Target, opaque_id};

/// Lifecycle state of a [`SubscriptionSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Created on the server; the event stream is not up yet.
    Connecting,
    /// The event stream is up.
    Ready,
    /// The event stream failed and is being re-established.
    Reconnecting {
        /// Current attempt, starting at 1.
        attempt: u32,
    },
    /// The retry policy was exhausted. The session is unusable.
    Failed(String),
    /// Closed by its owner.
    Closed,
}

impl SessionState {
    /// Returns true if the session can no longer deliver frames.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Closed)
    }
}

/// What a session forwards to an attached listener.
#[derive(Debug, Clone)]
pub(crate) enum Delivery {
    Frame(Frame),
    Terminated(SubscriptionError),
    Closed,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    #[serde(default)]
    events: Vec<SubscribedEvent>,
    #[serde(default)]
    failures: Vec<Value>,
}

#[derive(Debug)]
struct Listener {
    sender: broadcast::Sender<Delivery>,
    pump: JoinHandle<()>,
}

#[derive(Debug)]
struct Wiring {
    source: Arc<PushSource>,
    listeners: HashMap<String, Listener>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    rest: RestClient,
    stream_url: String,
    policy: RetryPolicy,
    events: RwLock<Vec<SubscribedEvent>>,
    failures: Vec<Value>,
    wiring: Mutex<Wiring>,
    state: watch::Sender<SessionState>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    connected: AtomicBool,
    closed: AtomicBool,
}

/// Mirror of one server-side subscription resource.
///
/// A session tracks the targets registered with the server and owns the
/// [`PushSource`] reading the session's event stream. If the stream fails
/// after it was up, a background task rebuilds it according to the
/// session's [`RetryPolicy`] and re-attaches every listener before frames
/// flow again.
///
/// Dropping the session closes it.
#[derive(Debug)]
pub struct SubscriptionSession {
    inner: Arc<SessionInner>,
}

impl SubscriptionSession {
    /// Creates the server-side resource without connecting the event stream.
    ///
    /// `client` is rooted at the subscription API (`{base}/tango`).
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::SessionOpenFailed`] if the server
    /// rejects the request or answers with an unexpected body. Creation is
    /// not retried.
    pub async fn create(
        client: &RestClient,
        initial_targets: &[Target],
        policy: RetryPolicy,
    ) -> Result<Self, SubscriptionError> {
        let response = client
            .request()
            .subscriptions()
            .post(initial_targets)
            .await
            .map_err(|e| SubscriptionError::session_open_failed(&e))?;

        let created: Created =
            serde_json::from_value(response).map_err(|e| SubscriptionError::SessionOpenFailed {
                reason: format!("unexpected subscription response: {e}"),
                errors: Vec::new(),
            })?;

        let session_url = client.request().subscription(&created.id).url();
        let stream_url = format!("{session_url}/event-stream");
        let rest = RestClient::new(session_url, Arc::clone(client.transport()));
        let source = Arc::new(PushSource::new(
            stream_url.clone(),
            Arc::clone(client.transport()),
        ));

        if !created.failures.is_empty() {
            tracing::warn!(
                session = %created.id,
                failures = created.failures.len(),
                "Server rejected some initial targets"
            );
        }
        tracing::info!(session = %created.id, events = created.events.len(), "Subscription session created");

        let (state, _) = watch::channel(SessionState::Connecting);
        Ok(Self {
            inner: Arc::new(SessionInner {
                id: created.id,
                rest,
                stream_url,
                policy,
                events: RwLock::new(created.events),
                failures: created.failures,
                wiring: Mutex::new(Wiring {
                    source,
                    listeners: HashMap::new(),
                }),
                state,
                supervisor: Mutex::new(None),
                connected: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Opens the event stream, retrying per the policy, and starts watching
    /// it for failures.
    ///
    /// Calling it again after a successful connect does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::ReconnectExhausted`] if no attempt
    /// succeeded, in which case the session is [`SessionState::Failed`], or
    /// [`SubscriptionError::Closed`] if the session was closed meanwhile.
    pub async fn connect(&self) -> Result<(), SubscriptionError> {
        if self.inner.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match self.inner.establish(false).await {
            Ok(()) => {
                self.inner.state.send_replace(SessionState::Ready);
                tracing::info!(session = %self.inner.id, "Subscription session ready");
                let supervisor = tokio::spawn(supervise(Arc::downgrade(&self.inner)));
                *self.inner.supervisor.lock() = Some(supervisor);
                Ok(())
            }
            Err(SubscriptionError::Closed) => Err(SubscriptionError::Closed),
            Err(e) => {
                self.inner.terminate(&e);
                Err(e)
            }
        }
    }

    /// Creates the server-side resource and connects its event stream.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`create`](Self::create) and
    /// [`connect`](Self::connect).
    pub async fn open(
        client: &RestClient,
        initial_targets: &[Target],
        policy: RetryPolicy,
    ) -> Result<Self, SubscriptionError> {
        let session = Self::create(client, initial_targets, policy).await?;
        session.connect().await?;
        Ok(session)
    }

    /// Registers one more target with the server.
    ///
    /// The target must not already be registered with this session.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::RegistrationFailed`] if the request fails
    /// or the server's answer does not contain the target.
    pub async fn register_target(&self, target: &Target) -> Result<SubscribedEvent, SubscriptionError> {
        let response = self
            .inner
            .rest
            .request()
            .put(std::slice::from_ref(target))
            .await
            .map_err(|e| {
                tracing::warn!(session = %self.inner.id, endpoint = %target, error = %e, "Target registration failed");
                SubscriptionError::registration_failed(target, &e)
            })?;

        let registered: Vec<SubscribedEvent> = serde_json::from_value(response).map_err(|e| {
            SubscriptionError::RegistrationFailed {
                target: target.clone(),
                reason: format!("unexpected registration response: {e}"),
                errors: Vec::new(),
            }
        })?;

        let Some(event) = registered.into_iter().find(|event| event.matches(target)) else {
            tracing::warn!(session = %self.inner.id, endpoint = %target, "Server did not acknowledge target");
            return Err(SubscriptionError::RegistrationFailed {
                target: target.clone(),
                reason: "server did not acknowledge the target".to_string(),
                errors: Vec::new(),
            });
        };

        tracing::debug!(session = %self.inner.id, event_id = %event.id, endpoint = %target, "Target registered");
        self.inner.events.write().push(event.clone());
        Ok(event)
    }

    /// Returns the registration for `target`, if any.
    #[must_use]
    pub fn find_event(&self, target: &Target) -> Option<SubscribedEvent> {
        self.inner
            .events
            .read()
            .iter()
            .find(|event| event.matches(target))
            .cloned()
    }

    /// Returns every registration of this session.
    #[must_use]
    pub fn events(&self) -> Vec<SubscribedEvent> {
        self.inner.events.read().clone()
    }

    /// Returns the server's descriptions of initial targets it rejected.
    #[must_use]
    pub fn failures(&self) -> &[Value] {
        &self.inner.failures
    }

    /// Returns the server-assigned session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns the session resource URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.inner.rest.url()
    }

    /// Returns the event stream URL.
    #[must_use]
    pub fn stream_url(&self) -> &str {
        &self.inner.stream_url
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Forwards the frames for `event_id` to `sender`, across reconnects.
    pub(crate) fn attach(&self, event_id: &str, sender: broadcast::Sender<Delivery>) {
        let mut wiring = self.inner.wiring.lock();
        let pump = spawn_pump(wiring.source.stream(event_id), sender.clone(), event_id);
        if let Some(previous) = wiring
            .listeners
            .insert(event_id.to_string(), Listener { sender, pump })
        {
            previous.pump.abort();
        }
    }

    /// Stops forwarding frames for `event_id`.
    pub(crate) fn detach(&self, event_id: &str) {
        if let Some(listener) = self.inner.wiring.lock().listeners.remove(event_id) {
            listener.pump.abort();
        }
    }

    /// Closes the event stream. Attached listeners are told the session
    /// closed.
    ///
    /// The server-side resource is left to expire.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl SessionInner {
    fn current_source(&self) -> Arc<PushSource> {
        Arc::clone(&self.wiring.lock().source)
    }

    /// Swaps in a fresh source and moves every listener onto it.
    fn replace_source(&self) -> Arc<PushSource> {
        let mut wiring = self.wiring.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Arc::clone(&wiring.source);
        }

        let source = Arc::new(PushSource::new(
            self.stream_url.clone(),
            Arc::clone(self.rest.transport()),
        ));
        let previous = std::mem::replace(&mut wiring.source, Arc::clone(&source));
        for (event_id, listener) in &mut wiring.listeners {
            listener.pump.abort();
            listener.pump = spawn_pump(source.stream(event_id), listener.sender.clone(), event_id);
        }
        drop(wiring);

        previous.close();
        source
    }

    /// Opens the event stream within the retry policy.
    ///
    /// When `reconnecting`, the current source has failed and every attempt,
    /// including the first, waits its delay and uses a fresh source.
    async fn establish(&self, reconnecting: bool) -> Result<(), SubscriptionError> {
        let mut attempts = 0;
        let mut reason = String::new();

        while self.policy.should_retry(attempts) {
            let retry = if reconnecting { attempts + 1 } else { attempts };
            if retry > 0 {
                tokio::select! {
                    () = tokio::time::sleep(self.policy.delay_for_attempt(retry)) => {}
                    () = self.closing() => return Err(SubscriptionError::Closed),
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(SubscriptionError::Closed);
            }

            attempts += 1;
            let source = if retry == 0 {
                self.current_source()
            } else {
                self.replace_source()
            };
            if reconnecting {
                self.state
                    .send_replace(SessionState::Reconnecting { attempt: attempts });
            }

            match source.open().await {
                Ok(()) => return Ok(()),
                Err(_) if self.closed.load(Ordering::SeqCst) => {
                    return Err(SubscriptionError::Closed);
                }
                Err(e) => {
                    reason = e.to_string();
                    tracing::warn!(
                        session = %self.id,
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Failed to open event stream"
                    );
                }
            }
        }

        Err(SubscriptionError::ReconnectExhausted { attempts, reason })
    }

    /// Resolves once [`close`](Self::close) has run.
    async fn closing(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|state| *state == SessionState::Closed).await;
    }

    /// Marks the session failed and tells every listener.
    fn terminate(&self, error: &SubscriptionError) {
        self.state.send_replace(SessionState::Failed(error.to_string()));
        let wiring = self.wiring.lock();
        for listener in wiring.listeners.values() {
            listener.pump.abort();
            let _ = listener.sender.send(Delivery::Terminated(error.clone()));
        }
        wiring.source.close();
        tracing::error!(session = %self.id, error = %error, "Subscription session failed");
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(supervisor) = self.supervisor.lock().take() {
            supervisor.abort();
        }

        let wiring = self.wiring.lock();
        for listener in wiring.listeners.values() {
            listener.pump.abort();
            let _ = listener.sender.send(Delivery::Closed);
        }
        wiring.source.close();
        drop(wiring);

        self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Failed(_)) {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
        tracing::info!(session = %self.id, "Subscription session closed");
    }
}

fn spawn_pump(
    mut frames: FrameStream,
    sender: broadcast::Sender<Delivery>,
    event_id: &str,
) -> JoinHandle<()> {
    let event_id = event_id.to_string();
    tokio::spawn(async move {
        while let Some(item) = frames.next().await {
            match item {
                Ok(frame) => {
                    let _ = sender.send(Delivery::Frame(frame));
                }
                Err(e) => {
                    tracing::debug!(event_id = %event_id, error = %e, "Frame pump interrupted");
                    return;
                }
            }
        }
    })
}

/// Rebuilds the event stream whenever it fails, until the policy gives up.
async fn supervise(session: Weak<SessionInner>) {
    loop {
        let Some(source) = session.upgrade().map(|inner| inner.current_source()) else {
            return;
        };
        let Some(reason) = source.failed().await else {
            return;
        };
        drop(source);

        let Some(inner) = session.upgrade() else {
            return;
        };
        if inner.closed.load(Ordering::SeqCst) {
            return;
        }
        tracing::warn!(session = %inner.id, error = %reason, "Event stream lost, reconnecting");

        match inner.establish(true).await {
            Ok(()) => {
                inner.state.send_replace(SessionState::Ready);
                tracing::info!(session = %inner.id, "Event stream re-established");
            }
            Err(SubscriptionError::Closed) => return,
            Err(e) => {
                inner.terminate(&e);
                return;
            }
        }
    }
}
