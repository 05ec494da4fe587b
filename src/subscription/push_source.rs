// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single live event stream connection, demultiplexed by event id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::ProtocolError;
use crate::protocol::{FrameStream, Transport};
use crate::types::Frame;

/// Buffered signals per receiver before a slow stream starts lagging.
const SIGNAL_CAPACITY: usize = 1024;

/// Connection state of a [`PushSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not opened yet, or closed by its owner.
    Closed,
    /// The connection handshake is in progress.
    Connecting,
    /// The server accepted the connection; frames are flowing.
    Open,
    /// The connection failed. The source cannot be reopened.
    Errored(String),
}

impl ConnectionState {
    /// Returns true if frames are flowing.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if the connection failed.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored(_))
    }
}

#[derive(Debug, Clone)]
enum Signal {
    Frame(Frame),
    Failed(String),
    Closed,
}

/// Owns one live event stream connection.
///
/// Frames are fanned out to every [`stream`](Self::stream) created for
/// their event id. A source is single-use: once it has errored, its owner
/// closes it and builds a new one.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use tango_rest_client::protocol::HttpClient;
/// use tango_rest_client::subscription::PushSource;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = PushSource::new(
///     "http://localhost:10001/tango/subscriptions/1/event-stream",
///     Arc::new(HttpClient::new()?),
/// );
/// let mut frames = source.stream("3");
/// source.open().await?;
///
/// while let Some(frame) = frames.next().await {
///     println!("{:?}", frame?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PushSource {
    url: String,
    transport: Arc<dyn Transport>,
    signals: broadcast::Sender<Signal>,
    state: Arc<watch::Sender<ConnectionState>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PushSource {
    /// Creates a source for the event stream at `url`. Nothing is sent
    /// until [`open`](Self::open) is called.
    #[must_use]
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            url: url.into(),
            transport,
            signals,
            state: Arc::new(state),
            reader: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the event stream URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connects and waits for the server to accept the stream.
    ///
    /// No frame is delivered before this returns `Ok`. A failure after the
    /// connection is up is reported through [`state`](Self::state) and to
    /// every active [`stream`](Self::stream).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ConnectionFailed`] if the connection is
    /// refused, if the source was already opened, or if it is closed
    /// before the handshake completes.
    pub async fn open(&self) -> Result<(), ProtocolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionFailed(
                "push source is closed".to_string(),
            ));
        }

        let mut changes = self.state.subscribe();
        {
            let mut reader = self.reader.lock();
            if reader.is_some() {
                return Err(ProtocolError::ConnectionFailed(
                    "push source was already opened".to_string(),
                ));
            }
            self.state.send_replace(ConnectionState::Connecting);
            *reader = Some(tokio::spawn(read_frames(
                Arc::clone(&self.transport),
                self.url.clone(),
                self.signals.clone(),
                Arc::clone(&self.state),
            )));
        }

        let settled = changes
            .wait_for(|state| !matches!(state, ConnectionState::Connecting))
            .await
            .map(|state| state.clone())
            .map_err(|_| ProtocolError::ConnectionFailed("push source dropped".to_string()))?;

        match settled {
            ConnectionState::Open => Ok(()),
            ConnectionState::Errored(reason) => Err(ProtocolError::ConnectionFailed(reason)),
            ConnectionState::Closed | ConnectionState::Connecting => Err(
                ProtocolError::ConnectionFailed("push source closed while opening".to_string()),
            ),
        }
    }

    /// Returns the frames typed with `event_id`.
    ///
    /// Every call gets its own stream and sees every frame for that id that
    /// arrives after the call. The stream ends when the source is closed, or
    /// yields one error and ends when the connection fails.
    pub fn stream(&self, event_id: &str) -> FrameStream {
        if self.closed.load(Ordering::SeqCst) {
            return stream::empty().boxed();
        }

        let rx = self.signals.subscribe();
        let errored = match &*self.state.borrow() {
            ConnectionState::Errored(reason) => Some(reason.clone()),
            _ => None,
        };
        if let Some(reason) = errored {
            return stream::once(async move { Err(ProtocolError::ConnectionFailed(reason)) })
                .boxed();
        }

        let state = (Some(rx), event_id.to_string());
        stream::unfold(state, |(rx, event_id)| async move {
            let mut rx = rx?;
            loop {
                match rx.recv().await {
                    Ok(Signal::Frame(frame)) if frame.id == event_id => {
                        return Some((Ok(frame), (Some(rx), event_id)));
                    }
                    Ok(Signal::Frame(_)) => {}
                    Ok(Signal::Failed(reason)) => {
                        return Some((Err(ProtocolError::ConnectionFailed(reason)), (None, event_id)));
                    }
                    Ok(Signal::Closed) | Err(RecvError::Closed) => return None,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(event_id = %event_id, skipped, "Event stream subscriber lagged");
                    }
                }
            }
        })
        .boxed()
    }

    /// Waits until the connection fails and returns the reason.
    ///
    /// Returns `None` once the source is closed instead.
    pub async fn failed(&self) -> Option<String> {
        let mut changes = self.state.subscribe();
        let state = changes
            .wait_for(|state| state.is_errored() || self.closed.load(Ordering::SeqCst))
            .await
            .ok()?
            .clone();
        match state {
            ConnectionState::Errored(reason) => Some(reason),
            _ => None,
        }
    }

    /// Closes the connection. Active streams end without an error.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.state.send_replace(ConnectionState::Closed);
        let _ = self.signals.send(Signal::Closed);
        tracing::debug!(url = %self.url, "Push source closed");
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for PushSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reads the connection until it fails or the source is closed.
async fn read_frames(
    transport: Arc<dyn Transport>,
    url: String,
    signals: broadcast::Sender<Signal>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    let mut frames = match transport.event_stream(&url).await {
        Ok(frames) => frames,
        Err(e) => {
            fail(&url, &signals, &state, e.to_string());
            return;
        }
    };

    let opened = state.send_if_modified(|current| {
        if *current == ConnectionState::Connecting {
            *current = ConnectionState::Open;
            true
        } else {
            false
        }
    });
    if !opened {
        return;
    }
    tracing::info!(url = %url, "Event stream open");

    while let Some(item) = frames.next().await {
        match item {
            Ok(frame) => {
                tracing::debug!(event_id = %frame.id, last_event_id = %frame.last_event_id, "Received frame");
                let _ = signals.send(Signal::Frame(frame));
            }
            Err(e) => {
                fail(&url, &signals, &state, e.to_string());
                return;
            }
        }
    }
    fail(&url, &signals, &state, "event stream ended by server".to_string());
}

fn fail(
    url: &str,
    signals: &broadcast::Sender<Signal>,
    state: &watch::Sender<ConnectionState>,
    reason: String,
) {
    let failed = state.send_if_modified(|current| {
        if *current == ConnectionState::Closed {
            false
        } else {
            *current = ConnectionState::Errored(reason.clone());
            true
        }
    });
    if failed {
        tracing::warn!(url = %url, error = %reason, "Event stream failed");
        let _ = signals.send(Signal::Failed(reason));
    }
}
