// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory [`Transport`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::{ErrorEnvelope, ProtocolError, Result};
use crate::protocol::{FrameStream, Transport};
use crate::types::Frame;

type StreamItem = std::result::Result<Frame, ProtocolError>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Debug)]
enum ScriptedStream {
    Accept(mpsc::UnboundedReceiver<StreamItem>),
    Refuse(String),
}

/// Server side of an accepted event stream.
#[derive(Debug)]
pub(crate) struct StreamHandle {
    sender: mpsc::UnboundedSender<StreamItem>,
}

impl StreamHandle {
    pub fn send(&self, frame: Frame) {
        let _ = self.sender.send(Ok(frame));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self
            .sender
            .send(Err(ProtocolError::ConnectionFailed(reason.to_string())));
    }
}

/// Transport answering from scripted responses.
///
/// The last scripted response for a `(method, url)` pair is repeated once
/// the earlier ones are used up. Event stream connections consume scripted
/// streams in order and are refused once none are left.
#[derive(Debug)]
pub(crate) struct MockTransport {
    responses: Mutex<HashMap<(Method, String), VecDeque<std::result::Result<Value, ErrorEnvelope>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
    connects: watch::Sender<usize>,
    latency: Mutex<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            streams: Mutex::new(VecDeque::new()),
            connects: watch::channel(0).0,
            latency: Mutex::new(Duration::ZERO),
        }
    }

    pub fn respond(&self, method: Method, url: &str, value: Value) {
        self.script(method, url, Ok(value));
    }

    pub fn respond_error(&self, method: Method, url: &str, envelope: ErrorEnvelope) {
        self.script(method, url, Err(envelope));
    }

    fn script(&self, method: Method, url: &str, response: std::result::Result<Value, ErrorEnvelope>) {
        self.responses
            .lock()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Delays every request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn accept_stream(&self) -> StreamHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.streams.lock().push_back(ScriptedStream::Accept(receiver));
        StreamHandle { sender }
    }

    pub fn refuse_stream(&self, reason: &str) {
        self.streams
            .lock()
            .push_back(ScriptedStream::Refuse(reason.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: &Method, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == *method && r.url == url)
            .count()
    }

    pub fn stream_connects(&self) -> usize {
        *self.connects.borrow()
    }

    /// Waits until `count` event stream connections have been attempted.
    pub async fn wait_for_connects(&self, count: usize) {
        let mut rx = self.connects.subscribe();
        let _ = rx.wait_for(|connects| *connects >= count).await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        self.requests.lock().push(RecordedRequest {
            method: method.clone(),
            url: url.to_string(),
            body: body.cloned(),
        });

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let response = {
            let mut responses = self.responses.lock();
            match responses.get_mut(&(method, url.to_string())) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(envelope)) => Err(ProtocolError::Api(envelope).into()),
            None => Err(ProtocolError::Api(ErrorEnvelope::single("404", "Not Found", url)).into()),
        }
    }

    async fn event_stream(&self, _url: &str) -> std::result::Result<FrameStream, ProtocolError> {
        self.connects.send_modify(|connects| *connects += 1);
        let scripted = self.streams.lock().pop_front();
        match scripted {
            Some(ScriptedStream::Accept(receiver)) => Ok(stream::unfold(receiver, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(ScriptedStream::Refuse(reason)) => Err(ProtocolError::ConnectionFailed(reason)),
            None => Err(ProtocolError::ConnectionFailed(
                "no event stream scripted".to_string(),
            )),
        }
    }
}
