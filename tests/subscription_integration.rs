// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end subscription tests against a wiremock server.
//!
//! The mocked event stream serves a fixed body and then ends, so the
//! session keeps reconnecting and replaying it. Observers therefore see
//! each frame eventually, whichever connection delivered it.

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tango_rest_client::{
    Error, HttpConfig, RetryPolicy, SubscriptionError, SubscriptionRegistry, TangoRestApi, Target,
    TargetEventStream, event_type,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBSCRIPTIONS: &str = "/tango/subscriptions";
const SESSION: &str = "/tango/subscriptions/1";
const EVENT_STREAM: &str = "/tango/subscriptions/1/event-stream";

fn double_scalar() -> Target {
    Target::new("localhost:10000", "sys/tg_test/1", "double_scalar", event_type::CHANGE)
}

fn ampli() -> Target {
    Target::new("localhost:10000", "sys/tg_test/1", "ampli", event_type::CHANGE)
}

fn registry(server: &MockServer) -> SubscriptionRegistry {
    TangoRestApi::connect(HttpConfig::new(server.uri()))
        .unwrap()
        .subscriptions_builder()
        .with_retry_policy(RetryPolicy::fixed(Duration::from_millis(50)))
        .build()
}

fn event_stream(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

async fn mount_session(server: &MockServer, expected_posts: u64) {
    Mock::given(method("POST"))
        .and(path(SUBSCRIPTIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "events": [{"id": "1", "target": double_scalar()}],
            "failures": []
        })))
        .expect(expected_posts)
        .mount(server)
        .await;
}

async fn next_event(events: &mut TargetEventStream) -> tango_rest_client::TargetEvent {
    tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .expect("no event within 5s")
        .expect("stream ended")
        .expect("error event")
}

#[tokio::test]
async fn observe_receives_pushed_event() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(EVENT_STREAM))
        .respond_with(event_stream(
            "event: 1\nid: 1553697634000\ndata: {\"value\":42}\n\n",
        ))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut events = registry.observe(double_scalar()).await.unwrap();

    let event = next_event(&mut events).await;
    assert_eq!(event.target, double_scalar());
    assert_eq!(event.timestamp, 1_553_697_634_000);
    assert_eq!(event.data(), Some(&json!({"value": 42})));

    registry.shutdown().await;
}

#[tokio::test]
async fn concurrent_observers_share_one_registration() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(EVENT_STREAM))
        .respond_with(event_stream("event: 1\nid: 1\ndata: {\"value\":1}\n\n"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let (first, second) = tokio::join!(
        registry.observe(double_scalar()),
        registry.observe(double_scalar())
    );
    let (mut first, mut second) = (first.unwrap(), second.unwrap());

    assert_eq!(next_event(&mut first).await.target, double_scalar());
    assert_eq!(next_event(&mut second).await.target, double_scalar());
    assert_eq!(registry.channel_count(), 1);

    registry.shutdown().await;
}

#[tokio::test]
async fn second_target_is_added_to_the_session() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("PUT"))
        .and(path(SESSION))
        .and(body_json(json!([ampli()])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "target": double_scalar()},
            {"id": "2", "target": ampli()}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENT_STREAM))
        .respond_with(event_stream(concat!(
            "event: 1\nid: 10\ndata: {\"value\":1.5}\n\n",
            "event: 2\nid: 11\ndata: {\"value\":7}\n\n",
        )))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut scalar = registry.observe(double_scalar()).await.unwrap();
    let mut amplitude = registry.observe(ampli()).await.unwrap();

    let event = next_event(&mut amplitude).await;
    assert_eq!(event.target, ampli());
    assert_eq!(event.data(), Some(&json!({"value": 7})));
    assert_eq!(next_event(&mut scalar).await.target, double_scalar());

    let registered = registry.session_events().await;
    assert_eq!(registered.len(), 2);

    registry.shutdown().await;
}

#[tokio::test]
async fn rejected_session_surfaces_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBSCRIPTIONS))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errors": [{
                "reason": "API_SubscriptionsDisabled",
                "description": "subscriptions are disabled",
                "severity": "ERR",
                "origin": "TangoRestServer"
            }],
            "quality": "FAILURE",
            "timestamp": 0
        })))
        .mount(&server)
        .await;

    let err = registry(&server).observe(double_scalar()).await.err().expect("observe should fail");

    match err {
        Error::Subscription(SubscriptionError::SessionOpenFailed { errors, .. }) => {
            assert_eq!(errors[0].reason, "API_SubscriptionsDisabled");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn shutdown_completes_observers() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(EVENT_STREAM))
        .respond_with(event_stream(": keep-alive\n\n"))
        .mount(&server)
        .await;

    let registry = registry(&server);
    let mut events = registry.observe(double_scalar()).await.unwrap();

    registry.shutdown().await;

    let end = tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .unwrap();
    assert!(end.is_none());
    assert!(matches!(
        registry.observe(double_scalar()).await,
        Err(Error::Subscription(SubscriptionError::Closed))
    ));
}
