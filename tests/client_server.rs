// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end client/server tests over loopback TCP.
//!
//! Every test binds its server to port 0 so tests can run in parallel
//! without colliding.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use llrp::schema::{
    register_core_types, FieldDescriptor, FieldKind, PropertyDescriptor, RegistryBuilder,
    TypeDescriptor, MSG_KEEPALIVE, MSG_KEEPALIVE_ACK, MSG_READER_EVENT_NOTIFICATION,
    PARAM_UTC_TIMESTAMP,
};
use llrp::{
    EndpointConfig, Error, FieldValue, LlrpClient, LlrpEndpoint, LlrpServer, Message, Parameter,
    Registry, TypeId,
};

const MSG_PING: u16 = 300;
const MSG_PING_ACK: u16 = 301;

/// Core types plus a request/response pair for transaction tests.
fn test_registry() -> Arc<Registry> {
    let mut builder = RegistryBuilder::new();
    register_core_types(&mut builder).unwrap();
    builder
        .register_message(
            TypeDescriptor::new("PING", TypeId::Builtin(MSG_PING))
                .property(PropertyDescriptor::field(FieldDescriptor::new(
                    "Value",
                    FieldKind::U32,
                )))
                .response_type(TypeId::Builtin(MSG_PING_ACK)),
        )
        .unwrap();
    builder
        .register_message(
            TypeDescriptor::new("PING_ACK", TypeId::Builtin(MSG_PING_ACK)).property(
                PropertyDescriptor::field(FieldDescriptor::new("Value", FieldKind::U32)),
            ),
        )
        .unwrap();
    Arc::new(builder.build())
}

/// Endpoint that records everything it is handed.
#[derive(Default)]
struct Collector {
    messages: Mutex<Vec<Message>>,
    errors: Mutex<Vec<String>>,
}

impl Collector {
    fn wait_for_message<F>(&self, mut pred: F, timeout: Duration) -> Option<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(m) = self.messages.lock().unwrap().iter().find(|m| pred(m)) {
                return Some(m.clone());
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

impl LlrpEndpoint for Collector {
    fn message_received(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    fn error_occurred(&self, error: Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

struct Rig {
    server: LlrpServer,
    server_side: Arc<Collector>,
    client: LlrpClient,
    client_side: Arc<Collector>,
    registry: Arc<Registry>,
}

fn rig(config: EndpointConfig) -> Rig {
    let registry = test_registry();
    let server_side = Arc::new(Collector::default());
    let server = LlrpServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        registry.clone(),
        config.clone(),
        server_side.clone(),
    )
    .unwrap();

    let client_side = Arc::new(Collector::default());
    let client = LlrpClient::connect(
        server.local_addr(),
        registry.clone(),
        config,
        client_side.clone(),
    )
    .unwrap();

    Rig {
        server,
        server_side,
        client,
        client_side,
        registry,
    }
}

#[test]
fn handshake_completes_and_keepalive_round_trips() {
    let rig = rig(EndpointConfig::default());

    // A reader (server) keepalive is acknowledged automatically by the
    // client with the same message id.
    let keepalive = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 11);
    let ack = rig.server.transact(&keepalive).unwrap();
    assert_eq!(ack.type_id, TypeId::Builtin(MSG_KEEPALIVE_ACK));
    assert_eq!(ack.message_id, 11);

    // The success notification from the handshake reaches the client
    // application as an ordinary reader event.
    rig.client_side
        .wait_for_message(
            |m| m.type_id == TypeId::Builtin(MSG_READER_EVENT_NOTIFICATION),
            Duration::from_secs(5),
        )
        .expect("connection notification never delivered");

    // The keepalive itself was not surfaced to the client application.
    assert!(rig
        .client_side
        .messages
        .lock()
        .unwrap()
        .iter()
        .all(|m| m.type_id != TypeId::Builtin(MSG_KEEPALIVE)));
}

#[test]
fn second_client_is_refused() {
    let rig = rig(EndpointConfig::default());

    let config = EndpointConfig {
        transact_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let extra = Arc::new(Collector::default());
    let err = LlrpClient::connect(
        rig.server.local_addr(),
        rig.registry.clone(),
        config,
        extra,
    )
    .unwrap_err();
    assert!(
        matches!(err, Error::ConnectionRefused { status: 2 }),
        "unexpected error: {}",
        err
    );

    // The original client is unaffected.
    let keepalive = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 1);
    rig.server.transact(&keepalive).unwrap();
}

#[test]
fn client_transaction_round_trips_through_server() {
    let rig = rig(EndpointConfig::default());

    let waiter = {
        let mut ping = Message::new(TypeId::Builtin(MSG_PING), 7);
        ping.set_field(0, FieldValue::U32(0xC0FFEE));
        let client = rig.client;
        thread::spawn(move || {
            let response = client.transact(&ping).unwrap();
            (client, response)
        })
    };

    // Server application answers the request, echoing the message id.
    let request = rig
        .server_side
        .wait_for_message(
            |m| m.type_id == TypeId::Builtin(MSG_PING),
            Duration::from_secs(5),
        )
        .expect("server never saw the request");
    assert_eq!(request.property(0).as_field(), Some(&FieldValue::U32(0xC0FFEE)));

    let mut reply = Message::new(TypeId::Builtin(MSG_PING_ACK), request.message_id);
    reply.set_field(0, FieldValue::U32(0xC0FFEE + 1));
    rig.server.send(&reply).unwrap();

    let (_client, response) = waiter.join().unwrap();
    assert_eq!(response.type_id, TypeId::Builtin(MSG_PING_ACK));
    assert_eq!(response.message_id, 7);
    assert_eq!(response.property(0).as_field(), Some(&FieldValue::U32(0xC0FFEF)));
}

#[test]
fn transaction_times_out_when_peer_stays_silent() {
    let rig = rig(EndpointConfig::default());

    let mut ping = Message::new(TypeId::Builtin(MSG_PING), 3);
    ping.set_field(0, FieldValue::U32(1));
    let err = rig
        .client
        .transact_with_timeout(&ping, Duration::from_millis(50))
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    // A late reply takes the unsolicited path instead of vanishing.
    let mut reply = Message::new(TypeId::Builtin(MSG_PING_ACK), 3);
    reply.set_field(0, FieldValue::U32(2));
    rig.server.send(&reply).unwrap();
    let late = rig
        .client_side
        .wait_for_message(
            |m| m.type_id == TypeId::Builtin(MSG_PING_ACK),
            Duration::from_secs(5),
        )
        .expect("late response was dropped");
    assert_eq!(late.message_id, 3);
}

#[test]
fn unsolicited_notification_reaches_client_endpoint() {
    let rig = rig(EndpointConfig::default());

    // A notification without a ConnectionAttemptEvent is ordinary reader
    // traffic, not handshake machinery.
    let mut timestamp = Parameter::new(TypeId::Builtin(PARAM_UTC_TIMESTAMP));
    timestamp.set_field(0, FieldValue::U64(1_700_000_000_000_000));
    let mut data = Parameter::new(TypeId::Builtin(246));
    data.add_param(0, timestamp);
    let mut notification = Message::new(TypeId::Builtin(MSG_READER_EVENT_NOTIFICATION), 90);
    notification.add_param(0, data);

    rig.server.send(&notification).unwrap();
    // Match on the message id: the handshake notification (id 0) also
    // reaches this endpoint.
    let received = rig
        .client_side
        .wait_for_message(|m| m.message_id == 90, Duration::from_secs(5))
        .expect("notification never arrived");
    assert_eq!(received, notification);
}

#[test]
fn server_reconnect_after_client_close() {
    let rig = rig(EndpointConfig::default());
    let registry = rig.registry.clone();
    let addr = rig.server.local_addr();

    rig.client.close().unwrap();

    // The slot frees up once the server notices the close; a fresh client
    // can then attach.
    let deadline = Instant::now() + Duration::from_secs(5);
    let replacement = loop {
        let endpoint = Arc::new(Collector::default());
        match LlrpClient::connect(
            addr,
            registry.clone(),
            EndpointConfig::default(),
            endpoint,
        ) {
            Ok(client) => break client,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
            Err(e) => panic!("reconnect failed: {}", e),
        }
    };

    let keepalive = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 2);
    let ack = rig.server.transact(&keepalive).unwrap();
    assert_eq!(ack.message_id, 2);
    drop(replacement);
}

#[test]
fn metrics_reflect_traffic() {
    let rig = rig(EndpointConfig::default());

    let keepalive = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 1);
    rig.server.transact(&keepalive).unwrap();

    let server_metrics = rig.server.metrics();
    assert_eq!(server_metrics.active_connections, 1);
    assert!(server_metrics.messages_sent >= 2); // handshake notice + keepalive
    assert!(server_metrics.messages_received >= 1);

    let client_metrics = rig.client.metrics();
    assert!(client_metrics.messages_received >= 2); // notice + keepalive
}
