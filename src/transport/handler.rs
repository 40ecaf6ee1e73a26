// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message-level endpoint handler.
//!
//! Sits between the I/O thread and user code: decodes inbound frames,
//! correlates responses with waiting `transact` calls by message id,
//! answers KEEPALIVE, and completes the connection handshake from the
//! ConnectionAttemptEvent the reader sends on accept.
//!
//! Dispatch order for an inbound message:
//!
//! 1. KEEPALIVE: acknowledged automatically (configurable) and normally not
//!    forwarded.
//! 2. READER_EVENT_NOTIFICATION carrying a ConnectionAttemptEvent: resolves
//!    the handshake (duplicates are dropped) and is delivered to the
//!    [`LlrpEndpoint`] like any other notification.
//! 3. A message whose id matches a pending transaction completes it.
//! 4. Everything else is delivered to the [`LlrpEndpoint`] as unsolicited.
//!
//! A response arriving after its transaction timed out finds no waiter and
//! takes the unsolicited path rather than being dropped.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::codec::{BinaryDecoder, BinaryEncoder};
use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::message::{FieldValue, Message, Parameter, PropertyValue, TypeId};
use crate::schema::{
    ConnectionAttemptStatus, Registry, MSG_KEEPALIVE, MSG_KEEPALIVE_ACK,
    MSG_READER_EVENT_NOTIFICATION, PARAM_CONNECTION_ATTEMPT_EVENT,
    PARAM_READER_EVENT_NOTIFICATION_DATA, PARAM_UTC_TIMESTAMP,
};
use crate::transport::io_thread::{FrameSink, Transmit};

/// User-facing callbacks for unsolicited traffic.
pub trait LlrpEndpoint: Send + Sync + 'static {
    /// A message that no pending transaction claimed.
    fn message_received(&self, message: Message);

    /// A codec or transport failure on the connection.
    fn error_occurred(&self, error: Error) {
        warn!("endpoint error: {}", error);
    }
}

/// Which side of the connection this handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Client,
    Server,
}

/// One pending transaction: the waiter blocks on the condvar until the
/// dispatcher fills the slot or the deadline passes.
struct ResponseSlot {
    slot: Mutex<Option<Message>>,
    cond: Condvar,
}

impl ResponseSlot {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn fill(&self, message: Message) {
        let mut guard = self.slot.lock();
        *guard = Some(message);
        self.cond.notify_all();
    }

    fn wait(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.slot.lock();
        while guard.is_none() {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return guard.take();
            }
        }
        guard.take()
    }

    fn take(&self) -> Option<Message> {
        self.slot.lock().take()
    }
}

/// Message-level machinery shared by client and server endpoints.
pub struct EndpointHandler {
    registry: Arc<Registry>,
    config: EndpointConfig,
    transmit: Arc<dyn Transmit>,
    endpoint: RwLock<Arc<dyn LlrpEndpoint>>,
    /// Pending transactions keyed by message id.
    pending: DashMap<u32, Arc<ResponseSlot>>,
    /// Handshake result; capacity one, duplicates dropped.
    handshake_tx: Sender<u16>,
    handshake_rx: Receiver<u16>,
    role: Role,
}

impl EndpointHandler {
    pub(crate) fn new(
        registry: Arc<Registry>,
        config: EndpointConfig,
        transmit: Arc<dyn Transmit>,
        endpoint: Arc<dyn LlrpEndpoint>,
        role: Role,
    ) -> Self {
        let (handshake_tx, handshake_rx) = bounded(1);
        Self {
            registry,
            config,
            transmit,
            endpoint: RwLock::new(endpoint),
            pending: DashMap::new(),
            handshake_tx,
            handshake_rx,
            role,
        }
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        BinaryEncoder::new(&self.registry).encode_message(message)
    }

    /// Replace the endpoint callbacks; subsequent traffic goes to `endpoint`.
    pub fn set_endpoint(&self, endpoint: Arc<dyn LlrpEndpoint>) {
        *self.endpoint.write() = endpoint;
    }

    /// The lock is never held across a callback, so a callback may call
    /// `set_endpoint` without deadlocking.
    fn endpoint(&self) -> Arc<dyn LlrpEndpoint> {
        self.endpoint.read().clone()
    }

    /// Fire-and-forget send.
    pub fn send(&self, message: &Message) -> Result<()> {
        let frame = self.encode(message)?;
        self.transmit.transmit(frame)
    }

    /// Send `message` and block until the response with the same message id
    /// arrives, or `timeout` passes.
    ///
    /// The waiter is registered before the frame leaves, so a response
    /// cannot slip past between send and wait.
    pub fn transact(&self, message: &Message, timeout: Duration) -> Result<Message> {
        let desc = self.registry.message_by_id(message.type_id)?;
        if desc.response_type.is_none() {
            return Err(Error::NoResponseExpected(desc.name.to_string()));
        }
        let frame = self.encode(message)?;

        let slot = Arc::new(ResponseSlot::new());
        self.pending.insert(message.message_id, slot.clone());
        if let Err(e) = self.transmit.transmit(frame) {
            self.pending.remove(&message.message_id);
            return Err(e);
        }

        if let Some(response) = slot.wait(timeout) {
            return Ok(response);
        }
        self.pending.remove(&message.message_id);
        // The dispatcher may have filled the slot between the timeout and
        // the removal.
        if let Some(response) = slot.take() {
            return Ok(response);
        }
        Err(Error::Timeout(timeout))
    }

    /// Block until the peer's ConnectionAttemptEvent arrives.
    pub fn await_connection(&self, timeout: Duration) -> Result<()> {
        match self.handshake_rx.recv_timeout(timeout) {
            Ok(status) if status == ConnectionAttemptStatus::Success.value() => Ok(()),
            Ok(status) => Err(Error::ConnectionRefused { status }),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(Error::NotConnected),
        }
    }

    fn handle_message(&self, message: Message) {
        if message.type_id == TypeId::Builtin(MSG_KEEPALIVE) {
            if self.config.keepalive_ack {
                // The ack echoes the request's message id so the reader's
                // transaction correlates.
                let ack = Message::new(TypeId::Builtin(MSG_KEEPALIVE_ACK), message.message_id);
                if let Err(e) = self.send(&ack) {
                    self.endpoint().error_occurred(e);
                }
            }
            if self.config.keepalive_forward {
                self.endpoint().message_received(message);
            }
            return;
        }

        if message.type_id == TypeId::Builtin(MSG_READER_EVENT_NOTIFICATION) {
            if let Some(status) = connection_status(&message) {
                // Capacity one: a repeated handshake event is dropped.
                let _ = self.handshake_tx.try_send(status);
                // Handshake frames carry message id 0 and never match a
                // waiter; the notification is still ordinary reader traffic.
                self.endpoint().message_received(message);
                return;
            }
        }

        if let Some((_, slot)) = self.pending.remove(&message.message_id) {
            slot.fill(message);
            return;
        }

        self.endpoint().message_received(message);
    }

    fn connection_notice_frame(&self, status: ConnectionAttemptStatus) -> Result<Vec<u8>> {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        let mut timestamp = Parameter::new(TypeId::Builtin(PARAM_UTC_TIMESTAMP));
        timestamp.set_field(0, FieldValue::U64(micros));
        let mut event = Parameter::new(TypeId::Builtin(PARAM_CONNECTION_ATTEMPT_EVENT));
        event.set_field(0, FieldValue::U16(status.value()));
        let mut data = Parameter::new(TypeId::Builtin(PARAM_READER_EVENT_NOTIFICATION_DATA));
        data.add_param(0, timestamp);
        data.add_param(1, event);
        let mut message = Message::new(TypeId::Builtin(MSG_READER_EVENT_NOTIFICATION), 0);
        message.add_param(0, data);
        self.encode(&message)
    }
}

impl FrameSink for EndpointHandler {
    fn frame_received(&self, frame: Vec<u8>) {
        match BinaryDecoder::new(&self.registry).decode_message(&frame) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                // No resynchronization marker in the stream: close it.
                self.endpoint().error_occurred(e);
                let _ = self.transmit.close();
            }
        }
    }

    fn connection_closed(&self, reason: Option<String>) {
        debug!(
            "connection closed{}",
            reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
        );
        if reason.is_some() {
            self.endpoint().error_occurred(Error::NotConnected);
        }
    }

    fn transport_error(&self, error: Error) {
        self.endpoint().error_occurred(error);
    }

    fn connection_notice(&self, accepted: bool) -> Option<Vec<u8>> {
        if self.role != Role::Server {
            return None;
        }
        let status = if accepted {
            ConnectionAttemptStatus::Success
        } else {
            ConnectionAttemptStatus::FailedClientExists
        };
        match self.connection_notice_frame(status) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("failed to build connection notice: {}", e);
                None
            }
        }
    }
}

/// Depth-first search for the first parameter of type `type_id`.
pub fn find_parameter(properties: &[PropertyValue], type_id: TypeId) -> Option<&Parameter> {
    for prop in properties {
        if let PropertyValue::Params(params) = prop {
            for param in params {
                if param.type_id == type_id {
                    return Some(param);
                }
                if let Some(found) = find_parameter(&param.properties, type_id) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Extract the status of a ConnectionAttemptEvent, if `message` carries one.
fn connection_status(message: &Message) -> Option<u16> {
    let event = find_parameter(
        &message.properties,
        TypeId::Builtin(PARAM_CONNECTION_ATTEMPT_EVENT),
    )?;
    match event.property(0).as_field() {
        Some(FieldValue::U16(status)) => Some(*status),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::core_registry;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    struct MockTransmit {
        frames: Mutex<Vec<Vec<u8>>>,
        closed: AtomicBool,
    }

    impl MockTransmit {
        fn new() -> Self {
            Self {
                frames: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }
        }

        fn take_frames(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut *self.frames.lock())
        }
    }

    impl Transmit for MockTransmit {
        fn transmit(&self, frame: Vec<u8>) -> crate::error::Result<()> {
            self.frames.lock().push(frame);
            Ok(())
        }

        fn close(&self) -> crate::error::Result<()> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEndpoint {
        messages: Mutex<Vec<Message>>,
        errors: Mutex<Vec<String>>,
    }

    impl LlrpEndpoint for RecordingEndpoint {
        fn message_received(&self, message: Message) {
            self.messages.lock().push(message);
        }

        fn error_occurred(&self, error: Error) {
            self.errors.lock().push(error.to_string());
        }
    }

    fn handler(
        role: Role,
        config: EndpointConfig,
    ) -> (Arc<EndpointHandler>, Arc<MockTransmit>, Arc<RecordingEndpoint>) {
        let transmit = Arc::new(MockTransmit::new());
        let endpoint = Arc::new(RecordingEndpoint::default());
        let h = Arc::new(EndpointHandler::new(
            Arc::new(core_registry()),
            config,
            transmit.clone(),
            endpoint.clone(),
            role,
        ));
        (h, transmit, endpoint)
    }

    fn encode(h: &EndpointHandler, message: &Message) -> Vec<u8> {
        BinaryEncoder::new(&h.registry).encode_message(message).unwrap()
    }

    #[test]
    fn test_keepalive_auto_ack() {
        let (h, transmit, endpoint) = handler(Role::Client, EndpointConfig::default());
        let keepalive = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 77);
        h.frame_received(encode(&h, &keepalive));

        let frames = transmit.take_frames();
        assert_eq!(frames.len(), 1);
        let ack = BinaryDecoder::new(&h.registry).decode_message(&frames[0]).unwrap();
        assert_eq!(ack.type_id, TypeId::Builtin(MSG_KEEPALIVE_ACK));
        assert_eq!(ack.message_id, 77);
        // Not forwarded by default.
        assert!(endpoint.messages.lock().is_empty());
    }

    #[test]
    fn test_keepalive_forward_without_ack() {
        let config = EndpointConfig {
            keepalive_ack: false,
            keepalive_forward: true,
            ..Default::default()
        };
        let (h, transmit, endpoint) = handler(Role::Client, config);
        let keepalive = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 5);
        h.frame_received(encode(&h, &keepalive));

        assert!(transmit.take_frames().is_empty());
        let messages = endpoint.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].type_id, TypeId::Builtin(MSG_KEEPALIVE));
    }

    #[test]
    fn test_transact_correlates_by_message_id() {
        let (h, transmit, _) = handler(Role::Client, EndpointConfig::default());

        let waiter = {
            let h = h.clone();
            thread::spawn(move || {
                let request = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 42);
                h.transact(&request, Duration::from_secs(5))
            })
        };

        // Wait for the request frame to leave, then feed the response.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if !transmit.frames.lock().is_empty() {
                break;
            }
            assert!(Instant::now() < deadline, "request never sent");
            thread::sleep(Duration::from_millis(1));
        }
        let response = Message::new(TypeId::Builtin(MSG_KEEPALIVE_ACK), 42);
        h.frame_received(encode(&h, &response));

        let result = waiter.join().unwrap().unwrap();
        assert_eq!(result.type_id, TypeId::Builtin(MSG_KEEPALIVE_ACK));
        assert_eq!(result.message_id, 42);
        assert!(h.pending.is_empty());
    }

    #[test]
    fn test_transact_timeout_removes_waiter() {
        let (h, _, _) = handler(Role::Client, EndpointConfig::default());
        let request = Message::new(TypeId::Builtin(MSG_KEEPALIVE), 9);
        let err = h.transact(&request, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(h.pending.is_empty());
    }

    #[test]
    fn test_transact_rejects_message_without_response() {
        let (h, _, _) = handler(Role::Client, EndpointConfig::default());
        let ack = Message::new(TypeId::Builtin(MSG_KEEPALIVE_ACK), 1);
        let err = h.transact(&ack, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::NoResponseExpected(name) if name == "KEEPALIVE_ACK"));
    }

    #[test]
    fn test_unclaimed_response_goes_unsolicited() {
        let (h, _, endpoint) = handler(Role::Client, EndpointConfig::default());
        let late = Message::new(TypeId::Builtin(MSG_KEEPALIVE_ACK), 1234);
        h.frame_received(encode(&h, &late));
        let messages = endpoint.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, 1234);
    }

    #[test]
    fn test_handshake_success_and_refusal() {
        let (h, _, endpoint) = handler(Role::Server, EndpointConfig::default());

        let notice = h.connection_notice(true).unwrap();
        h.frame_received(notice);
        h.await_connection(Duration::from_millis(100)).unwrap();

        let refusal = h.connection_notice(false).unwrap();
        h.frame_received(refusal);
        let err = h.await_connection(Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, Error::ConnectionRefused { status: 2 }));

        // Handshake notifications resolve the slot and are still delivered
        // as ordinary reader events.
        let messages = endpoint.messages.lock();
        assert_eq!(messages.len(), 2);
        assert!(messages
            .iter()
            .all(|m| m.type_id == TypeId::Builtin(MSG_READER_EVENT_NOTIFICATION)));
    }

    #[test]
    fn test_client_role_sends_no_notice() {
        let (h, _, _) = handler(Role::Client, EndpointConfig::default());
        assert!(h.connection_notice(true).is_none());
    }

    #[test]
    fn test_decode_failure_closes_connection() {
        let (h, transmit, endpoint) = handler(Role::Client, EndpointConfig::default());
        // Valid framing, bogus message type.
        let frame = [0x04, 0x64, 0x00, 0x00, 0x00, 0x0A, 0, 0, 0, 1];
        h.frame_received(frame.to_vec());
        assert!(transmit.closed.load(Ordering::Relaxed));
        assert_eq!(endpoint.errors.lock().len(), 1);
    }

    #[test]
    fn test_set_endpoint_redirects_traffic() {
        let (h, _, first) = handler(Role::Client, EndpointConfig::default());
        let second = Arc::new(RecordingEndpoint::default());
        h.set_endpoint(second.clone());

        let message = Message::new(TypeId::Builtin(MSG_KEEPALIVE_ACK), 8);
        h.frame_received(encode(&h, &message));
        assert!(first.messages.lock().is_empty());
        assert_eq!(second.messages.lock().len(), 1);
    }

    #[test]
    fn test_find_parameter_searches_nested() {
        let (h, _, _) = handler(Role::Server, EndpointConfig::default());
        let frame = h.connection_notice(true).unwrap();
        let message = BinaryDecoder::new(&h.registry).decode_message(&frame).unwrap();
        let event = find_parameter(
            &message.properties,
            TypeId::Builtin(PARAM_CONNECTION_ATTEMPT_EVENT),
        )
        .unwrap();
        assert_eq!(event.property(0).as_field(), Some(&FieldValue::U16(0)));
        assert!(find_parameter(&message.properties, TypeId::Builtin(999)).is_none());
    }
}
