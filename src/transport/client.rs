// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client (controller-side) endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::config::EndpointConfig;
use crate::error::Result;
use crate::message::Message;
use crate::schema::Registry;
use crate::transport::handler::{EndpointHandler, LlrpEndpoint, Role};
use crate::transport::io_thread::IoThread;
use crate::transport::io_thread::IoThreadHandle;
use crate::transport::metrics::{TransportMetrics, TransportMetricsSnapshot};

/// A connected LLRP client.
///
/// `connect` completes the full handshake: TCP connect, then waiting for
/// the reader's connection-attempt notification. A returned client is ready
/// to `transact`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use llrp::{EndpointConfig, LlrpClient, LlrpEndpoint, Message};
/// use llrp::schema::core_registry;
///
/// struct Printer;
/// impl LlrpEndpoint for Printer {
///     fn message_received(&self, message: Message) {
///         println!("unsolicited: {:?}", message.type_id);
///     }
/// }
///
/// let client = LlrpClient::connect(
///     "192.168.1.50:5084".parse().unwrap(),
///     Arc::new(core_registry()),
///     EndpointConfig::default(),
///     Arc::new(Printer),
/// ).unwrap();
/// ```
pub struct LlrpClient {
    handler: Arc<EndpointHandler>,
    io: IoThreadHandle,
    metrics: Arc<TransportMetrics>,
    config: EndpointConfig,
}

impl std::fmt::Debug for LlrpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlrpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LlrpClient {
    /// Connect to a reader and wait for its handshake notification.
    pub fn connect(
        addr: SocketAddr,
        registry: Arc<Registry>,
        config: EndpointConfig,
        endpoint: Arc<dyn LlrpEndpoint>,
    ) -> Result<Self> {
        let metrics = Arc::new(TransportMetrics::new());
        let (io_thread, sender, _) = IoThread::new(None, &config, metrics.clone())?;
        let handler = Arc::new(EndpointHandler::new(
            registry,
            config.clone(),
            Arc::new(sender.clone()),
            endpoint,
            Role::Client,
        ));
        let io = io_thread.spawn(sender.clone(), handler.clone())?;

        sender.connect(addr)?;
        handler.await_connection(config.transact_timeout)?;
        info!("connected to reader at {}", addr);

        Ok(Self {
            handler,
            io,
            metrics,
            config,
        })
    }

    /// Send a request and wait for its response, using the configured
    /// timeout.
    pub fn transact(&self, message: &Message) -> Result<Message> {
        self.handler.transact(message, self.config.transact_timeout)
    }

    /// Send a request and wait for its response with an explicit timeout.
    pub fn transact_with_timeout(&self, message: &Message, timeout: Duration) -> Result<Message> {
        self.handler.transact(message, timeout)
    }

    /// Fire-and-forget send.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.handler.send(message)
    }

    /// Swap the callbacks receiving unsolicited traffic.
    pub fn set_endpoint(&self, endpoint: Arc<dyn LlrpEndpoint>) {
        self.handler.set_endpoint(endpoint);
    }

    pub fn metrics(&self) -> TransportMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shut the endpoint down, closing the connection.
    pub fn close(mut self) -> Result<()> {
        self.io.shutdown()
    }
}
