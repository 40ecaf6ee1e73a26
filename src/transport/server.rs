// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server (reader-side) endpoint.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::schema::Registry;
use crate::transport::handler::{EndpointHandler, LlrpEndpoint, Role};
use crate::transport::io_thread::{IoThread, IoThreadHandle};
use crate::transport::metrics::{TransportMetrics, TransportMetricsSnapshot};

/// A listening LLRP reader endpoint.
///
/// Accepts at most one client at a time. The first connection receives a
/// timestamped READER_EVENT_NOTIFICATION with a successful
/// ConnectionAttemptEvent; while it is attached, further connections are
/// sent a refusal notification and closed.
///
/// Binding to port 0 picks an ephemeral port; [`LlrpServer::local_addr`]
/// reports the actual address.
pub struct LlrpServer {
    handler: Arc<EndpointHandler>,
    io: IoThreadHandle,
    metrics: Arc<TransportMetrics>,
    config: EndpointConfig,
    local_addr: SocketAddr,
}

impl LlrpServer {
    /// Bind and start accepting connections.
    pub fn bind(
        addr: SocketAddr,
        registry: Arc<Registry>,
        config: EndpointConfig,
        endpoint: Arc<dyn LlrpEndpoint>,
    ) -> Result<Self> {
        let metrics = Arc::new(TransportMetrics::new());
        let (io_thread, sender, local_addr) = IoThread::new(Some(addr), &config, metrics.clone())?;
        let local_addr = local_addr
            .ok_or_else(|| Error::Io(io::Error::other("listener address unavailable")))?;
        let handler = Arc::new(EndpointHandler::new(
            registry,
            config.clone(),
            Arc::new(sender.clone()),
            endpoint,
            Role::Server,
        ));
        let io = io_thread.spawn(sender, handler.clone())?;
        info!("listening for LLRP connections on {}", local_addr);

        Ok(Self {
            handler,
            io,
            metrics,
            config,
            local_addr,
        })
    }

    /// The bound listener address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a request to the attached client and wait for its response.
    ///
    /// Readers use this for KEEPALIVE, which expects KEEPALIVE_ACK.
    pub fn transact(&self, message: &Message) -> Result<Message> {
        self.handler.transact(message, self.config.transact_timeout)
    }

    /// Send a request with an explicit timeout.
    pub fn transact_with_timeout(&self, message: &Message, timeout: Duration) -> Result<Message> {
        self.handler.transact(message, timeout)
    }

    /// Fire-and-forget send to the attached client.
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

    /// Shut the endpoint down, dropping any attached client.
    pub fn close(mut self) -> Result<()> {
        self.io.shutdown()
    }
}
