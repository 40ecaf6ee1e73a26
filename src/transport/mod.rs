// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP transport for LLRP endpoints.
//!
//! Layered bottom-up:
//!
//! - [`framer`]: splits the byte stream into complete frames using the
//!   length field every message carries.
//! - [`io_thread`]: mio poll loop owning the sockets; enforces the
//!   one-peer-at-a-time connection model.
//! - [`handler`]: decodes frames, correlates transactions, answers
//!   KEEPALIVE, completes the handshake.
//! - [`client`] / [`server`]: the endpoint facades.

pub mod client;
pub mod framer;
pub mod handler;
pub mod io_thread;
pub mod metrics;
pub mod server;

pub use client::LlrpClient;
pub use framer::StreamFramer;
pub use handler::{find_parameter, EndpointHandler, LlrpEndpoint};
pub use io_thread::{FrameSink, IoSender, IoThread, IoThreadHandle, Transmit};
pub use metrics::{TransportMetrics, TransportMetricsSnapshot};
pub use server::LlrpServer;
