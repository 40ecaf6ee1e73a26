// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint configuration.
//!
//! [`EndpointConfig`] carries the tunables shared by [`crate::transport::LlrpClient`]
//! and [`crate::transport::LlrpServer`]. The defaults follow the LLRP
//! standard where it prescribes values (service port 5084) and common
//! deployment practice otherwise.
//!
//! # Example
//!
//! ```
//! use llrp::EndpointConfig;
//! use std::time::Duration;
//!
//! let config = EndpointConfig {
//!     transact_timeout: Duration::from_secs(5),
//!     keepalive_ack: true,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

/// IANA-assigned LLRP service port.
pub const DEFAULT_PORT: u16 = 5084;

/// Default deadline for `transact` and the connection handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum message size (16 MB, anti-OOM protection).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for an LLRP client or server endpoint.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    // === Transactions ===
    /// Deadline applied by `transact` when no explicit timeout is given,
    /// and by the client-side connection handshake.
    pub transact_timeout: Duration,

    // === Keep-alive ===
    /// Automatically answer an inbound KEEPALIVE with KEEPALIVE_ACK.
    pub keepalive_ack: bool,

    /// Also forward inbound KEEPALIVE messages to the endpoint callback.
    pub keepalive_forward: bool,

    // === Framing ===
    /// Maximum accepted message size in bytes.
    ///
    /// A declared frame length above this closes the connection.
    pub max_message_size: usize,

    // === Socket ===
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub nodelay: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            transact_timeout: DEFAULT_TIMEOUT,
            keepalive_ack: true,
            keepalive_forward: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.transact_timeout, Duration::from_secs(10));
        assert!(config.keepalive_ack);
        assert!(!config.keepalive_forward);
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
    }
}
