// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport metrics.
//!
//! Atomic counters for monitoring endpoint health: connection statistics,
//! message and byte throughput, error counts and backpressure events.
//!
//! # Example
//!
//! ```
//! use llrp::transport::TransportMetrics;
//!
//! let metrics = TransportMetrics::new();
//! metrics.record_connection_established();
//! metrics.record_message_sent(1024);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.connections_established, 1);
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Metrics for one LLRP endpoint.
#[derive(Debug)]
pub struct TransportMetrics {
    /// Number of currently active connections.
    active_connections: AtomicUsize,

    /// Total connections successfully established.
    connections_established: AtomicU64,

    /// Total connection attempts that failed.
    connections_failed: AtomicU64,

    /// Connection attempts refused because a client was already attached.
    connections_refused: AtomicU64,

    /// Total messages sent.
    messages_sent: AtomicU64,

    /// Total messages received.
    messages_received: AtomicU64,

    /// Total bytes sent.
    bytes_sent: AtomicU64,

    /// Total bytes received.
    bytes_received: AtomicU64,

    /// Send errors (connection reset, broken pipe, etc.).
    send_errors: AtomicU64,

    /// Receive errors (framing violations included).
    recv_errors: AtomicU64,

    /// Number of times a send would have blocked.
    send_blocked_count: AtomicU64,

    /// When metrics collection started.
    start_time: Instant,
}

impl TransportMetrics {
    pub fn new() -> Self {
        Self {
            active_connections: AtomicUsize::new(0),
            connections_established: AtomicU64::new(0),
            connections_failed: AtomicU64::new(0),
            connections_refused: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
            send_blocked_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_refused(&self) {
        self.connections_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_message_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_bytes_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_blocked(&self) {
        self.send_blocked_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Take a consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> TransportMetricsSnapshot {
        TransportMetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            connections_refused: self.connections_refused.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            send_blocked_count: self.send_blocked_count.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for TransportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`TransportMetrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportMetricsSnapshot {
    pub active_connections: usize,
    pub connections_established: u64,
    pub connections_failed: u64,
    pub connections_refused: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub recv_errors: u64,
    pub send_blocked_count: u64,
    pub uptime_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let metrics = TransportMetrics::new();
        metrics.record_connection_established();
        metrics.record_message_sent(100);
        metrics.record_message_sent(50);
        metrics.record_message_received(25);
        metrics.record_send_blocked();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.connections_established, 1);
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.bytes_sent, 150);
        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.send_blocked_count, 1);

        metrics.record_connection_closed();
        assert_eq!(metrics.active_connections(), 0);
    }
}
