// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Station statistics

// Use AtomicU64 on 64-bit, AtomicU32 on 32-bit (ESP32, etc.)
#[cfg(not(target_pointer_width = "64"))]
use std::sync::atomic::AtomicU32 as AtomicCounter;
#[cfg(target_pointer_width = "64")]
use std::sync::atomic::AtomicU64 as AtomicCounter;

#[cfg(target_pointer_width = "64")]
type CounterValue = u64;
#[cfg(not(target_pointer_width = "64"))]
type CounterValue = u32;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use dcsi_core::RouterStats;

/// Network front-end statistics
#[derive(Debug)]
pub struct StationStats {
    /// Client connections accepted
    pub accepted: AtomicCounter,
    /// Client connections refused (table full)
    pub refused: AtomicCounter,
    /// Client connections closed
    pub closed: AtomicCounter,
    /// Bytes read from clients
    pub rx_bytes: AtomicCounter,
    /// Bytes written to clients
    pub tx_bytes: AtomicCounter,
    /// Tokens handed to the router
    pub tokens_enqueued: AtomicCounter,
    /// Tokens dropped (unsupported grammar or router full)
    pub tokens_dropped: AtomicCounter,
    /// Reply and diagnostic texts written to clients
    pub delivered: AtomicCounter,
    /// Deliveries to clients that were gone
    pub undeliverable: AtomicCounter,
    /// HTTP requests answered
    pub http_requests: AtomicCounter,
    /// Reads rejected as malformed content
    pub malformed: AtomicCounter,
    /// Start time
    start_time: Instant,
}

impl StationStats {
    /// Create new statistics tracker
    pub fn new() -> Self {
        Self {
            accepted: AtomicCounter::new(0),
            refused: AtomicCounter::new(0),
            closed: AtomicCounter::new(0),
            rx_bytes: AtomicCounter::new(0),
            tx_bytes: AtomicCounter::new(0),
            tokens_enqueued: AtomicCounter::new(0),
            tokens_dropped: AtomicCounter::new(0),
            delivered: AtomicCounter::new(0),
            undeliverable: AtomicCounter::new(0),
            http_requests: AtomicCounter::new(0),
            malformed: AtomicCounter::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an accepted connection
    pub fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a refused connection
    pub fn record_refuse(&self) {
        self.refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed connection
    pub fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes read from a client
    pub fn record_rx(&self, bytes: usize) {
        self.rx_bytes
            .fetch_add(bytes as CounterValue, Ordering::Relaxed);
    }

    /// Record text written to a client
    pub fn record_delivery(&self, bytes: usize) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes
            .fetch_add(bytes as CounterValue, Ordering::Relaxed);
    }

    /// Record a delivery to a vanished client
    pub fn record_undeliverable(&self) {
        self.undeliverable.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a token handed to the router
    pub fn record_token(&self) {
        self.tokens_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped token
    pub fn record_token_drop(&self) {
        self.tokens_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered HTTP request
    pub fn record_http(&self, bytes: usize) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes
            .fetch_add(bytes as CounterValue, Ordering::Relaxed);
    }

    /// Record malformed client content
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get snapshot of all stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            refused: self.refused.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tokens_enqueued: self.tokens_enqueued.load(Ordering::Relaxed),
            tokens_dropped: self.tokens_dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            undeliverable: self.undeliverable.load(Ordering::Relaxed),
            http_requests: self.http_requests.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format front-end and router stats as one report
    pub fn format_summary(&self, router: &RouterStats) -> String {
        let snap = self.snapshot();
        format!(
            "Station Stats (uptime: {}s)\n\
             Clients: accepted={}, refused={}, closed={}\n\
             Traffic: RX {} bytes, TX {} bytes, {} tokens in, {} delivered, {} http\n\
             Router:  enqueued={}, received={}, dispatched={}, transmitted={}\n\
             Drops:   tokens={}, undeliverable={}, malformed={}, pool={}, queue={}, \
             self_origin={}, unsupported={}, codec={}, link={}",
            snap.uptime_secs,
            snap.accepted,
            snap.refused,
            snap.closed,
            snap.rx_bytes,
            snap.tx_bytes,
            snap.tokens_enqueued,
            snap.delivered,
            snap.http_requests,
            router.enqueued,
            router.received,
            router.dispatched,
            router.transmitted,
            snap.tokens_dropped,
            snap.undeliverable,
            snap.malformed,
            router.pool_drops,
            router.queue_drops,
            router.self_origin,
            router.unsupported,
            router.codec_errors,
            router.link_errors
        )
    }
}

impl Default for StationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics snapshot (immutable copy of current stats)
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Client connections accepted
    pub accepted: CounterValue,
    /// Client connections refused
    pub refused: CounterValue,
    /// Client connections closed
    pub closed: CounterValue,
    /// Bytes read from clients
    pub rx_bytes: CounterValue,
    /// Bytes written to clients
    pub tx_bytes: CounterValue,
    /// Tokens handed to the router
    pub tokens_enqueued: CounterValue,
    /// Tokens dropped
    pub tokens_dropped: CounterValue,
    /// Texts written to clients
    pub delivered: CounterValue,
    /// Deliveries to vanished clients
    pub undeliverable: CounterValue,
    /// HTTP requests answered
    pub http_requests: CounterValue,
    /// Malformed reads
    pub malformed: CounterValue,
    /// Uptime in seconds
    pub uptime_secs: u64,
}
