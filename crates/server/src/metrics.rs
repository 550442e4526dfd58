//! Lock-free server counters.
//!
//! Connection handlers bump these with relaxed atomics; `/api/stats` reads
//! them into a serializable snapshot at its own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;

pub struct Metrics {
    // Monotonic counters
    connections_total: AtomicU64,
    messages_received: AtomicU64,
    malformed_dropped: AtomicU64,
    block_updates_applied: AtomicU64,
    block_updates_rejected: AtomicU64,
    deliveries_filtered: AtomicU64,
    deliveries_dropped: AtomicU64,
    snapshots_served: AtomicU64,
    snapshots_rejected: AtomicU64,

    // Gauges
    connections_open: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            malformed_dropped: AtomicU64::new(0),
            block_updates_applied: AtomicU64::new(0),
            block_updates_rejected: AtomicU64::new(0),
            deliveries_filtered: AtomicU64::new(0),
            deliveries_dropped: AtomicU64::new(0),
            snapshots_served: AtomicU64::new(0),
            snapshots_rejected: AtomicU64::new(0),
            connections_open: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Relaxed);
        self.connections_open.fetch_add(1, Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_open.fetch_sub(1, Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Relaxed);
    }

    pub fn malformed(&self) {
        self.malformed_dropped.fetch_add(1, Relaxed);
    }

    pub fn block_applied(&self) {
        self.block_updates_applied.fetch_add(1, Relaxed);
    }

    pub fn block_rejected(&self) {
        self.block_updates_rejected.fetch_add(1, Relaxed);
    }

    /// Recipients skipped by the distance / connection-time filter.
    pub fn filtered(&self, count: u64) {
        self.deliveries_filtered.fetch_add(count, Relaxed);
    }

    /// Messages lost to a full or closed outbound queue.
    pub fn dropped(&self) {
        self.deliveries_dropped.fetch_add(1, Relaxed);
    }

    pub fn snapshot_served(&self) {
        self.snapshots_served.fetch_add(1, Relaxed);
    }

    pub fn snapshot_rejected(&self) {
        self.snapshots_rejected.fetch_add(1, Relaxed);
    }

    /// Read all counters into a serializable snapshot.
    pub fn snapshot(&self, players: u64, overlay_blocks: u64) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            connections_total: self.connections_total.load(Relaxed),
            connections_open: self.connections_open.load(Relaxed),
            players,
            overlay_blocks,
            messages_received: self.messages_received.load(Relaxed),
            malformed_dropped: self.malformed_dropped.load(Relaxed),
            block_updates_applied: self.block_updates_applied.load(Relaxed),
            block_updates_rejected: self.block_updates_rejected.load(Relaxed),
            deliveries_filtered: self.deliveries_filtered.load(Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Relaxed),
            snapshots_served: self.snapshots_served.load(Relaxed),
            snapshots_rejected: self.snapshots_rejected.load(Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of all counters at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: f64,
    pub connections_total: u64,
    pub connections_open: u64,
    pub players: u64,
    pub overlay_blocks: u64,
    pub messages_received: u64,
    pub malformed_dropped: u64,
    pub block_updates_applied: u64,
    pub block_updates_rejected: u64,
    pub deliveries_filtered: u64,
    pub deliveries_dropped: u64,
    pub snapshots_served: u64,
    pub snapshots_rejected: u64,
}
