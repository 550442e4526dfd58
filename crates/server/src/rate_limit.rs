//! Per-address minimum interval for the bulk snapshot endpoint.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Entries older than this many intervals are forgotten on the next prune.
const PRUNE_AFTER_INTERVALS: u32 = 4;
const PRUNE_THRESHOLD: usize = 1024;

pub struct RateLimiter {
    interval: Duration,
    last_seen: DashMap<IpAddr, Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_seen: DashMap::new(),
        }
    }

    /// Admit a request from `ip`, or return how long it must wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        if self.last_seen.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        match self.last_seen.entry(ip) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let elapsed = now.saturating_duration_since(*slot.get());
                if elapsed < self.interval {
                    return Err(self.interval - elapsed);
                }
                slot.insert(now);
                Ok(())
            }
        }
    }

    fn prune(&self, now: Instant) {
        let horizon = self.interval * PRUNE_AFTER_INTERVALS;
        self.last_seen
            .retain(|_, last| now.saturating_duration_since(*last) < horizon);
    }

    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}
