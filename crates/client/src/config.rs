use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use blockworld_engine::WorldConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the HTTP API, e.g. `http://127.0.0.1:3000`.
    pub http_url: String,
    pub ws_url: String,
    /// Terrain seed used until the server reports its own.
    pub seed: u32,
    pub load_radius: i32,
    pub unload_margin: i32,
    pub min_chunk_y: i32,
    pub max_chunk_y: i32,
    pub retry: RetryPolicy,
    pub reconnect_delay_ms: u64,
    pub throttle: ThrottleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            http_url: "http://127.0.0.1:3000".into(),
            ws_url: "ws://127.0.0.1:3000/ws".into(),
            seed: 12345,
            load_radius: world.load_radius,
            unload_margin: world.unload_margin,
            min_chunk_y: world.min_chunk_y,
            max_chunk_y: world.max_chunk_y,
            retry: RetryPolicy::default(),
            reconnect_delay_ms: 3_000,
            throttle: ThrottleConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            load_radius: self.load_radius,
            unload_margin: self.unload_margin,
            min_chunk_y: self.min_chunk_y,
            max_chunk_y: self.max_chunk_y,
        }
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}/api/world-state", self.http_url.trim_end_matches('/'))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Exponential backoff for the snapshot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub min_interval_ms: u64,
    pub position_epsilon: f32,
    /// Radians.
    pub rotation_epsilon: f32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 50,
            position_epsilon: 0.01,
            rotation_epsilon: 0.01,
        }
    }
}
