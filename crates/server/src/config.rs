//! Server configuration: defaults, an optional TOML file, then CLI flags.

use std::path::Path;

use anyhow::Context;
use blockworld_engine::BlockPos;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind: String,
    /// Terrain seed handed to every client.
    pub seed: u32,
    pub spawn: [f32; 3],
    /// Block updates farther than this (in blocks) from a recipient's last
    /// reported position are not delivered to it.
    pub view_distance: f32,
    /// Minimum time between two snapshot requests from one IP.
    pub snapshot_interval_ms: u64,
    pub update_log_capacity: usize,
    /// Per-connection outbound queue depth. A full queue drops messages.
    pub outbound_queue: usize,
    pub min_y: i32,
    pub max_y: i32,
    /// Largest accepted `|x|` and `|z|`.
    pub horizontal_limit: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
            seed: 12345,
            spawn: [0.5, 50.0, 0.5],
            view_distance: 128.0,
            snapshot_interval_ms: 5_000,
            update_log_capacity: 1_000,
            outbound_queue: 256,
            min_y: 0,
            max_y: 255,
            horizontal_limit: 1_000_000,
        }
    }
}

impl ServerConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Build the effective config from command-line arguments:
    /// `--config <file>` first, then `--bind`, `--seed`, `--view-distance`.
    pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
        let mut config = match flag(args, "--config") {
            Some(path) => Self::load(Path::new(path))?,
            None => Self::default(),
        };
        if let Some(bind) = flag(args, "--bind") {
            config.bind = bind.to_string();
        }
        if let Some(seed) = flag(args, "--seed") {
            config.seed = seed
                .parse()
                .with_context(|| format!("invalid --seed {seed:?}"))?;
        }
        if let Some(distance) = flag(args, "--view-distance") {
            config.view_distance = distance
                .parse()
                .with_context(|| format!("invalid --view-distance {distance:?}"))?;
        }
        Ok(config)
    }

    /// Whether a block position is inside the accepted world volume.
    pub fn in_bounds(&self, pos: BlockPos) -> bool {
        (self.min_y..=self.max_y).contains(&pos.y)
            && pos.x.unsigned_abs() <= self.horizontal_limit.unsigned_abs()
            && pos.z.unsigned_abs() <= self.horizontal_limit.unsigned_abs()
    }
}

/// The value following `name`, if present.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .skip_while(|a| *a != name)
        .nth(1)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::from_args(&args(&[
            "blockworld-server",
            "--seed",
            "42",
            "--bind",
            "127.0.0.1:9000",
        ]))
        .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.update_log_capacity, 1_000);
    }

    #[test]
    fn bad_flag_value_is_an_error() {
        assert!(ServerConfig::from_args(&args(&["x", "--seed", "minus-one"])).is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str("seed = 7\nview_distance = 32.0\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.view_distance, 32.0);
        assert_eq!(config.bind, ServerConfig::default().bind);
    }

    #[test]
    fn bounds() {
        let config = ServerConfig::default();
        assert!(config.in_bounds(BlockPos::new(-1_000_000, 0, 1_000_000)));
        assert!(!config.in_bounds(BlockPos::new(0, -1, 0)));
        assert!(!config.in_bounds(BlockPos::new(0, 256, 0)));
        assert!(!config.in_bounds(BlockPos::new(i32::MIN, 10, 0)));
    }
}
