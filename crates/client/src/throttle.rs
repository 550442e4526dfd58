//! Rate limiting for outgoing movement heartbeats.

use std::time::{Duration, Instant};

use blockworld_protocol::PlayerState;

use crate::config::ThrottleConfig;

/// Lets a heartbeat through only when the player visibly changed and the
/// minimum interval since the last one has passed.
#[derive(Debug, Clone)]
pub struct MovementThrottle {
    config: ThrottleConfig,
    last: Option<(PlayerState, Instant)>,
}

impl MovementThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config, last: None }
    }

    /// Whether `state` should be sent now. A `true` answer records it as the
    /// last sent state.
    pub fn should_send(&mut self, state: &PlayerState, now: Instant) -> bool {
        if let Some((prev, at)) = &self.last {
            let min_interval = Duration::from_millis(self.config.min_interval_ms);
            if now.saturating_duration_since(*at) < min_interval {
                return false;
            }
            if !self.changed(prev, state) {
                return false;
            }
        }
        self.last = Some((*state, now));
        true
    }

    fn changed(&self, prev: &PlayerState, next: &PlayerState) -> bool {
        let moved = prev.position.distance(next.position) > self.config.position_epsilon;
        let turned = (prev.rotation.x - next.rotation.x).abs() > self.config.rotation_epsilon
            || (prev.rotation.y - next.rotation.y).abs() > self.config.rotation_epsilon;
        moved || turned || prev.selected_block != next.selected_block
    }

    /// Forget the last sent state, so the next heartbeat always goes out.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
