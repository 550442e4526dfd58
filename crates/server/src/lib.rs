pub mod config;
pub mod hub;
pub mod metrics;
pub mod net;
pub mod rate_limit;
pub mod state;
