//! Headless client for the blockworld server.
//!
//! [`state::ClientState`] holds the local world and reconciles it with server
//! messages; [`session::Session`] drives it over a WebSocket and the HTTP
//! snapshot endpoint. A renderer reads the shared state between turns.

pub mod bootstrap;
pub mod config;
pub mod session;
pub mod state;
pub mod throttle;
