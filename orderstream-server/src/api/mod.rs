//! HTTP and WebSocket endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` – liveness: store reachability, poller state, connections
//! - `GET /stats`  – connection metadata and recent change volume
//! - `GET /ws`     – real-time order feed

pub mod health;
pub mod stats;
pub mod ws;
