//! Client-facing wire protocol for the orderstream real-time feed.
//!
//! Dashboard clients and integration tests consume these types; the
//! server serializes them onto the WebSocket transport.

pub mod objects;
