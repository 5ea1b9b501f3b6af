//! Application state shared across all request handlers.

use orderstream_core::connections::ConnectionRegistry;
use orderstream_core::processors::ChangeLogPoller;
use orderstream_core::store::PgRecordStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// Cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Production record store; also used for health probes.
    pub store: Arc<PgRecordStore>,
    /// Owner of the live WebSocket connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Handle to the change-log poller (running flag for health/stats).
    pub poller: ChangeLogPoller,
}
