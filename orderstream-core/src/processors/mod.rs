//! Long-lived pipeline tasks.
//!
//! - `ChangeLogPoller`: claims unprocessed change-log entries and drives
//!   enrichment and fan-out
//! - `OrderEnricher`: attaches the current order state to a change
//! - `HeartbeatScheduler`: periodic no-op broadcast that keeps idle
//!   transports open and prunes dead connections

pub mod change_poller;
pub mod enricher;
pub mod heartbeat;

pub use change_poller::{ChangeLogPoller, ProcessError};
pub use enricher::OrderEnricher;
pub use heartbeat::HeartbeatScheduler;
