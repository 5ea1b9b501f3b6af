//! In-process notification fan-out.
//!
//! The poller publishes one [`ChangeNotification`] per successfully
//! constructed change-log entry; the bus dispatches it to every
//! registered subscriber concurrently. Notifications are ephemeral and
//! carry the enriched current order state, not a point-in-time snapshot.

pub mod bus;
pub mod types;

pub use bus::{NotificationBus, Subscriber, SubscriberError, SubscriberId};
pub use types::ChangeNotification;
