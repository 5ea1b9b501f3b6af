use crate::connections::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Fixed-period no-op broadcast that keeps idle transports open and
/// prunes dead connections through the usual failed-send path.
pub struct HeartbeatScheduler {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl HeartbeatScheduler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            interval,
            shutdown_rx,
        }
    }

    /// Run until the shutdown signal flips. Send failures are handled
    /// per connection inside the broadcast; the loop always reaches its
    /// next tick.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, "heartbeat scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("heartbeat scheduler received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.interval) => {
                    debug!("sending heartbeat");
                    self.registry.send_heartbeat().await;
                }
            }
        }

        info!("heartbeat scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryRecordStore, MockSink};

    #[tokio::test]
    async fn heartbeats_reach_all_connections_until_shutdown() {
        let store = MemoryRecordStore::new();
        let registry = Arc::new(ConnectionRegistry::new(store));
        let first = MockSink::new();
        let second = MockSink::new();
        registry.connect(first.clone(), "first").await;
        registry.connect(second.clone(), "second").await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler =
            HeartbeatScheduler::new(registry.clone(), Duration::from_millis(10), shutdown_rx);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let first_frames = first.sent_frames().await;
        let second_frames = second.sent_frames().await;
        // Frame 0 is the initial snapshot; at least one heartbeat follows.
        assert!(first_frames.len() >= 2);
        assert!(second_frames.len() >= 2);
        assert_eq!(first_frames[1], second_frames[1]);
        let value: serde_json::Value = serde_json::from_str(&first_frames[1]).unwrap();
        assert_eq!(value["type"], "heartbeat");
    }
}
