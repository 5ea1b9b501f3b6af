use crate::entities::{ChangeParseError, ChangeRow, OrderChange};
use crate::events::{ChangeNotification, NotificationBus};
use crate::processors::OrderEnricher;
use crate::store::{ChangeLogStore, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Maximum change-log entries claimed per poll cycle.
pub const POLL_BATCH_SIZE: i64 = 100;

/// Pause after a cycle-level store failure before retrying.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Why a single change-log row could not be turned into a notification.
/// The row stays unclaimed and is retried on the next poll.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Parse(#[from] ChangeParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Polls the change log on a fixed interval and drives enrichment and
/// fan-out.
///
/// The processed flag on each entry is the pipeline's only durable
/// progress marker: an entry is claimed once its notification has been
/// constructed, regardless of how delivery went. Claim order follows
/// the batch query ordering `(changed_at ASC, id ASC)`; no ordering
/// holds across batches.
#[derive(Clone)]
pub struct ChangeLogPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    change_log: Arc<dyn ChangeLogStore>,
    enricher: OrderEnricher,
    bus: NotificationBus,
    poll_interval: Duration,
    running: AtomicBool,
    task: Mutex<Option<PollTask>>,
}

struct PollTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ChangeLogPoller {
    pub fn new(
        change_log: Arc<dyn ChangeLogStore>,
        enricher: OrderEnricher,
        bus: NotificationBus,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                change_log,
                enricher,
                bus,
                poll_interval,
                running: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the poll loop. Calling this while the loop is already
    /// running is a logged no-op.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            warn!("change log poller is already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.poll_loop(shutdown_rx).await;
        });
        self.inner.running.store(true, Ordering::SeqCst);
        *task = Some(PollTask {
            shutdown_tx,
            handle,
        });
        info!("change log poller started");
    }

    /// Request cooperative termination and wait for the loop to exit.
    /// An in-flight store call is not interrupted; only the next loop
    /// iteration is prevented.
    pub async fn stop(&self) {
        let task = self.inner.task.lock().await.take();
        let Some(task) = task else { return };

        let _ = task.shutdown_tx.send(true);
        if task.handle.await.is_err() {
            debug!("poll loop task aborted before joining");
        }
        self.inner.running.store(false, Ordering::SeqCst);
        info!("change log poller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl PollerInner {
    async fn poll_loop(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval = ?self.poll_interval, "change detection loop started");

        loop {
            let pause = match self.poll_once().await {
                Ok(claimed) => {
                    if claimed > 0 {
                        debug!(claimed, "poll cycle complete");
                    }
                    self.poll_interval
                }
                // Transient store failure: fixed pause, retry forever.
                Err(e) => {
                    error!(error = %e, "change log poll failed");
                    RETRY_PAUSE
                }
            };

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("change detection loop received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("change detection loop stopped");
    }

    /// One poll cycle: fetch a batch, construct and publish a
    /// notification per row, then claim every successfully constructed
    /// entry in a single statement. Returns the number of claimed
    /// entries.
    async fn poll_once(&self) -> Result<usize, StoreError> {
        let rows = self.change_log.unprocessed_changes(POLL_BATCH_SIZE).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        info!(count = rows.len(), "processing change log entries");

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            let change_id = row.id;
            match self.build_notification(row).await {
                Ok(notification) => {
                    // Delivery is best-effort; the bus logs per-subscriber
                    // failures and the entry is claimed regardless.
                    self.bus.publish(notification).await;
                    claimed.push(change_id);
                }
                Err(e) => {
                    error!(change_id, error = %e, "failed to process change log entry");
                }
            }
        }

        if !claimed.is_empty() {
            self.change_log.mark_processed(&claimed).await?;
        }
        Ok(claimed.len())
    }

    async fn build_notification(
        &self,
        row: ChangeRow,
    ) -> Result<ChangeNotification, ProcessError> {
        let change = OrderChange::try_from(row)?;
        Ok(self.enricher.enrich(change).await?)
    }
}
