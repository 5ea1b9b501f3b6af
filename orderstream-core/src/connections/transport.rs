use async_trait::async_trait;
use thiserror::Error;

/// A transport-level send failure. Broadcast treats any send error as a
/// dead connection.
#[derive(Debug, Error)]
#[error("transport send failed: {reason}")]
pub struct SinkError {
    reason: String,
}

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outbound half of a live client transport.
///
/// The registry serializes each message once and pushes the same text
/// frame through every sink; implementations must tolerate calls from
/// concurrent broadcast tasks.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), SinkError>;
}
