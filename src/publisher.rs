//! Status publishers
//!
//! Publishers receive immutable snapshots. A failing publisher is logged by
//! the caller and never interrupts the pipeline.

use crate::models::NeuralStatus;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub trait StatusPublisher: Send {
    fn name(&self) -> &str;
    fn publish(&self, status: Arc<NeuralStatus>) -> anyhow::Result<()>;
}

/// Logs a one-line summary of every status
#[derive(Debug, Default)]
pub struct LogPublisher;

impl StatusPublisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&self, status: Arc<NeuralStatus>) -> anyhow::Result<()> {
        info!(
            "Status {}: illumination={:.3}, diagnostics={} ({} alert(s))",
            status.timestamp.to_rfc3339(),
            status.illumination,
            status.diagnostics.len(),
            status.alert_count()
        );
        Ok(())
    }
}

/// Fans statuses out to any number of in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Arc<NeuralStatus>>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<NeuralStatus>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl StatusPublisher for BroadcastPublisher {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn publish(&self, status: Arc<NeuralStatus>) -> anyhow::Result<()> {
        match self.tx.send(status) {
            Ok(n) => debug!("Broadcast status to {} subscriber(s)", n),
            // No subscribers is not a failure
            Err(_) => debug!("No status subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_same_snapshot() {
        let publisher = BroadcastPublisher::new(4);
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        let status = Arc::new(NeuralStatus {
            illumination: 0.75,
            ..Default::default()
        });
        publisher.publish(Arc::clone(&status)).unwrap();

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.illumination, 0.75);
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let publisher = BroadcastPublisher::new(4);
        assert!(publisher.publish(Arc::new(NeuralStatus::default())).is_ok());
        assert!(LogPublisher.publish(Arc::new(NeuralStatus::default())).is_ok());
    }
}
