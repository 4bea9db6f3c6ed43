//! Processing loop: the single writer of the fleet status store.
//!
//! Drains the ingestion channel in batches, applies each batch to the store
//! as one published snapshot, and signals the view through a generation
//! watch. Runs on the background runtime.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fleet::{FleetStatusStore, IngestReceiver};
use crate::types::TelemetryEvent;

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub batches: u64,
    pub events_applied: u64,
    pub events_rejected: u64,
    /// Events evicted by the ingestion queue before they reached the store
    pub events_dropped: u64,
    pub snapshots_published: u64,
    pub final_generation: u64,
}

/// Owns the store and the consumer half of the ingestion channel.
pub struct ProcessingLoop {
    store: FleetStatusStore,
    receiver: IngestReceiver,
    changed: watch::Sender<u64>,
    cancel_token: CancellationToken,
    stats: BridgeStats,
}

impl ProcessingLoop {
    pub fn new(
        store: FleetStatusStore,
        receiver: IngestReceiver,
        changed: watch::Sender<u64>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            receiver,
            changed,
            cancel_token,
            stats: BridgeStats::default(),
        }
    }

    /// Run until cancellation or until every producer is gone.
    ///
    /// Events already queued at cancellation are still applied so the final
    /// snapshot reflects everything that was accepted.
    pub async fn run(mut self) -> BridgeStats {
        info!("Processing loop started");

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    self.receiver.close();
                    let rest = self.receiver.try_drain();
                    if !rest.is_empty() {
                        self.apply(rest);
                    }
                    break;
                }
                batch = self.receiver.recv_batch() => batch,
            };

            match batch {
                Some(events) => self.apply(events),
                None => {
                    info!("[ProcessingLoop] Ingestion channel closed");
                    break;
                }
            }
        }

        self.stats.events_dropped = self.receiver.dropped();
        self.stats.final_generation = self.store.snapshot().generation();
        log_final_stats(&self.stats);
        self.stats
    }

    fn apply(&mut self, events: Vec<TelemetryEvent>) {
        self.stats.batches += 1;
        let size = events.len();
        let outcome = self.store.apply_batch(events);

        self.stats.events_applied += outcome.applied as u64;
        self.stats.events_rejected += outcome.rejected.len() as u64;
        for (event, error) in &outcome.rejected {
            warn!(
                vehicle = %event.vehicle(),
                kind = event.kind_name(),
                error = %error,
                "Rejected telemetry update"
            );
        }

        if outcome.changed {
            self.stats.snapshots_published += 1;
            // send_replace never fails, even with the view already gone
            self.changed.send_replace(outcome.generation);
        }
        debug!(
            batch_size = size,
            applied = outcome.applied,
            generation = outcome.generation,
            "Applied telemetry batch"
        );
    }
}

fn log_final_stats(stats: &BridgeStats) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Batches:              {}", stats.batches);
    info!("   Events Applied:       {}", stats.events_applied);
    info!("   Events Rejected:      {}", stats.events_rejected);
    info!("   Events Dropped:       {}", stats.events_dropped);
    info!("   Snapshots Published:  {}", stats.snapshots_published);
    info!("   Final Generation:     {}", stats.final_generation);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FleetConfig;
    use crate::fleet::ingest;
    use crate::types::{Channel, ConnectionChannel, StatusKind, VehicleId};

    fn wifi(n: u8, status: StatusKind) -> TelemetryEvent {
        TelemetryEvent::ChannelUpdate {
            vehicle: VehicleId::new(n).unwrap(),
            channel: Channel::Connection(ConnectionChannel::Wifi),
            status,
        }
    }

    #[tokio::test]
    async fn test_applies_batches_and_signals_view() {
        let store = FleetStatusStore::from_config(&FleetConfig::default());
        let reader = store.reader();
        let (tx, rx) = ingest::channel(Some(16));
        let (changed_tx, mut changed_rx) = watch::channel(0);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(ProcessingLoop::new(store, rx, changed_tx, cancel.clone()).run());

        tx.offer(wifi(2, StatusKind::Positive));
        changed_rx.changed().await.unwrap();
        assert!(*changed_rx.borrow_and_update() >= 1);
        let snap = reader.snapshot();
        assert_eq!(
            snap.status(VehicleId::new(2).unwrap(), Channel::Connection(ConnectionChannel::Wifi)),
            Some(StatusKind::Positive)
        );

        tx.offer(wifi(9, StatusKind::Positive));
        drop(tx);
        let stats = handle.await.unwrap();
        assert_eq!(stats.events_applied, 1);
        assert_eq!(stats.events_rejected, 1);
        assert_eq!(stats.final_generation, 1);
    }

    #[tokio::test]
    async fn test_cancel_applies_queued_events() {
        let store = FleetStatusStore::from_config(&FleetConfig::default());
        let reader = store.reader();
        let (tx, rx) = ingest::channel(Some(16));
        let (changed_tx, _changed_rx) = watch::channel(0);
        let cancel = CancellationToken::new();

        tx.offer(wifi(1, StatusKind::Negative));
        cancel.cancel();

        let stats = ProcessingLoop::new(store, rx, changed_tx, cancel).run().await;
        assert_eq!(stats.events_applied, 1);
        assert!(tx.is_closed());
        assert_eq!(
            reader.snapshot().status(VehicleId::new(1).unwrap(), Channel::Connection(ConnectionChannel::Wifi)),
            Some(StatusKind::Negative)
        );
    }

    #[tokio::test]
    async fn test_dropped_events_are_reported() {
        let store = FleetStatusStore::from_config(&FleetConfig::default());
        let (tx, rx) = ingest::channel(Some(2));
        let (changed_tx, _changed_rx) = watch::channel(0);

        for status in [StatusKind::Positive, StatusKind::Negative, StatusKind::Waiting, StatusKind::Positive] {
            tx.offer(wifi(3, status));
        }
        drop(tx);

        let stats = ProcessingLoop::new(store, rx, changed_tx, CancellationToken::new()).run().await;
        assert_eq!(stats.events_dropped, 2);
        assert_eq!(stats.events_applied, 2);
        assert_eq!(stats.batches, 1);
    }
}
