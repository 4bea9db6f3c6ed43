//! Ingestion channel: telemetry producers to the processing loop
//!
//! Producers never block. In bounded mode a full queue drops its OLDEST
//! event to make room for the newest, since a newer status supersedes an
//! older one for the same vehicle. Every drop is counted.
//!
//! Ordering is FIFO per producer; the single receiver drains the whole queue
//! in one batch so the store publishes one snapshot per wake-up.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::types::TelemetryEvent;

/// What happened to an offered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Queued,
    /// Queued after evicting the oldest pending event
    QueuedDroppedOldest,
    /// Channel closed; the event was discarded
    Closed,
}

struct Shared {
    queue: Mutex<VecDeque<TelemetryEvent>>,
    capacity: Option<usize>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
    senders: AtomicUsize,
}

impl Shared {
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }
}

/// Producer half. Cloneable; the channel closes when the last clone drops.
pub struct IngestSender {
    shared: Arc<Shared>,
}

/// Consumer half, owned by the processing loop.
pub struct IngestReceiver {
    shared: Arc<Shared>,
}

/// Create an ingestion channel. `None` capacity means unbounded.
pub fn channel(capacity: Option<usize>) -> (IngestSender, IngestReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.unwrap_or(64))),
        capacity,
        notify: Notify::new(),
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
        senders: AtomicUsize::new(1),
    });
    (
        IngestSender {
            shared: Arc::clone(&shared),
        },
        IngestReceiver { shared },
    )
}

impl IngestSender {
    /// Enqueue an event without blocking.
    pub fn offer(&self, event: TelemetryEvent) -> OfferOutcome {
        if self.shared.closed.load(Ordering::Acquire) {
            return OfferOutcome::Closed;
        }

        let outcome = {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut outcome = OfferOutcome::Queued;
            if let Some(capacity) = self.shared.capacity {
                while queue.len() >= capacity.max(1) {
                    if let Some(evicted) = queue.pop_front() {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            vehicle = %evicted.vehicle(),
                            kind = evicted.kind_name(),
                            "Ingestion queue full: dropped oldest event"
                        );
                        outcome = OfferOutcome::QueuedDroppedOldest;
                    }
                }
            }
            queue.push_back(event);
            outcome
        };

        self.shared.notify.notify_one();
        outcome
    }

    /// Events evicted by the drop-oldest policy so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Close for every producer. Already queued events stay receivable.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Clone for IngestSender {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for IngestSender {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.close();
        }
    }
}

impl IngestReceiver {
    /// Take everything currently queued, oldest first.
    pub fn try_drain(&mut self) -> Vec<TelemetryEvent> {
        let mut queue = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }

    /// Wait for at least one event and return the whole pending batch.
    ///
    /// Returns `None` once the channel is closed and empty.
    pub async fn recv_batch(&mut self) -> Option<Vec<TelemetryEvent>> {
        loop {
            let batch = self.try_drain();
            if !batch.is_empty() {
                return Some(batch);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            // notify_one stores a permit, so a push between the check above
            // and this await is not lost.
            self.shared.notify.notified().await;
        }
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn close(&self) {
        self.shared.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, ConnectionChannel, StatusKind, VehicleId};
    use tokio_test::{assert_pending, assert_ready, task};

    fn update(n: u8, status: StatusKind) -> TelemetryEvent {
        TelemetryEvent::ChannelUpdate {
            vehicle: VehicleId::new(n).unwrap(),
            channel: Channel::Connection(ConnectionChannel::Wifi),
            status,
        }
    }

    fn last(n: u8, text: &str) -> TelemetryEvent {
        TelemetryEvent::LastMessageUpdate {
            vehicle: VehicleId::new(1).unwrap(),
            text: format!("{text}{n}"),
        }
    }

    #[test]
    fn test_fifo_order() {
        let (tx, mut rx) = channel(Some(8));
        for i in 0..5 {
            assert_eq!(tx.offer(last(i, "m")), OfferOutcome::Queued);
        }
        let batch = rx.try_drain();
        assert_eq!(batch, (0..5).map(|i| last(i, "m")).collect::<Vec<_>>());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (tx, mut rx) = channel(Some(3));
        for i in 0..3 {
            tx.offer(last(i, "m"));
        }
        assert_eq!(tx.offer(last(3, "m")), OfferOutcome::QueuedDroppedOldest);
        assert_eq!(tx.offer(last(4, "m")), OfferOutcome::QueuedDroppedOldest);

        assert_eq!(tx.dropped(), 2);
        assert_eq!(rx.dropped(), 2);
        // Newest survive, oldest went first
        assert_eq!(rx.try_drain(), vec![last(2, "m"), last(3, "m"), last(4, "m")]);
    }

    #[test]
    fn test_unbounded_never_drops() {
        let (tx, rx) = channel(None);
        for i in 0..1000u32 {
            assert_eq!(tx.offer(last((i % 250) as u8, "m")), OfferOutcome::Queued);
        }
        assert_eq!(rx.len(), 1000);
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn test_offer_after_close_is_refused() {
        let (tx, rx) = channel(Some(4));
        rx.close();
        assert!(tx.is_closed());
        assert_eq!(tx.offer(update(1, StatusKind::Positive)), OfferOutcome::Closed);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_recv_batch_waits_for_offer() {
        let (tx, mut rx) = channel(Some(4));
        let mut recv = task::spawn(rx.recv_batch());

        assert_pending!(recv.poll());
        tx.offer(update(1, StatusKind::Positive));
        tx.offer(update(2, StatusKind::Negative));
        assert!(recv.is_woken());

        let batch = assert_ready!(recv.poll());
        assert_eq!(
            batch,
            Some(vec![update(1, StatusKind::Positive), update(2, StatusKind::Negative)])
        );
    }

    #[test]
    fn test_queued_events_survive_close() {
        let (tx, mut rx) = channel(Some(4));
        tx.offer(update(3, StatusKind::Waiting));
        drop(tx);

        let mut recv = task::spawn(rx.recv_batch());
        assert_eq!(assert_ready!(recv.poll()), Some(vec![update(3, StatusKind::Waiting)]));
        drop(recv);

        let mut recv = task::spawn(rx.recv_batch());
        assert_eq!(assert_ready!(recv.poll()), None);
    }

    #[test]
    fn test_last_sender_drop_closes_channel() {
        let (tx, mut rx) = channel(Some(4));
        let tx2 = tx.clone();
        drop(tx);

        let mut recv = task::spawn(rx.recv_batch());
        assert_pending!(recv.poll());

        drop(tx2);
        assert!(recv.is_woken());
        assert_eq!(assert_ready!(recv.poll()), None);
    }
}
