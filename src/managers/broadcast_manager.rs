// ChangeBroadcaster: tokio broadcast fan-out of calibration updates
// Single Responsibility: update channel lifecycle and subscription

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::calibration::{CalibrationSample, FitParameters};

/// The state published after every mutation: the ordered sample snapshot
/// and the fit computed from exactly that snapshot. Observers receive
/// owned clones, so nothing they do can reach back into service state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationUpdate {
    pub samples: Vec<CalibrationSample>,
    pub fit: FitParameters,
}

impl CalibrationUpdate {
    /// Starting state: no samples, identity fit.
    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
            fit: FitParameters::IDENTITY,
        }
    }
}

/// Owns the broadcast channel carrying [CalibrationUpdate]s.
///
/// Each subscriber gets an independent receiver fed in publish order.
/// Delivery goes into per-subscriber buffers rather than synchronous
/// callbacks, so an observer can never re-enter the service from inside
/// a publish. Subscribers that stop draining eventually lag and drop the
/// oldest updates (broadcast semantics); the next received update is
/// always a complete, self-consistent snapshot.
pub struct ChangeBroadcaster {
    tx: broadcast::Sender<CalibrationUpdate>,
}

impl ChangeBroadcaster {
    /// Create the broadcaster with the given channel buffer size.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Deliver an update to all current subscribers, in subscription
    /// order. Returns the number of receivers the update reached.
    pub fn publish(&self, update: CalibrationUpdate) -> usize {
        self.tx.send(update).unwrap_or(0)
    }

    /// Register an observer. Each call returns an independent receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<CalibrationUpdate> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Bridge a subscription into an unbounded mpsc receiver.
    ///
    /// Runs the forwarding loop on a dedicated thread with its own
    /// current-thread runtime, so callers without an ambient tokio
    /// runtime (CLI tools, host-app glue) can still consume updates.
    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<CalibrationUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.tx.subscribe();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime for update forwarding");
            rt.block_on(async move {
                while let Ok(update) = broadcast_rx.recv().await {
                    if tx.send(update).is_err() {
                        break;
                    }
                }
            });
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationSample;

    fn update_with(raw: f64, value: f64) -> CalibrationUpdate {
        CalibrationUpdate {
            samples: vec![CalibrationSample::new(raw, value, 0)],
            fit: FitParameters::IDENTITY,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = ChangeBroadcaster::new(50);
        assert_eq!(broadcaster.publish(CalibrationUpdate::empty()), 0);
    }

    #[test]
    fn test_multiple_subscribers_receive_same_update() {
        let broadcaster = ChangeBroadcaster::new(50);
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();

        let delivered = broadcaster.publish(update_with(120.0, 118.0));
        assert_eq!(delivered, 2);

        let update1 = rx1.try_recv().unwrap();
        let update2 = rx2.try_recv().unwrap();
        assert_eq!(update1, update2);
        assert_eq!(update1.samples.len(), 1);
        assert_eq!(update1.samples[0].raw, 120.0);
    }

    #[test]
    fn test_updates_arrive_in_publish_order() {
        let broadcaster = ChangeBroadcaster::new(50);
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(update_with(100.0, 100.0));
        broadcaster.publish(update_with(150.0, 160.0));

        assert_eq!(rx.try_recv().unwrap().samples[0].raw, 100.0);
        assert_eq!(rx.try_recv().unwrap().samples[0].raw, 150.0);
    }

    #[test]
    fn test_receiver_count_tracks_drops() {
        let broadcaster = ChangeBroadcaster::new(50);
        assert_eq!(broadcaster.receiver_count(), 0);

        let rx = broadcaster.subscribe();
        assert_eq!(broadcaster.receiver_count(), 1);

        drop(rx);
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        // buffer.max(1) keeps broadcast::channel from panicking on 0
        let broadcaster = ChangeBroadcaster::new(0);
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(CalibrationUpdate::empty());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_empty_update_is_identity() {
        let update = CalibrationUpdate::empty();
        assert!(update.samples.is_empty());
        assert!(update.fit.is_identity());
    }
}
