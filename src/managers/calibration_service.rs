// CalibrationService: orchestrates store mutations, re-fit, and publish
//
// Single Responsibility: keep the sample set, the derived fit, and the
// observers' view of both in lockstep.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::Stream;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::calibration::{
    CalibrationSample, CalibrationStore, FitParameters, RegressionEngine,
};
use crate::config::AppConfig;
use crate::error::{log_calibration_error, CalibrationError};
use crate::managers::broadcast_manager::{CalibrationUpdate, ChangeBroadcaster};
use crate::sensor::{SensorSource, TimeSource};

/// Orchestrates the calibration workflow.
///
/// The service is either idle or mutating. A mutation takes the store
/// mutex and, before releasing it, applies the store change, re-fits,
/// swaps the read snapshot, and publishes - so no caller can observe a
/// sample set and fit that disagree, and mutations from other threads
/// serialize cleanly.
///
/// Reads (`current_fit`, `current_samples`, `calibrate`) go through the
/// last-published snapshot behind an `RwLock` and never contend with the
/// mutation path beyond the brief snapshot swap.
///
/// Collaborators are injected at construction:
/// - [SensorSource] supplies the raw value paired with each meter entry
/// - [TimeSource] stamps samples at insertion
///
/// # Example
/// ```ignore
/// let service = CalibrationService::new(sensor, time, &AppConfig::load());
/// service.add_calibration(118.0)?;
/// let fit = service.current_fit()?;
/// ```
pub struct CalibrationService {
    store: Mutex<CalibrationStore>,
    snapshot: RwLock<CalibrationUpdate>,
    broadcaster: ChangeBroadcaster,
    sensor: Arc<dyn SensorSource>,
    time: Arc<dyn TimeSource>,
}

impl CalibrationService {
    /// Create a service with an empty sample set and identity fit.
    pub fn new(
        sensor: Arc<dyn SensorSource>,
        time: Arc<dyn TimeSource>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store: Mutex::new(CalibrationStore::new()),
            snapshot: RwLock::new(CalibrationUpdate::empty()),
            broadcaster: ChangeBroadcaster::new(config.channels.update_buffer),
            sensor,
            time,
        }
    }

    // ========================================================================
    // MUTATIONS - store update + re-fit + publish under one lock
    // ========================================================================

    /// Record a new calibration from a meter reading.
    ///
    /// Pairs `value` with the sensor's current raw reading and the
    /// current time, validates, inserts, re-fits, and publishes.
    ///
    /// # Errors
    /// - `NoSensorReading` when the sensor has no usable raw value
    /// - `InvalidSample` when `value` is not finite and positive
    ///   (enforced here even though the UI disables such entries)
    /// - `StatePoisoned` on lock poisoning
    pub fn add_calibration(&self, value: f64) -> Result<(), CalibrationError> {
        let raw = self
            .sensor
            .current_raw()
            .filter(|raw| raw.is_finite())
            .ok_or(CalibrationError::NoSensorReading)
            .inspect_err(|err| log_calibration_error(err, "add_calibration"))?;

        let mut store = self.lock_store()?;
        let sample = CalibrationSample::new(raw, value, self.time.now_ms());
        store
            .add(sample)
            .inspect_err(|err| log_calibration_error(err, "add_calibration"))?;

        self.republish(&store)
    }

    /// Remove the most recently added calibration.
    ///
    /// # Errors
    /// - `EmptyStore` when there is nothing to remove
    /// - `StatePoisoned` on lock poisoning
    pub fn remove_last(&self) -> Result<CalibrationSample, CalibrationError> {
        let mut store = self.lock_store()?;
        let removed = store
            .remove_last()
            .inspect_err(|err| log_calibration_error(err, "remove_last"))?;

        self.republish(&store)?;
        Ok(removed)
    }

    /// Remove the calibration at `index` (insertion order).
    ///
    /// # Errors
    /// - `IndexOutOfRange` when `index >= len`
    /// - `StatePoisoned` on lock poisoning
    pub fn remove_at(&self, index: usize) -> Result<CalibrationSample, CalibrationError> {
        let mut store = self.lock_store()?;
        let removed = store
            .remove_at(index)
            .inspect_err(|err| log_calibration_error(err, "remove_at"))?;

        self.republish(&store)?;
        Ok(removed)
    }

    /// Remove every calibration. The published fit returns to identity.
    pub fn remove_all(&self) -> Result<(), CalibrationError> {
        let mut store = self.lock_store()?;
        store.remove_all();
        self.republish(&store)
    }

    /// Replace the sample set wholesale, typically on startup when an
    /// external storage collaborator rehydrates saved calibrations.
    ///
    /// Validates every sample before touching the current set; if any is
    /// invalid the previous state stays published.
    ///
    /// # Errors
    /// - `InvalidSample` for the first non-positive meter value found
    /// - `StatePoisoned` on lock poisoning
    pub fn load_samples(&self, samples: Vec<CalibrationSample>) -> Result<(), CalibrationError> {
        if let Some(bad) = samples
            .iter()
            .find(|s| !s.value.is_finite() || s.value <= 0.0)
        {
            let err = CalibrationError::InvalidSample { value: bad.value };
            log_calibration_error(&err, "load_samples");
            return Err(err);
        }

        let mut store = self.lock_store()?;
        store.remove_all();
        for sample in samples {
            store.add(sample)?;
        }
        self.republish(&store)
    }

    // ========================================================================
    // READS - served from the last-published snapshot
    // ========================================================================

    /// The fit published by the most recent mutation.
    pub fn current_fit(&self) -> Result<FitParameters, CalibrationError> {
        Ok(self.read_snapshot()?.fit)
    }

    /// The ordered sample sequence published by the most recent mutation.
    pub fn current_samples(&self) -> Result<Vec<CalibrationSample>, CalibrationError> {
        Ok(self.read_snapshot()?.samples.clone())
    }

    /// Samples and fit together, guaranteed mutually consistent.
    pub fn current_update(&self) -> Result<CalibrationUpdate, CalibrationError> {
        Ok(self.read_snapshot()?.clone())
    }

    /// Map a raw sensor value through the current fit.
    pub fn calibrate(&self, raw: f64) -> Result<f64, CalibrationError> {
        Ok(self.read_snapshot()?.fit.apply(raw))
    }

    pub fn sample_count(&self) -> Result<usize, CalibrationError> {
        Ok(self.read_snapshot()?.samples.len())
    }

    pub fn is_empty(&self) -> Result<bool, CalibrationError> {
        Ok(self.read_snapshot()?.samples.is_empty())
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Subscribe to published updates. Each receiver is independent and
    /// sees every mutation from subscription time onward.
    pub fn subscribe(&self) -> broadcast::Receiver<CalibrationUpdate> {
        self.broadcaster.subscribe()
    }

    /// Subscription bridged into an unbounded mpsc receiver (works
    /// without an ambient tokio runtime).
    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<CalibrationUpdate> {
        self.broadcaster.subscribe_unbounded()
    }

    /// Subscription adapted to a [futures::Stream].
    pub async fn updates_stream(&self) -> impl Stream<Item = CalibrationUpdate> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_unbounded())
    }

    // ========================================================================
    // HELPER METHODS - lock management and publish
    // ========================================================================

    /// Re-fit from the store and publish, while the caller still holds
    /// the store lock. Keeping the lock across snapshot swap + publish
    /// is what makes each mutation atomic for observers.
    fn republish(&self, store: &CalibrationStore) -> Result<(), CalibrationError> {
        let update = CalibrationUpdate {
            samples: store.snapshot(),
            fit: RegressionEngine::fit(store.all()),
        };

        {
            let mut snapshot = self.write_snapshot()?;
            *snapshot = update.clone();
        }

        self.broadcaster.publish(update);
        Ok(())
    }

    /// Safely acquire the store lock
    fn lock_store(&self) -> Result<MutexGuard<'_, CalibrationStore>, CalibrationError> {
        self.store
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    /// Safely acquire a read lock on the published snapshot
    fn read_snapshot(&self) -> Result<RwLockReadGuard<'_, CalibrationUpdate>, CalibrationError> {
        self.snapshot
            .read()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    /// Safely acquire a write lock on the published snapshot
    fn write_snapshot(&self) -> Result<RwLockWriteGuard<'_, CalibrationUpdate>, CalibrationError> {
        self.snapshot
            .write()
            .map_err(|_| CalibrationError::StatePoisoned)
    }
}
