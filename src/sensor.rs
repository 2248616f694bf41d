//! Collaborator seams for the calibration service.
//!
//! The service never reaches into platform code directly: the current
//! raw sensor value and the clock both come in through these traits, so
//! hosts wire real sources and tests wire deterministic stubs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current raw sensor value.
///
/// `current_raw` returns `None` when no reading is available (sensor
/// warm-up, dropped connection); the service refuses to calibrate in
/// that state rather than pairing the meter value with a stale or
/// made-up raw.
pub trait SensorSource: Send + Sync {
    fn current_raw(&self) -> Option<f64>;
}

/// Source of sample timestamps, milliseconds since the Unix epoch.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Default time source backed by the system clock.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced time source for deterministic tests.
#[derive(Default)]
pub struct FixedTimeSource {
    now_ms: AtomicU64,
}

impl FixedTimeSource {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl TimeSource for FixedTimeSource {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

/// Settable sensor source for tests and tooling.
///
/// Starts with no reading; call [StubSensorSource::set_raw] to simulate
/// the sensor producing (or losing) a value.
#[derive(Default)]
pub struct StubSensorSource {
    raw: Mutex<Option<f64>>,
}

impl StubSensorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: f64) -> Self {
        Self {
            raw: Mutex::new(Some(raw)),
        }
    }

    pub fn set_raw(&self, raw: Option<f64>) {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = raw;
    }
}

impl SensorSource for StubSensorSource {
    fn current_raw(&self) -> Option<f64> {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source_is_past_2020() {
        let source = SystemTimeSource::default();
        // 2020-01-01 in epoch milliseconds
        assert!(source.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_fixed_time_source() {
        let source = FixedTimeSource::new(1_000);
        assert_eq!(source.now_ms(), 1_000);

        source.advance(500);
        assert_eq!(source.now_ms(), 1_500);

        source.set(42);
        assert_eq!(source.now_ms(), 42);
    }

    #[test]
    fn test_stub_sensor_source() {
        let sensor = StubSensorSource::new();
        assert_eq!(sensor.current_raw(), None);

        sensor.set_raw(Some(123.5));
        assert_eq!(sensor.current_raw(), Some(123.5));

        sensor.set_raw(None);
        assert_eq!(sensor.current_raw(), None);
    }

    #[test]
    fn test_stub_sensor_with_raw() {
        let sensor = StubSensorSource::with_raw(99.0);
        assert_eq!(sensor.current_raw(), Some(99.0));
    }
}
