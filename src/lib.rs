// CGM Calibration Core - glucose sensor calibration engine
// Incremental least-squares calibration of raw sensor values against meter readings

// Module declarations
pub mod calibration;
pub mod config;
pub mod error;
pub mod managers;
pub mod sensor;

// Re-exports for convenience
pub use calibration::{
    CalibrationSample, CalibrationStore, FitParameters, GlucoseUnits, RegressionEngine,
};
pub use config::AppConfig;
pub use error::{CalibrationError, ErrorCode};
pub use managers::{CalibrationService, CalibrationUpdate, ChangeBroadcaster};
pub use sensor::{SensorSource, StubSensorSource, SystemTimeSource, TimeSource};

/// Initialize logging for binaries and tests.
///
/// Safe to call more than once; repeated calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
