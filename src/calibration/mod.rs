// Calibration domain - samples, the ordered store, and the regression fit
//
// This module provides three components:
// 1. CalibrationSample: one raw/meter pair with its insertion time
// 2. CalibrationStore: the insertion-ordered mutable sample set
// 3. RegressionEngine: least-squares fit recomputed from the set
//
// The calibration flow:
// 1. A meter reading arrives and is paired with the current raw value
// 2. The store validates and appends the sample
// 3. The engine re-fits slope/intercept from the full set

pub mod regression;
pub mod sample;
pub mod store;

pub use regression::{FitParameters, RegressionEngine};
pub use sample::{CalibrationSample, GlucoseUnits};
pub use store::CalibrationStore;
