// RegressionEngine - least-squares fit of meter values on raw readings
//
// The fit maps raw sensor units to clinical glucose units. It is
// recomputed from scratch on every store mutation; with the sample
// counts involved (a handful per sensor session) there is nothing to
// gain from incremental updates.

use serde::{Deserialize, Serialize};

use crate::calibration::sample::CalibrationSample;

/// Slope/intercept of the linear mapping from raw to calibrated glucose.
///
/// Degenerate sample sets (fewer than two points, or zero raw-value
/// variance) yield the identity mapping so a sensor with no usable
/// calibration still reports its raw value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub slope: f64,
    pub intercept: f64,
}

impl FitParameters {
    /// slope 1, intercept 0: raw values pass through unchanged.
    pub const IDENTITY: FitParameters = FitParameters {
        slope: 1.0,
        intercept: 0.0,
    };

    /// Map a raw sensor value to a calibrated glucose value.
    pub fn apply(&self, raw: f64) -> f64 {
        self.slope * raw + self.intercept
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for FitParameters {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Ordinary least-squares regression over calibration samples.
pub struct RegressionEngine;

impl RegressionEngine {
    /// Fit meter value (y) on raw reading (x).
    ///
    /// slope = sum((x - mean_x)(y - mean_y)) / sum((x - mean_x)^2),
    /// intercept = mean_y - slope * mean_x.
    ///
    /// Uses only sums and means, so the result does not depend on sample
    /// order. Returns [FitParameters::IDENTITY] for fewer than two
    /// samples and when the raw values carry no variance; the variance
    /// guard means this never divides by zero.
    pub fn fit(samples: &[CalibrationSample]) -> FitParameters {
        if samples.len() < 2 {
            return FitParameters::IDENTITY;
        }

        let n = samples.len() as f64;
        let mean_raw = samples.iter().map(|s| s.raw).sum::<f64>() / n;
        let mean_value = samples.iter().map(|s| s.value).sum::<f64>() / n;

        let mut raw_variance = 0.0;
        let mut covariance = 0.0;
        for s in samples {
            let dx = s.raw - mean_raw;
            raw_variance += dx * dx;
            covariance += dx * (s.value - mean_value);
        }

        if raw_variance.abs() < f64::EPSILON {
            return FitParameters::IDENTITY;
        }

        let slope = covariance / raw_variance;
        FitParameters {
            slope,
            intercept: mean_value - slope * mean_raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(raw: f64, value: f64) -> CalibrationSample {
        CalibrationSample::new(raw, value, 0)
    }

    #[test]
    fn test_fit_two_points_exact() {
        let samples = vec![sample(100.0, 100.0), sample(150.0, 160.0)];
        let fit = RegressionEngine::fit(&samples);

        assert!((fit.slope - 1.2).abs() < 1e-12);
        assert!((fit.intercept - (-20.0)).abs() < 1e-12);
    }

    #[test]
    fn test_fit_matches_closed_form() {
        // mean_raw = 130, mean_value = 138.75
        // covariance = 2190, raw variance = 2000
        let samples = vec![
            sample(100.0, 105.0),
            sample(120.0, 130.0),
            sample(140.0, 148.0),
            sample(160.0, 172.0),
        ];
        let fit = RegressionEngine::fit(&samples);

        assert!((fit.slope - 1.095).abs() < 1e-9);
        assert!((fit.intercept - (-3.6)).abs() < 1e-9);
    }

    #[test]
    fn test_fit_empty_is_identity() {
        assert!(RegressionEngine::fit(&[]).is_identity());
    }

    #[test]
    fn test_fit_single_sample_is_identity() {
        let samples = vec![sample(140.0, 135.0)];
        assert_eq!(RegressionEngine::fit(&samples), FitParameters::IDENTITY);
    }

    #[test]
    fn test_fit_zero_variance_is_identity() {
        let samples = vec![
            sample(100.0, 90.0),
            sample(100.0, 110.0),
            sample(100.0, 130.0),
        ];
        assert_eq!(RegressionEngine::fit(&samples), FitParameters::IDENTITY);
    }

    #[test]
    fn test_fit_order_independent() {
        let forward = vec![
            sample(100.0, 105.0),
            sample(120.0, 130.0),
            sample(140.0, 148.0),
            sample(160.0, 172.0),
        ];
        let mut shuffled = forward.clone();
        shuffled.swap(0, 3);
        shuffled.swap(1, 2);

        let fit_a = RegressionEngine::fit(&forward);
        let fit_b = RegressionEngine::fit(&shuffled);

        assert!((fit_a.slope - fit_b.slope).abs() < 1e-9);
        assert!((fit_a.intercept - fit_b.intercept).abs() < 1e-9);
    }

    #[test]
    fn test_apply() {
        let fit = FitParameters {
            slope: 1.2,
            intercept: -20.0,
        };
        assert!((fit.apply(100.0) - 100.0).abs() < 1e-12);
        assert!((fit.apply(150.0) - 160.0).abs() < 1e-12);
    }

    #[test]
    fn test_identity_apply_passes_through() {
        assert_eq!(FitParameters::IDENTITY.apply(123.0), 123.0);
        assert_eq!(FitParameters::default(), FitParameters::IDENTITY);
    }

    #[test]
    fn test_fit_serde_roundtrip() {
        let fit = FitParameters {
            slope: 1.095,
            intercept: -3.6,
        };
        let json = serde_json::to_string(&fit).unwrap();
        let parsed: FitParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fit);
    }
}
