// CalibrationSample - a raw/meter value pair with its insertion time
//
// Samples pair the sensor's unprocessed signal with a reference meter
// reading. The engine itself is unit-agnostic; GlucoseUnits exists so
// configuration and tooling can present values the way the user expects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// mg/dL per mmol/L for glucose.
const MGDL_PER_MMOLL: f64 = 18.0182;

/// A single calibration point: raw sensor value vs. meter glucose value.
///
/// `value` must be positive; the store rejects anything else before the
/// sample enters the set. Timestamps are assigned at insertion by the
/// service's time source, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Unprocessed sensor signal magnitude (sensor units)
    pub raw: f64,
    /// Reference glucose value from an external meter (mg/dL)
    pub value: f64,
    /// Insertion time in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl CalibrationSample {
    pub fn new(raw: f64, value: f64, timestamp_ms: u64) -> Self {
        Self {
            raw,
            value,
            timestamp_ms,
        }
    }
}

/// Display units for glucose values.
///
/// Samples are stored in mg/dL; mmol/L is a presentation concern and
/// conversion happens at the edges (configuration, CLI output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseUnits {
    MgDl,
    MmolL,
}

impl GlucoseUnits {
    /// Convert a stored mg/dL value into these units.
    pub fn from_mgdl(&self, value: f64) -> f64 {
        match self {
            GlucoseUnits::MgDl => value,
            GlucoseUnits::MmolL => value / MGDL_PER_MMOLL,
        }
    }

    /// Unit label for display
    pub fn label(&self) -> &'static str {
        match self {
            GlucoseUnits::MgDl => "mg/dL",
            GlucoseUnits::MmolL => "mmol/L",
        }
    }
}

impl Default for GlucoseUnits {
    fn default() -> Self {
        GlucoseUnits::MgDl
    }
}

impl fmt::Display for GlucoseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_serde_roundtrip() {
        let sample = CalibrationSample::new(123.0, 118.5, 1_700_000_000_000);
        let json = serde_json::to_string(&sample).unwrap();
        let parsed: CalibrationSample = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn test_units_default_is_mgdl() {
        assert_eq!(GlucoseUnits::default(), GlucoseUnits::MgDl);
    }

    #[test]
    fn test_units_conversion() {
        // 100 mg/dL is about 5.55 mmol/L
        let mmol = GlucoseUnits::MmolL.from_mgdl(100.0);
        assert!((mmol - 5.55).abs() < 0.01);

        assert_eq!(GlucoseUnits::MgDl.from_mgdl(100.0), 100.0);
    }

    #[test]
    fn test_units_labels() {
        assert_eq!(GlucoseUnits::MgDl.label(), "mg/dL");
        assert_eq!(GlucoseUnits::MmolL.to_string(), "mmol/L");
    }

    #[test]
    fn test_units_serde_names() {
        assert_eq!(serde_json::to_string(&GlucoseUnits::MgDl).unwrap(), "\"mgdl\"");
        assert_eq!(
            serde_json::to_string(&GlucoseUnits::MmolL).unwrap(),
            "\"mmoll\""
        );
    }
}
