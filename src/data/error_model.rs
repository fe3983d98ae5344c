use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Noise variances for the stochastic simulator.
///
/// Each field is the variance of a zero-mean Gaussian noise source. The
/// standard deviation handed to the samplers is the square root of the
/// stored variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorModel {
    measurement: f64,
    measurement_timing: f64,
    dosage: f64,
    dosage_timing: f64,
}

impl ErrorModel {
    /// Create a new error model from four non-negative variances
    ///
    /// # Arguments
    ///
    /// * `measurement` - Concentration measurement noise variance
    /// * `measurement_timing` - Measurement timing noise variance
    /// * `dosage` - Dosage noise variance
    /// * `dosage_timing` - Dosage timing noise variance
    pub fn new(
        measurement: f64,
        measurement_timing: f64,
        dosage: f64,
        dosage_timing: f64,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("measurement", measurement),
            ("measurement_timing", measurement_timing),
            ("dosage", dosage),
            ("dosage_timing", dosage_timing),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::NegativeVariance { name, value });
            }
        }

        Ok(Self {
            measurement,
            measurement_timing,
            dosage,
            dosage_timing,
        })
    }

    /// An error model with every variance set to zero, for deterministic runs
    pub fn noiseless() -> Self {
        Self {
            measurement: 0.0,
            measurement_timing: 0.0,
            dosage: 0.0,
            dosage_timing: 0.0,
        }
    }

    /// Concentration measurement noise variance
    pub fn measurement(&self) -> f64 {
        self.measurement
    }

    /// Measurement timing noise variance. Carried as configuration; the
    /// current simulator does not consume it.
    pub fn measurement_timing(&self) -> f64 {
        self.measurement_timing
    }

    /// Dosage noise variance
    pub fn dosage(&self) -> f64 {
        self.dosage
    }

    /// Dosage timing noise variance
    pub fn dosage_timing(&self) -> f64 {
        self.dosage_timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_variance() {
        let result = ErrorModel::new(0.1, 0.0, -0.5, 0.0);
        assert!(matches!(
            result,
            Err(ConfigError::NegativeVariance { name: "dosage", .. })
        ));
    }

    #[test]
    fn noiseless_is_all_zero() {
        let errors = ErrorModel::noiseless();
        assert_eq!(errors.measurement(), 0.0);
        assert_eq!(errors.dosage(), 0.0);
        assert_eq!(errors.dosage_timing(), 0.0);
    }
}
