use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A patient's pharmacokinetic parameters.
///
/// Holds the four raw physiological parameters together with the two derived
/// constants used by the simulator and filter bank: the first-order
/// elimination rate `k_el = k_int + k_slope * cl_cr` and the distribution
/// volume `v_d = v_slope * bw`. Both derived values are validated to be
/// strictly positive at construction, after which the patient is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    k_slope: f64,
    k_int: f64,
    cl_cr: f64,
    v_slope: f64,
    bw: f64,
    k_el: f64,
    v_d: f64,
}

impl Patient {
    /// Create a new patient from raw parameters
    ///
    /// # Arguments
    ///
    /// * `k_slope` - Slope of elimination rate against creatinine clearance
    /// * `k_int` - Nonrenal elimination intercept
    /// * `cl_cr` - Creatinine clearance rate
    /// * `v_slope` - Slope of distribution volume against bodyweight
    /// * `bw` - Bodyweight
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either derived constant is non-positive.
    /// No other physiological bounds are imposed here; supplying physically
    /// meaningful inputs is the caller's responsibility.
    pub fn new(
        k_slope: f64,
        k_int: f64,
        cl_cr: f64,
        v_slope: f64,
        bw: f64,
    ) -> Result<Self, ConfigError> {
        let k_el = k_int + k_slope * cl_cr;
        let v_d = v_slope * bw;

        if !(k_el > 0.0) || !k_el.is_finite() {
            return Err(ConfigError::NonPositiveEliminationRate { value: k_el });
        }
        if !(v_d > 0.0) || !v_d.is_finite() {
            return Err(ConfigError::NonPositiveDistributionVolume { value: v_d });
        }

        Ok(Self {
            k_slope,
            k_int,
            cl_cr,
            v_slope,
            bw,
            k_el,
            v_d,
        })
    }

    /// Derive a hypothesis patient sharing this patient's fixed covariates
    /// (`k_int`, `cl_cr`, `bw`) with candidate slope values
    pub fn with_slopes(&self, k_slope: f64, v_slope: f64) -> Result<Self, ConfigError> {
        Self::new(k_slope, self.k_int, self.cl_cr, v_slope, self.bw)
    }

    /// Slope of the elimination rate against creatinine clearance
    pub fn k_slope(&self) -> f64 {
        self.k_slope
    }

    /// Nonrenal elimination intercept
    pub fn k_int(&self) -> f64 {
        self.k_int
    }

    /// Creatinine clearance rate
    pub fn cl_cr(&self) -> f64 {
        self.cl_cr
    }

    /// Slope of the distribution volume against bodyweight
    pub fn v_slope(&self) -> f64 {
        self.v_slope
    }

    /// Bodyweight
    pub fn bw(&self) -> f64 {
        self.bw
    }

    /// First-order elimination rate constant
    pub fn k_el(&self) -> f64 {
        self.k_el
    }

    /// Distribution volume converting drug amount to concentration
    pub fn v_d(&self) -> f64 {
        self.v_d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derives_rate_constants() {
        let patient = Patient::new(0.003125, 0.01, 50.0, 0.2806, 70.0).unwrap();
        assert_relative_eq!(patient.k_el(), 0.01 + 0.003125 * 50.0);
        assert_relative_eq!(patient.v_d(), 0.2806 * 70.0);
    }

    #[test]
    fn rejects_non_positive_elimination() {
        let result = Patient::new(-0.01, 0.01, 10.0, 0.28, 70.0);
        assert!(matches!(
            result,
            Err(ConfigError::NonPositiveEliminationRate { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_volume() {
        let result = Patient::new(0.003, 0.01, 50.0, 0.0, 70.0);
        assert!(matches!(
            result,
            Err(ConfigError::NonPositiveDistributionVolume { .. })
        ));
    }

    #[test]
    fn hypothesis_patient_shares_covariates() {
        let reference = Patient::new(0.003125, 0.01, 50.0, 0.2806, 70.0).unwrap();
        let hypothesis = reference.with_slopes(0.004, 0.3).unwrap();
        assert_eq!(hypothesis.k_int(), reference.k_int());
        assert_eq!(hypothesis.cl_cr(), reference.cl_cr());
        assert_eq!(hypothesis.bw(), reference.bw());
        assert_relative_eq!(hypothesis.k_el(), 0.01 + 0.004 * 50.0);
    }
}
