//! Closed-loop dose optimization.
//!
//! Bisection search over the dose magnitude, probing candidate doses with
//! disposable one-period simulator trials and steering the simulated peak and
//! trough concentrations toward the therapy targets. The bank-level initial
//! dose is the posterior-weighted average of per-cell optimal doses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::Patient;
use crate::error::{ConfigError, DosefitError};
use crate::simulator::{round_to, Simulator};

/// Bounded search range for the dose magnitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseRange {
    min: f64,
    max: f64,
}

impl Default for DoseRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 3000.0,
        }
    }
}

impl DoseRange {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        if !(min >= 0.0) || !(max > min) || !max.is_finite() {
            return Err(ConfigError::InvalidDoseRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Outcome of one per-patient bisection search.
///
/// `converged == false` means the iteration budget ran out before the
/// squared-error change dropped below tolerance; the dose is then the last
/// trial dose, reported as-is rather than pretending success.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseSearch {
    /// The last trial dose
    pub dose: f64,
    /// Whether the squared-error change dropped below tolerance in budget
    pub converged: bool,
    /// Number of trial simulations performed
    pub iterations: usize,
    /// Final squared error against the peak/trough targets
    pub error: f64,
    /// Simulated peak concentration at the last trial dose
    pub peak: f64,
    /// Simulated trough concentration at the last trial dose
    pub trough: f64,
}

/// Bank-level initial dose: the posterior-weighted average of per-cell
/// optimal doses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialDose {
    /// Weighted average of the per-cell optimal doses
    pub dose: f64,
    /// Per-cell search outcomes, in the grid's row-major cell order
    pub searches: Vec<DoseSearch>,
    /// Number of cells whose search did not converge
    pub non_converged: usize,
}

/// Bisection-based optimal-dose search.
///
/// Configuration follows the builder style of the rest of the crate;
/// defaults mirror the search as originally tuned: dose range 0 to 3000,
/// squared-error change tolerance 0.01, at most 50 iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseOptimizer {
    range: DoseRange,
    tolerance: f64,
    max_iters: usize,
}

impl Default for DoseOptimizer {
    fn default() -> Self {
        Self {
            range: DoseRange::default(),
            tolerance: 0.01,
            max_iters: 50,
        }
    }
}

impl DoseOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dose search range
    pub fn with_range(mut self, range: DoseRange) -> Self {
        self.range = range;
        self
    }

    /// Set the squared-error change tolerance that ends the search
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration budget
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Find the dose that steers one patient hypothesis toward the therapy
    /// targets.
    ///
    /// Each iteration runs one disposable one-period trial at the midpoint
    /// dose, reads the peak concentration at the pulse end and the trough one
    /// step before the next period, and narrows the bracket:
    ///
    /// * both above their targets: lower the upper bound
    /// * both below: raise the lower bound
    /// * peak above, trough below: lower the upper bound
    /// * peak below, trough above: raise the lower bound
    ///
    /// Ties favor shrinking the upper bound. The search ends when the change
    /// in squared error between consecutive iterations drops below the
    /// tolerance, or when the iteration budget is exhausted (reported via
    /// [`DoseSearch::converged`]).
    pub fn optimal_dose<R: Rng + ?Sized>(
        &self,
        sim: &Simulator,
        patient: &Patient,
        rng: &mut R,
    ) -> Result<DoseSearch, DosefitError> {
        let therapy = sim.therapy();
        let precision = sim.precision();
        let peak_time = round_to(therapy.pulse_length(), precision);
        let trough_time = round_to(therapy.period() - sim.step_size(), precision);

        let mut lower = self.range.min;
        let mut upper = self.range.max;
        let mut dose = (lower + upper) / 2.0;

        let mut peak = 0.0;
        let mut trough = 0.0;
        let mut error = (peak - therapy.peak()).powi(2) + (trough - therapy.trough()).powi(2);

        for iteration in 1..=self.max_iters {
            let trace = sim.trial(patient, dose, therapy.period(), rng)?;
            peak = trace
                .concentration_at(peak_time)
                .ok_or(ConfigError::TimeOffGrid {
                    time: peak_time,
                    step: sim.step_size(),
                })?;
            trough = trace
                .concentration_at(trough_time)
                .ok_or(ConfigError::TimeOffGrid {
                    time: trough_time,
                    step: sim.step_size(),
                })?;

            if peak >= therapy.peak() && trough >= therapy.trough() {
                upper = dose;
            } else if peak <= therapy.peak() && trough <= therapy.trough() {
                lower = dose;
            } else if peak >= therapy.peak() && trough <= therapy.trough() {
                upper = dose;
            } else {
                lower = dose;
            }

            let last = error;
            error = (peak - therapy.peak()).powi(2) + (trough - therapy.trough()).powi(2);

            if (error - last).abs() < self.tolerance {
                return Ok(DoseSearch {
                    dose,
                    converged: true,
                    iterations: iteration,
                    error,
                    peak,
                    trough,
                });
            }

            dose = (lower + upper) / 2.0;
        }

        tracing::warn!(
            dose,
            error,
            max_iters = self.max_iters,
            "dose search exhausted its iteration budget"
        );
        Ok(DoseSearch {
            dose,
            converged: false,
            iterations: self.max_iters,
            error,
            peak,
            trough,
        })
    }

    /// Compute the bank-level initial dose: the posterior-weighted average of
    /// per-cell optimal doses.
    ///
    /// Per-cell searches are independent and run in parallel; each gets its
    /// own generator seeded from `rng` before the parallel region, so results
    /// are reproducible for a given caller seed.
    pub fn initial_dose<R: Rng + ?Sized>(
        &self,
        sim: &Simulator,
        rng: &mut R,
    ) -> Result<InitialDose, DosefitError> {
        let cells = sim.grid().cells();
        let seeds: Vec<u64> = cells.iter().map(|_| rng.next_u64()).collect();

        let searches: Vec<DoseSearch> = cells
            .par_iter()
            .zip(seeds)
            .map(|(cell, seed)| {
                let mut cell_rng = StdRng::seed_from_u64(seed);
                self.optimal_dose(sim, &cell.patient, &mut cell_rng)
            })
            .collect::<Result<_, _>>()?;

        let dose = cells
            .iter()
            .zip(&searches)
            .map(|(cell, search)| cell.weight * search.dose)
            .sum();
        let non_converged = searches.iter().filter(|s| !s.converged).count();
        if non_converged > 0 {
            tracing::warn!(non_converged, "some per-cell dose searches did not converge");
        }

        Ok(InitialDose {
            dose,
            searches,
            non_converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_dose_range() {
        assert!(matches!(
            DoseRange::new(10.0, 10.0),
            Err(ConfigError::InvalidDoseRange { .. })
        ));
        assert!(matches!(
            DoseRange::new(-1.0, 10.0),
            Err(ConfigError::InvalidDoseRange { .. })
        ));
    }

    #[test]
    fn builder_overrides_defaults() {
        let optimizer = DoseOptimizer::new()
            .with_range(DoseRange::new(0.0, 500.0).unwrap())
            .with_tolerance(1e-3)
            .with_max_iters(20);
        assert_eq!(optimizer.range.max(), 500.0);
        assert_eq!(optimizer.tolerance, 1e-3);
        assert_eq!(optimizer.max_iters, 20);
    }
}
