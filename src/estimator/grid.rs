//! Discrete hypothesis bank over candidate parameter pairs.
//!
//! A fixed 2-D grid of (elimination-slope, volume-slope) candidates, each
//! holding a posterior weight and a scalar Kalman filter state. The grid
//! approximates a continuous Bayesian posterior by discretization and is the
//! estimator driven by the simulator at every measurement event.

use std::ops::{Index, IndexMut};

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::Patient;
use crate::error::{ConfigError, EstimationError};
use crate::simulator::kernel::infusion_response;

/// How a cell's weight is multiplied by the evidence of one measurement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WeightUpdate {
    /// Exact Gaussian likelihood of the innovation under the innovation
    /// variance. Keeps weights positive and concentrates the posterior on
    /// the best-matching cell.
    #[default]
    Likelihood,
    /// One Gaussian draw centered at the innovation with unit variance, the
    /// legacy stochastic update. Weights can turn negative; renormalization
    /// still forces them to sum to 1.
    Sampled,
}

/// One grid cell: a candidate patient with its posterior weight and scalar
/// filter state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisCell {
    /// Posterior weight; the grid keeps all weights summing to 1
    pub weight: f64,
    /// Patient hypothesis for this cell
    pub patient: Patient,
    /// Filter mean of the drug amount
    pub filter_mean: f64,
    /// Filter variance of the drug amount
    pub filter_variance: f64,
}

/// Fixed grid of parameter hypotheses with per-cell filters.
///
/// Cells are created once at initialization and mutated in place for the
/// life of one estimation run; they are never added or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisGrid {
    k_slopes: Vec<f64>,
    v_slopes: Vec<f64>,
    cells: Vec<HypothesisCell>,
    weight_update: WeightUpdate,
}

impl HypothesisGrid {
    /// Build a grid from candidate slope sequences.
    ///
    /// Every cell's patient shares the reference patient's fixed covariates
    /// (`k_int`, `cl_cr`, `bw`) and takes its slopes from the cell's axis
    /// values. Weights start uniform; filter state starts at mean 0,
    /// variance 1.
    pub fn new(
        k_slopes: Vec<f64>,
        v_slopes: Vec<f64>,
        reference: &Patient,
    ) -> Result<Self, ConfigError> {
        if k_slopes.is_empty() || v_slopes.is_empty() {
            return Err(ConfigError::EmptyGrid);
        }

        let weight = 1.0 / (k_slopes.len() * v_slopes.len()) as f64;
        let mut cells = Vec::with_capacity(k_slopes.len() * v_slopes.len());
        for &k_slope in &k_slopes {
            for &v_slope in &v_slopes {
                cells.push(HypothesisCell {
                    weight,
                    patient: reference.with_slopes(k_slope, v_slope)?,
                    filter_mean: 0.0,
                    filter_variance: 1.0,
                });
            }
        }

        Ok(Self {
            k_slopes,
            v_slopes,
            cells,
            weight_update: WeightUpdate::default(),
        })
    }

    /// Select the weight-update strategy
    pub fn with_weight_update(mut self, weight_update: WeightUpdate) -> Self {
        self.weight_update = weight_update;
        self
    }

    /// Grid shape as (elimination candidates, volume candidates)
    pub fn shape(&self) -> (usize, usize) {
        (self.k_slopes.len(), self.v_slopes.len())
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Candidate elimination slopes
    pub fn k_slopes(&self) -> &[f64] {
        &self.k_slopes
    }

    /// Candidate volume slopes
    pub fn v_slopes(&self) -> &[f64] {
        &self.v_slopes
    }

    /// All cells in row-major order (elimination-slope major)
    pub fn cells(&self) -> &[HypothesisCell] {
        &self.cells
    }

    /// Iterate cells with their (row, col) indices
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &HypothesisCell)> + '_ {
        let ncols = self.v_slopes.len();
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, cell)| ((idx / ncols, idx % ncols), cell))
    }

    /// Current posterior weights in row-major order
    pub fn weights(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.weight).collect()
    }

    /// The cell carrying the largest posterior weight
    pub fn posterior_mode(&self) -> ((usize, usize), &HypothesisCell) {
        self.iter()
            .max_by(|(_, a), (_, b)| a.weight.total_cmp(&b.weight))
            .expect("grid is never empty")
    }

    /// Restore uniform weights and the initial filter state, for a fresh
    /// estimation run
    pub fn reset(&mut self) {
        let weight = 1.0 / self.cells.len() as f64;
        for cell in &mut self.cells {
            cell.weight = weight;
            cell.filter_mean = 0.0;
            cell.filter_variance = 1.0;
        }
    }

    /// Bayesian update for one measurement event.
    ///
    /// For every cell the filter's prior mean is propagated through the
    /// deterministic decay-plus-dose model over the step `[a, b]`, the
    /// variance through the squared decay plus the combined process variance,
    /// and the posterior weight is multiplied by the evidence of the
    /// innovation. Weights are renormalized to sum to 1 afterwards.
    ///
    /// # Arguments
    ///
    /// * `a`, `b` - The simulation step that ended at the measurement time
    /// * `window` - Active pulse window of the current dosing interval
    /// * `dose` - Infusion rate during the pulse
    /// * `observation` - Noisy measured concentration
    /// * `process_variance` - Combined process variance accumulated by the
    ///   simulator over the step
    /// * `rng` - Noise source for the [`WeightUpdate::Sampled`] strategy
    ///
    /// # Errors
    ///
    /// [`EstimationError::DegenerateWeights`] if the raw weight total is zero
    /// or non-finite, [`EstimationError::NonFiniteFilterState`] if a cell's
    /// filter state leaves the finite range.
    #[allow(clippy::too_many_arguments)]
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        a: f64,
        b: f64,
        window: (f64, f64),
        dose: f64,
        observation: f64,
        process_variance: f64,
        rng: &mut R,
    ) -> Result<(), EstimationError> {
        let dt = b - a;
        let ncols = self.v_slopes.len();
        let mut total = 0.0;

        for (idx, cell) in self.cells.iter_mut().enumerate() {
            let k = cell.patient.k_el();
            let gain = infusion_response(a, b, window.0, window.1, k)?;

            let predicted_mean = (-k * dt).exp() * cell.filter_mean + dose * gain;
            let predicted_var = (-2.0 * k * dt).exp() * cell.filter_variance + process_variance;

            // Unit measurement-noise variance
            let innovation_var = predicted_var + 1.0;
            let innovation = observation - predicted_mean;

            let post_var = predicted_var - predicted_var.powi(2) / innovation_var;
            let post_mean = predicted_mean + post_var * innovation;

            if !post_mean.is_finite() || !post_var.is_finite() {
                return Err(EstimationError::NonFiniteFilterState {
                    row: idx / ncols,
                    col: idx % ncols,
                });
            }

            let evidence = match self.weight_update {
                WeightUpdate::Likelihood => {
                    (-(innovation * innovation) / (2.0 * innovation_var)).exp()
                        / (2.0 * std::f64::consts::PI * innovation_var).sqrt()
                }
                WeightUpdate::Sampled => Normal::new(innovation, 1.0)?.sample(rng),
            };

            cell.filter_mean = post_mean;
            cell.filter_variance = post_var;
            cell.weight *= evidence;
            total += cell.weight;
        }

        if total == 0.0 || !total.is_finite() {
            return Err(EstimationError::DegenerateWeights { total });
        }
        for cell in &mut self.cells {
            cell.weight /= total;
        }

        tracing::debug!(observation, total, "hypothesis bank updated");
        Ok(())
    }
}

impl Index<(usize, usize)> for HypothesisGrid {
    type Output = HypothesisCell;

    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        &self.cells[i * self.v_slopes.len() + j]
    }
}

impl IndexMut<(usize, usize)> for HypothesisGrid {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        let ncols = self.v_slopes.len();
        &mut self.cells[i * ncols + j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reference() -> Patient {
        // k_int 0 and cl_cr 1 make k_el equal the k_slope candidate directly
        Patient::new(0.1, 0.0, 1.0, 10.0, 1.0).unwrap()
    }

    fn grid_3x3() -> HypothesisGrid {
        HypothesisGrid::new(
            vec![0.05, 0.1, 0.2],
            vec![5.0, 10.0, 20.0],
            &reference(),
        )
        .unwrap()
    }

    #[test]
    fn initializes_uniform() {
        let grid = grid_3x3();
        assert_eq!(grid.shape(), (3, 3));
        for cell in grid.cells() {
            assert_relative_eq!(cell.weight, 1.0 / 9.0);
            assert_eq!(cell.filter_mean, 0.0);
            assert_eq!(cell.filter_variance, 1.0);
        }
    }

    #[test]
    fn weights_sum_to_one_after_update() {
        let mut rng = StdRng::seed_from_u64(7);
        for strategy in [WeightUpdate::Likelihood, WeightUpdate::Sampled] {
            let mut grid = grid_3x3().with_weight_update(strategy);
            for obs in [4.2, 3.1, 1.9] {
                grid.update(0.9, 1.0, (0.0, 1.0), 50.0, obs, 1.3, &mut rng)
                    .unwrap();
                let total: f64 = grid.weights().iter().sum();
                assert_relative_eq!(total, 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn non_finite_observation_is_degenerate() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid = grid_3x3();
        let result = grid.update(0.9, 1.0, (0.0, 1.0), 50.0, f64::NAN, 1.3, &mut rng);
        assert!(matches!(
            result,
            Err(EstimationError::NonFiniteFilterState { .. })
                | Err(EstimationError::DegenerateWeights { .. })
        ));
    }

    #[test]
    fn likelihood_update_prefers_the_matching_hypothesis() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid =
            HypothesisGrid::new(vec![0.05, 0.1, 0.2], vec![10.0], &reference()).unwrap();

        // Observation manufactured to match the middle hypothesis exactly:
        // propagate a zero prior mean over [0, 10] with a pulse on [0, 1]
        let dose = 10.0;
        let target_k = 0.1;
        let observation =
            dose * infusion_response(0.0, 10.0, 0.0, 1.0, target_k).unwrap();

        grid.update(0.0, 10.0, (0.0, 1.0), dose, observation, 0.01, &mut rng)
            .unwrap();

        let ((row, _), _) = grid.posterior_mode();
        assert_eq!(row, 1);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid = grid_3x3();
        grid.update(0.9, 1.0, (0.0, 1.0), 50.0, 4.2, 1.3, &mut rng)
            .unwrap();
        grid.reset();
        assert_eq!(grid, grid_3x3());
    }
}
