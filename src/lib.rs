//! Sequential Bayesian estimation of pharmacokinetic parameters with
//! closed-loop dose optimization.
//!
//! The crate tracks an unknown patient's elimination and distribution
//! parameters from noisy concentration measurements and picks infusion doses
//! that keep the predicted concentration inside a target peak/trough band.
//! Four pieces cooperate:
//!
//! * [`data`] — the immutable inputs: [`Patient`](data::Patient),
//!   [`ErrorModel`](data::ErrorModel), and
//!   [`TherapySchedule`](data::TherapySchedule)
//! * [`estimator`] — a fixed 2-D grid of parameter hypotheses, each with a
//!   posterior weight and a scalar Kalman filter, reweighted at every
//!   measurement
//! * [`simulator`] — the discrete-time stochastic forward simulator built on
//!   an analytical infusion response kernel
//! * [`optimize`] — the bisection dose search and the posterior-weighted
//!   bank-level initial dose
//!
//! All randomness is injected: every stochastic entry point takes
//! `&mut impl Rng`, so estimation runs are seedable and reproducible.
//!
//! # Example
//!
//! ```
//! use dosefit::prelude::*;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # fn main() -> Result<(), dosefit::DosefitError> {
//! let patient = Patient::new(0.003125, 0.01, 50.0, 0.2806, 70.0)?;
//! let grid = HypothesisGrid::new(
//!     vec![0.002, 0.003125, 0.004],
//!     vec![0.25, 0.2806, 0.31],
//!     &patient,
//! )?;
//! let errors = ErrorModel::noiseless();
//! let therapy = TherapySchedule::new(240.0, 12.0, 1.0, vec![1.0, 11.0, 73.0], 7.0, 1.5)?;
//!
//! let mut sim = Simulator::new(patient, grid, errors, therapy, 0.1, 1)?;
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! let initial = DoseOptimizer::new().initial_dose(&sim, &mut rng)?;
//! sim.run(initial.dose, 240.0, &mut rng)?;
//!
//! assert_eq!(sim.measurements().len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod estimator;
pub mod optimize;
pub mod simulator;

pub use data::{ErrorModel, Patient, TherapySchedule};
pub use error::{ConfigError, DosefitError, EstimationError};
pub use estimator::{HypothesisCell, HypothesisGrid, WeightUpdate};
pub use optimize::{DoseOptimizer, DoseRange, DoseSearch, InitialDose};
pub use simulator::{MeasurementLog, SimulationTrace, Simulator};

pub mod prelude {
    pub use crate::data::{ErrorModel, Patient, TherapySchedule};
    pub use crate::error::{ConfigError, DosefitError, EstimationError};
    pub use crate::estimator::{HypothesisCell, HypothesisGrid, WeightUpdate};
    pub use crate::optimize::{DoseOptimizer, DoseRange, DoseSearch, InitialDose};
    pub use crate::simulator::{
        Measurement, MeasurementLog, Sample, SimulationTrace, Simulator,
    };
}
