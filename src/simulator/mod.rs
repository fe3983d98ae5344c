//! Discrete-time stochastic forward simulator.
//!
//! Advances the true patient state through fixed time steps, injecting dosing
//! noise and recording concentration samples. At each configured measurement
//! time a noisy observation is logged and the hypothesis bank is updated.
//! Times are rounded to a configured decimal precision after every step so
//! that floating-point drift can never cause a missed measurement.

pub mod kernel;
pub mod trace;

pub use trace::{DosingState, Measurement, MeasurementLog, Sample, SimulationTrace};

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::{ErrorModel, Patient, TherapySchedule};
use crate::error::{ConfigError, DosefitError, EstimationError};
use crate::estimator::HypothesisGrid;
use kernel::infusion_response;

/// Round a time to the given number of decimal digits
pub(crate) fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Draw one zero-mean Gaussian sample with the given variance
fn draw_noise<R: Rng + ?Sized>(variance: f64, rng: &mut R) -> Result<f64, EstimationError> {
    if variance == 0.0 {
        return Ok(0.0);
    }
    Ok(Normal::new(0.0, variance.sqrt())?.sample(rng))
}

/// The mutable state of one simulation run: trace, measurement log, and
/// dosing bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Simulated `(time, amount, concentration)` samples
    pub trace: SimulationTrace,
    /// Noisy observations recorded at measurement times
    pub measurements: MeasurementLog,
    /// Dosing-interval index and noise cache
    pub dosing: DosingState,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            trace: SimulationTrace::new(),
            measurements: MeasurementLog::new(),
            dosing: DosingState::new(),
        }
    }

    fn reset(&mut self) {
        self.trace.reset();
        self.measurements.reset();
        self.dosing.reset();
    }
}

/// What one advance of the stepping loop produced, as needed by the
/// measurement handling that follows it
struct StepOutcome {
    a: f64,
    b: f64,
    window: (f64, f64),
    combined_variance: f64,
}

/// Stochastic simulator of a single patient under a therapy schedule.
///
/// Owns the persistent run state and the hypothesis bank being calibrated.
/// [`Simulator::run`] advances the persistent state and drives bank updates;
/// [`Simulator::trial`] performs a disposable run against a candidate patient
/// without touching either.
#[derive(Debug, Clone)]
pub struct Simulator {
    patient: Patient,
    grid: HypothesisGrid,
    errors: ErrorModel,
    therapy: TherapySchedule,
    step_size: f64,
    precision: u32,
    state: RunState,
}

impl Simulator {
    /// Create a new simulator.
    ///
    /// # Arguments
    ///
    /// * `patient` - The true patient being simulated
    /// * `grid` - Hypothesis bank calibrated from the measurements
    /// * `errors` - Noise variances
    /// * `therapy` - Dosing cadence, measurement times, and targets
    /// * `step_size` - Time step in hours
    /// * `precision` - Decimal digits times are rounded to after each step
    ///
    /// # Errors
    ///
    /// Fails fast on a non-positive step size, a step size that vanishes at
    /// the configured precision, or any measurement time the stepping grid
    /// can never land on exactly.
    pub fn new(
        patient: Patient,
        grid: HypothesisGrid,
        errors: ErrorModel,
        therapy: TherapySchedule,
        step_size: f64,
        precision: u32,
    ) -> Result<Self, ConfigError> {
        if !(step_size > 0.0) || !step_size.is_finite() {
            return Err(ConfigError::NonPositiveStepSize { value: step_size });
        }
        if round_to(step_size, precision) <= 0.0 {
            return Err(ConfigError::StepBelowPrecision {
                step: step_size,
                precision,
            });
        }

        // Walk the exact lattice the stepping loop will produce and require
        // every measurement time to appear on it.
        let times = therapy.measurement_times();
        let mut idx = 0;
        let mut t = 0.0;
        while t < therapy.duration() && idx < times.len() {
            t = round_to(t + step_size, precision);
            if t == times[idx] {
                idx += 1;
            } else if t > times[idx] {
                break;
            }
        }
        if idx < times.len() {
            return Err(ConfigError::TimeOffGrid {
                time: times[idx],
                step: step_size,
            });
        }

        Ok(Self {
            patient,
            grid,
            errors,
            therapy,
            step_size,
            precision,
            state: RunState::new(),
        })
    }

    /// The true patient being simulated
    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    /// The hypothesis bank
    pub fn grid(&self) -> &HypothesisGrid {
        &self.grid
    }

    /// Mutable access to the hypothesis bank, e.g. to reset it for a fresh
    /// estimation run
    pub fn grid_mut(&mut self) -> &mut HypothesisGrid {
        &mut self.grid
    }

    /// The therapy schedule
    pub fn therapy(&self) -> &TherapySchedule {
        &self.therapy
    }

    /// The noise configuration
    pub fn errors(&self) -> &ErrorModel {
        &self.errors
    }

    /// Time step in hours
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Decimal rounding precision of the time lattice
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// The persistent run state
    pub fn run_state(&self) -> &RunState {
        &self.state
    }

    /// The persistent simulation trace
    pub fn trace(&self) -> &SimulationTrace {
        &self.state.trace
    }

    /// The persistent measurement log
    pub fn measurements(&self) -> &MeasurementLog {
        &self.state.measurements
    }

    /// Restore trace, measurement log, and dosing state to their initial
    /// values. The hypothesis bank is left untouched; reset it separately
    /// when starting a fresh estimation run.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Advance the persistent simulation until its time reaches `stop_time`.
    ///
    /// Appends to the persistent trace, records a noisy observation at every
    /// configured measurement time reached, and updates the hypothesis bank
    /// with each observation.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        dose: f64,
        stop_time: f64,
        rng: &mut R,
    ) -> Result<(), DosefitError> {
        while self.state.trace.last_time() < stop_time {
            let out = advance_step(
                &self.therapy,
                &self.errors,
                &self.patient,
                dose,
                self.step_size,
                self.precision,
                &mut self.state,
                rng,
            )?;

            let times = self.therapy.measurement_times();
            let next = self.state.measurements.len();
            if next < times.len() && out.b == times[next] {
                let noise = draw_noise(self.errors.measurement(), rng)?;
                let observed = self.state.trace.last_concentration() + noise;
                self.state.measurements.push(out.b, observed);
                self.grid.update(
                    out.a,
                    out.b,
                    out.window,
                    dose,
                    observed,
                    out.combined_variance,
                    rng,
                )?;
            }
        }
        Ok(())
    }

    /// Run one disposable simulation of a candidate patient at a trial dose.
    ///
    /// Simulates into a local state and returns the trace. The persistent
    /// trace, measurement log, dosing state, and hypothesis bank are not
    /// touched; this is the dose optimizer's probe primitive.
    pub fn trial<R: Rng + ?Sized>(
        &self,
        patient: &Patient,
        dose: f64,
        stop_time: f64,
        rng: &mut R,
    ) -> Result<SimulationTrace, DosefitError> {
        let mut state = RunState::new();
        while state.trace.last_time() < stop_time {
            advance_step(
                &self.therapy,
                &self.errors,
                patient,
                dose,
                self.step_size,
                self.precision,
                &mut state,
                rng,
            )?;
        }
        Ok(state.trace)
    }
}

/// Advance one time step: update the dosing interval, draw any pending
/// interval noise, and append the next sample to the trace.
#[allow(clippy::too_many_arguments)]
fn advance_step<R: Rng + ?Sized>(
    therapy: &TherapySchedule,
    errors: &ErrorModel,
    patient: &Patient,
    dose: f64,
    step_size: f64,
    precision: u32,
    state: &mut RunState,
    rng: &mut R,
) -> Result<StepOutcome, EstimationError> {
    let a = state.trace.last_time();
    let b = round_to(a + step_size, precision);
    let k = patient.k_el();
    let dt = b - a;

    if a > therapy.period() * state.dosing.interval() as f64 + therapy.pulse_length() {
        state.dosing.advance();
    }
    if state.dosing.needs_noise_draw() {
        let sample = draw_noise(errors.dosage(), rng)?;
        state.dosing.cache_noise(sample);
    }

    let window = therapy.pulse_window(state.dosing.interval());
    let loss = (-k * dt).exp();
    let gain = dose * infusion_response(a, b, window.0, window.1, k)?;

    // Stationary process-noise magnitude of the decay over this step; feeds
    // the filter's combined process variance at measurement events.
    let process_noise = ((1.0 - (-2.0 * k * dt).exp()) / (2.0 * k)).sqrt();
    let dose_term = gain * state.dosing.current_noise();

    let w2 = draw_noise(errors.dosage(), rng)?;
    let w3 = draw_noise(errors.dosage_timing(), rng)?;

    let amount = state.trace.last_amount() * loss + gain + dose_term * w2 + w3;
    state.trace.push(b, amount, amount / patient.v_d());

    Ok(StepOutcome {
        a,
        b,
        window,
        combined_variance: process_noise + dose_term + 1.0,
    })
}
