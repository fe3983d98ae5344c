//! Error types for the estimation core.
//!
//! Two distinct failure families are kept apart: [`ConfigError`] covers
//! everything that can be rejected before a simulation starts, while
//! [`EstimationError`] covers numerical degeneracies that can only arise
//! mid-run. Non-convergence of the dose search is deliberately not an error;
//! it is reported through [`DoseSearch`](crate::optimize::DoseSearch).

use thiserror::Error;

/// Top-level error type for the crate
#[derive(Error, Debug, Clone)]
pub enum DosefitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),
}

/// Configuration errors, all detectable before a simulation starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Derived elimination rate must be strictly positive
    #[error("Non-positive elimination rate: {value} (k_int + k_slope * cl_cr)")]
    NonPositiveEliminationRate { value: f64 },

    /// Derived distribution volume must be strictly positive
    #[error("Non-positive distribution volume: {value} (v_slope * bw)")]
    NonPositiveDistributionVolume { value: f64 },

    /// Error-model variances must be non-negative
    #[error("Negative variance for {name}: {value}")]
    NegativeVariance { name: &'static str, value: f64 },

    /// Therapy durations must be strictly positive
    #[error("Non-positive {name}: {value}")]
    NonPositiveDuration { name: &'static str, value: f64 },

    /// The dosing pulse cannot outlast the dosing period
    #[error("Dosage pulse length {pulse} exceeds dosage period {period}")]
    PulseExceedsPeriod { pulse: f64, period: f64 },

    /// Concentration targets must be positive with trough at or below peak
    #[error("Invalid concentration targets: peak {peak}, trough {trough}")]
    InvalidTargets { peak: f64, trough: f64 },

    /// Measurement times must be sorted and strictly increasing
    #[error("Measurement times must be sorted and strictly increasing")]
    UnsortedMeasurementTimes,

    /// Measurement times must lie within the therapy duration
    #[error("Measurement time {time} outside therapy duration [0, {duration}]")]
    MeasurementOutOfRange { time: f64, duration: f64 },

    /// The simulator step size must be strictly positive
    #[error("Non-positive step size: {value}")]
    NonPositiveStepSize { value: f64 },

    /// A step size that rounds to zero at the configured precision would
    /// stall the stepping loop
    #[error("Step size {step} vanishes at {precision} decimal digits")]
    StepBelowPrecision { step: f64, precision: u32 },

    /// A time that the stepping grid can never land on exactly
    #[error("Time {time} does not lie on the step grid (step {step})")]
    TimeOffGrid { time: f64, step: f64 },

    /// The dose search range must be non-empty and non-negative
    #[error("Invalid dose range [{min}, {max}]")]
    InvalidDoseRange { min: f64, max: f64 },

    /// The hypothesis grid needs at least one candidate per axis
    #[error("Hypothesis grid must have at least one candidate on each axis")]
    EmptyGrid,
}

/// Numerical degeneracies that can arise mid-run, reported distinctly from
/// configuration errors
#[derive(Error, Debug, Clone)]
pub enum EstimationError {
    /// The response kernel was reached with a non-positive or non-finite
    /// elimination rate
    #[error("Elimination rate {value} reached the response kernel")]
    NonPositiveElimination { value: f64 },

    /// Weight renormalization failed because the raw total was zero or
    /// non-finite
    #[error("Degenerate hypothesis weights: raw total {total}")]
    DegenerateWeights { total: f64 },

    /// A cell's filter state left the finite range
    #[error("Non-finite filter state in hypothesis cell ({row}, {col})")]
    NonFiniteFilterState { row: usize, col: usize },

    /// A noise distribution could not be constructed
    #[error("Invalid noise distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),
}
