//! Run state recorded by the simulator: the concentration trace, the
//! measurement log, and the dosing bookkeeping.

use serde::{Deserialize, Serialize};

/// One simulated sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Simulated time in hours
    pub time: f64,
    /// Drug amount in the body
    pub amount: f64,
    /// Drug concentration (amount over distribution volume)
    pub concentration: f64,
}

/// Ordered sequence of `(time, amount, concentration)` samples.
///
/// Strictly increasing in time, seeded with `(0, 0, 0)`, and append-only
/// during a run. [`SimulationTrace::reset`] restores the initial singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    samples: Vec<Sample>,
}

impl Default for SimulationTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationTrace {
    /// A fresh trace holding only the initial `(0, 0, 0)` sample
    pub fn new() -> Self {
        Self {
            samples: vec![Sample {
                time: 0.0,
                amount: 0.0,
                concentration: 0.0,
            }],
        }
    }

    pub(crate) fn push(&mut self, time: f64, amount: f64, concentration: f64) {
        debug_assert!(time > self.last_time(), "trace times must increase");
        self.samples.push(Sample {
            time,
            amount,
            concentration,
        });
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// All recorded samples, in time order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// A trace is never empty; it always holds the initial sample
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Time of the most recent sample
    pub fn last_time(&self) -> f64 {
        self.samples.last().map(|s| s.time).unwrap_or(0.0)
    }

    /// Amount of the most recent sample
    pub fn last_amount(&self) -> f64 {
        self.samples.last().map(|s| s.amount).unwrap_or(0.0)
    }

    /// Concentration of the most recent sample
    pub fn last_concentration(&self) -> f64 {
        self.samples.last().map(|s| s.concentration).unwrap_or(0.0)
    }

    /// Concentration at an exact recorded time, if the stepping grid landed
    /// on it
    pub fn concentration_at(&self, time: f64) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.time == time)
            .map(|s| s.concentration)
    }
}

/// One noisy concentration observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Time the measurement was taken
    pub time: f64,
    /// Observed concentration, including measurement noise
    pub value: f64,
}

/// Ordered log of noisy concentration observations, one per configured
/// measurement time reached by the simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementLog {
    measurements: Vec<Measurement>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, time: f64, value: f64) {
        self.measurements.push(Measurement { time, value });
    }

    pub(crate) fn reset(&mut self) {
        self.measurements.clear();
    }

    /// All recorded measurements, in time order
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Dosing bookkeeping: the current dosing-interval index and the per-interval
/// dosage-noise cache.
///
/// The interval index is monotonically non-decreasing. One noise sample is
/// drawn lazily on first entry into each interval and reused for every step
/// inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DosingState {
    interval: usize,
    dose_noise: Vec<f64>,
}

impl DosingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.interval = 0;
        self.dose_noise.clear();
    }

    /// Current dosing-interval index
    pub fn interval(&self) -> usize {
        self.interval
    }

    pub(crate) fn advance(&mut self) {
        self.interval += 1;
    }

    /// Whether the current interval still needs its noise draw
    pub(crate) fn needs_noise_draw(&self) -> bool {
        self.dose_noise.len() == self.interval
    }

    pub(crate) fn cache_noise(&mut self, sample: f64) {
        debug_assert!(self.needs_noise_draw());
        self.dose_noise.push(sample);
    }

    /// Cached noise sample for the current interval
    pub(crate) fn current_noise(&self) -> f64 {
        self.dose_noise.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_starts_at_origin() {
        let trace = SimulationTrace::new();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.last_time(), 0.0);
        assert_eq!(trace.concentration_at(0.0), Some(0.0));
    }

    #[test]
    fn reset_restores_initial_singleton() {
        let mut trace = SimulationTrace::new();
        trace.push(0.1, 5.0, 0.25);
        trace.push(0.2, 4.9, 0.245);
        trace.reset();
        assert_eq!(trace, SimulationTrace::new());
    }

    #[test]
    fn dosing_state_draws_once_per_interval() {
        let mut dosing = DosingState::new();
        assert!(dosing.needs_noise_draw());
        dosing.cache_noise(0.3);
        assert!(!dosing.needs_noise_draw());
        assert_eq!(dosing.current_noise(), 0.3);

        dosing.advance();
        assert!(dosing.needs_noise_draw());
    }
}
