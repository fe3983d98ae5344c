use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A therapy schedule: dosing cadence, measurement times, and the
/// peak/trough concentration targets the optimizer steers toward.
///
/// Validated at construction and immutable afterwards. Every dosing period
/// starts with an active pulse of `pulse_length` hours during which the dose
/// is infused at a constant rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapySchedule {
    duration: f64,
    period: f64,
    pulse_length: f64,
    measurement_times: Vec<f64>,
    peak: f64,
    trough: f64,
}

impl TherapySchedule {
    /// Create a new therapy schedule
    ///
    /// # Arguments
    ///
    /// * `duration` - Length of the therapeutic session in hours
    /// * `period` - Hours between the start of consecutive doses
    /// * `pulse_length` - Hours each dose is actively infused (at most `period`)
    /// * `measurement_times` - Sorted times at which concentration is measured,
    ///   all within `[0, duration]`
    /// * `peak` - Peak concentration target
    /// * `trough` - Trough concentration target (at most `peak`)
    pub fn new(
        duration: f64,
        period: f64,
        pulse_length: f64,
        measurement_times: Vec<f64>,
        peak: f64,
        trough: f64,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("duration", duration),
            ("dosage period", period),
            ("pulse length", pulse_length),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NonPositiveDuration { name, value });
            }
        }
        if pulse_length > period {
            return Err(ConfigError::PulseExceedsPeriod {
                pulse: pulse_length,
                period,
            });
        }
        if !(peak > 0.0) || !(trough > 0.0) || trough > peak {
            return Err(ConfigError::InvalidTargets { peak, trough });
        }
        if measurement_times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::UnsortedMeasurementTimes);
        }
        if let Some(&time) = measurement_times
            .iter()
            .find(|&&t| t < 0.0 || t > duration)
        {
            return Err(ConfigError::MeasurementOutOfRange { time, duration });
        }

        Ok(Self {
            duration,
            period,
            pulse_length,
            measurement_times,
            peak,
            trough,
        })
    }

    /// Length of the therapeutic session in hours
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Hours between the start of consecutive doses
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Hours each dose is actively infused
    pub fn pulse_length(&self) -> f64 {
        self.pulse_length
    }

    /// Configured measurement times
    pub fn measurement_times(&self) -> &[f64] {
        &self.measurement_times
    }

    /// Peak concentration target
    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Trough concentration target
    pub fn trough(&self) -> f64 {
        self.trough
    }

    /// The active infusion window of the given dosing interval
    pub fn pulse_window(&self, interval: usize) -> (f64, f64) {
        let start = self.period * interval as f64;
        (start, start + self.pulse_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_schedule(pulse: f64, peak: f64, trough: f64) -> Result<TherapySchedule, ConfigError> {
        TherapySchedule::new(240.0, 12.0, pulse, vec![1.0, 11.0, 73.0], peak, trough)
    }

    #[test]
    fn accepts_valid_schedule() {
        let schedule = base_schedule(1.0, 7.0, 1.5).unwrap();
        assert_eq!(schedule.pulse_window(0), (0.0, 1.0));
        assert_eq!(schedule.pulse_window(2), (24.0, 25.0));
    }

    #[test]
    fn rejects_pulse_longer_than_period() {
        assert!(matches!(
            base_schedule(13.0, 7.0, 1.5),
            Err(ConfigError::PulseExceedsPeriod { .. })
        ));
    }

    #[test]
    fn rejects_trough_above_peak() {
        assert!(matches!(
            base_schedule(1.0, 1.5, 7.0),
            Err(ConfigError::InvalidTargets { .. })
        ));
    }

    #[test]
    fn rejects_unsorted_measurement_times() {
        let result = TherapySchedule::new(240.0, 12.0, 1.0, vec![11.0, 1.0], 7.0, 1.5);
        assert!(matches!(result, Err(ConfigError::UnsortedMeasurementTimes)));
    }

    #[test]
    fn rejects_measurement_beyond_duration() {
        let result = TherapySchedule::new(10.0, 12.0, 1.0, vec![1.0, 11.0], 7.0, 1.5);
        assert!(matches!(
            result,
            Err(ConfigError::MeasurementOutOfRange { .. })
        ));
    }
}
