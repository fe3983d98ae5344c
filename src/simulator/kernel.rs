//! Analytical infusion response kernel.
//!
//! Closed-form solution for the drug amount contributed by one constant-rate
//! infusion pulse over an arbitrary step, used by both the forward simulator
//! and the filter bank's prediction step.

use crate::error::EstimationError;

/// Normalized drug amount present at time `b` that was delivered during the
/// overlap of the step `[a, b]` with the active pulse window
/// `[window_start, window_end]`, for a unit infusion rate and elimination
/// rate `k`.
///
/// The value is continuous in `b` across both window boundaries and covers
/// five time-ordered cases:
///
/// 1. `b <= window_start`: the pulse is entirely in the future, 0
/// 2. `a < window_start < b <= window_end`: `(1 - e^(-k(b - ws))) / k`
/// 3. `window_start <= a, b <= window_end`: `(1 - e^(-k(b - a))) / k`
/// 4. `a < window_end < b`: `(e^(-k(b - we)) - e^(-k(b - a))) / k`
/// 5. `a >= window_end`: the pulse is entirely in the past, 0
///
/// As `b - a` grows inside the pulse the response approaches `1/k`, the total
/// steady-state amount per unit rate.
///
/// # Errors
///
/// A non-positive or non-finite elimination rate is reported as an
/// [`EstimationError`], since it can reach the kernel mid-run.
pub fn infusion_response(
    a: f64,
    b: f64,
    window_start: f64,
    window_end: f64,
    k: f64,
) -> Result<f64, EstimationError> {
    if !(k > 0.0) || !k.is_finite() {
        return Err(EstimationError::NonPositiveElimination { value: k });
    }

    if b <= window_start || a >= window_end {
        return Ok(0.0);
    }

    // Infuse over the overlap, then decay the accumulated amount to b. The
    // single expression reproduces each interior case above.
    let lo = a.max(window_start);
    let hi = b.min(window_end);
    let infused = (1.0 - (-k * (hi - lo)).exp()) / k;

    Ok(infused * (-k * (b - hi)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const K: f64 = 0.1;
    const WINDOW: (f64, f64) = (12.0, 13.0);

    fn response(a: f64, b: f64) -> f64 {
        infusion_response(a, b, WINDOW.0, WINDOW.1, K).unwrap()
    }

    #[test]
    fn zero_outside_the_pulse() {
        assert_eq!(response(10.0, 11.0), 0.0);
        assert_eq!(response(13.0, 14.0), 0.0);
        assert_eq!(response(11.9, 12.0), 0.0);
    }

    #[test]
    fn matches_piecewise_forms_inside_the_pulse() {
        // Step straddling the window start
        let val = response(11.9, 12.5);
        assert_relative_eq!(val, (1.0 - (-K * 0.5).exp()) / K, epsilon = 1e-12);

        // Step fully inside the window
        let val = response(12.2, 12.6);
        assert_relative_eq!(val, (1.0 - (-K * 0.4).exp()) / K, epsilon = 1e-12);

        // Step straddling the window end
        let val = response(12.8, 13.4);
        let expected = ((-K * (13.4 - 13.0)).exp() - (-K * (13.4 - 12.8)).exp()) / K;
        assert_relative_eq!(val, expected, epsilon = 1e-12);
        assert!(val > 0.0);
    }

    #[test]
    fn continuous_across_window_start() {
        let eps = 1e-9;
        let below = response(11.5, WINDOW.0 - eps);
        let above = response(11.5, WINDOW.0 + eps);
        assert_relative_eq!(below, above, epsilon = 1e-7);
    }

    #[test]
    fn continuous_across_window_end() {
        let eps = 1e-9;
        let below = response(12.5, WINDOW.1 - eps);
        let above = response(12.5, WINDOW.1 + eps);
        assert_relative_eq!(below, above, max_relative = 1e-6);
    }

    #[test]
    fn continuous_when_step_spans_the_whole_pulse() {
        let eps = 1e-9;
        let inside = response(11.0, WINDOW.1 - eps);
        let spanning = response(11.0, WINDOW.1 + eps);
        assert_relative_eq!(inside, spanning, max_relative = 1e-6);
    }

    #[test]
    fn full_pulse_limit_is_one_over_k() {
        for k in [0.05, 0.1, 1.0] {
            let val = infusion_response(0.0, 1e6, 0.0, 1e7, k).unwrap();
            assert_relative_eq!(val, 1.0 / k, epsilon = 1e-9);
        }
    }

    #[test]
    fn rejects_non_positive_elimination() {
        assert!(matches!(
            infusion_response(0.0, 1.0, 0.0, 1.0, 0.0),
            Err(EstimationError::NonPositiveElimination { .. })
        ));
        assert!(matches!(
            infusion_response(0.0, 1.0, 0.0, 1.0, -0.1),
            Err(EstimationError::NonPositiveElimination { .. })
        ));
    }
}
