//! Rolling-window helpers shared by the oscillators.
//!
//! Every helper returns a series of the input's length. A window containing
//! NaN produces NaN; there is no skipping or substitution.

/// Mean over a trailing window of `period` values.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Maximum over a trailing window of `period` values.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Minimum over a trailing window of `period` values.
pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Mean absolute deviation from the window mean.
pub fn rolling_mean_deviation(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        w.iter().map(|v| (v - mean).abs()).sum::<f64>() / w.len() as f64
    })
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(window);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn mean_over_window() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(out[0].is_nan());
        assert_approx(out[1], 1.5, DEFAULT_EPSILON);
        assert_approx(out[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn max_min_over_window() {
        let v = [3.0, 1.0, 4.0, 1.0, 5.0];
        let hi = rolling_max(&v, 3);
        let lo = rolling_min(&v, 3);
        assert_approx(hi[2], 4.0, DEFAULT_EPSILON);
        assert_approx(lo[2], 1.0, DEFAULT_EPSILON);
        assert_approx(hi[4], 5.0, DEFAULT_EPSILON);
        assert_approx(lo[4], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn mean_deviation_matches_hand_value() {
        // mean = 2, deviations = 1, 0, 1 → 2/3
        let out = rolling_mean_deviation(&[1.0, 2.0, 3.0], 3);
        assert_approx(out[2], 2.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_in_window_yields_nan() {
        let out = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_approx(out[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn short_input_all_nan() {
        assert!(rolling_max(&[1.0], 3).iter().all(|v| v.is_nan()));
    }
}
