//! Stochastic oscillator (%K / %D).
//!
//! raw %K = 100 * (close - lowest_low) / (highest_high - lowest_low) over `k_period`
//! %K     = SMA(raw %K, k_smooth)
//! %D     = SMA(%K, d_period)
//!
//! A flat window (highest == lowest) reads 50, the midpoint, the same
//! convention RSI uses for a window with no movement.

use super::indicator::Indicator;
use super::rolling::{rolling_max, rolling_mean, rolling_min};
use crate::domain::Bar;

/// Which stochastic line to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    k_smooth: usize,
    d_period: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(k_period: usize, k_smooth: usize, d_period: usize, line: StochasticLine) -> Self {
        assert!(k_period >= 1, "stochastic k_period must be >= 1");
        assert!(k_smooth >= 1, "stochastic k_smooth must be >= 1");
        assert!(d_period >= 1, "stochastic d_period must be >= 1");
        let name = match line {
            StochasticLine::K => format!("stoch_k_{k_period}_{k_smooth}"),
            StochasticLine::D => format!("stoch_d_{k_period}_{k_smooth}_{d_period}"),
        };
        Self {
            k_period,
            k_smooth,
            d_period,
            line,
            name,
        }
    }

    pub fn k(k_period: usize, k_smooth: usize) -> Self {
        Self::new(k_period, k_smooth, 1, StochasticLine::K)
    }

    pub fn d(k_period: usize, k_smooth: usize, d_period: usize) -> Self {
        Self::new(k_period, k_smooth, d_period, StochasticLine::D)
    }

    /// Smoothed %K and %D together.
    pub fn compute_both(
        k_period: usize,
        k_smooth: usize,
        d_period: usize,
        bars: &[Bar],
    ) -> (Vec<f64>, Vec<f64>) {
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let hh = rolling_max(&highs, k_period);
        let ll = rolling_min(&lows, k_period);

        let raw: Vec<f64> = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let range = hh[i] - ll[i];
                if range.is_nan() || bar.close.is_nan() {
                    f64::NAN
                } else if range == 0.0 {
                    50.0
                } else {
                    100.0 * (bar.close - ll[i]) / range
                }
            })
            .collect();

        let k = rolling_mean(&raw, k_smooth);
        let d = rolling_mean(&k, d_period);
        (k, d)
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        let k = (self.k_period - 1) + (self.k_smooth - 1);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => k + (self.d_period - 1),
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (k, d) = Self::compute_both(self.k_period, self.k_smooth, self.d_period, bars);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => d,
        }
    }
}
