//! Commodity Channel Index (CCI).
//!
//! CCI = (TP - SMA(TP, period)) / (0.015 * mean_deviation(TP, period))
//! where TP is the typical price. A window with zero deviation reads 0.
//! Lookback: period - 1.

use super::indicator::Indicator;
use super::rolling::{rolling_mean, rolling_mean_deviation};
use crate::domain::Bar;

/// Lambert's constant: scales CCI so most readings fall within ±100.
const CCI_SCALE: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Cci {
    period: usize,
    name: String,
}

impl Cci {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "CCI period must be >= 1");
        Self {
            period,
            name: format!("cci_{period}"),
        }
    }
}

impl Indicator for Cci {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let tp: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
        let mean = rolling_mean(&tp, self.period);
        let deviation = rolling_mean_deviation(&tp, self.period);

        tp.iter()
            .zip(mean.iter().zip(&deviation))
            .map(|(&tp, (&mean, &dev))| {
                if tp.is_nan() || mean.is_nan() || dev.is_nan() {
                    f64::NAN
                } else if dev == 0.0 {
                    0.0
                } else {
                    (tp - mean) / (CCI_SCALE * dev)
                }
            })
            .collect()
    }
}
