//! Money Flow Index (MFI).
//!
//! Volume-weighted RSI over typical price.
//! Raw money flow = typical_price * volume, classed positive when typical price
//! rose versus the previous bar and negative when it fell.
//! MFI = 100 - 100 / (1 + positive_sum / negative_sum) over `period` bars.
//! Lookback: period.
//! Edge cases: negative_sum == 0 → 100; positive_sum == 0 → 0; both zero → 50.

use super::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    name: String,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "MFI period must be >= 1");
        Self {
            period,
            name: format!("mfi_{period}"),
        }
    }
}

impl Indicator for Mfi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        if n < self.period + 1 {
            return result;
        }

        // (positive, negative) flow per bar; index 0 has no predecessor.
        let mut flows = vec![(f64::NAN, f64::NAN); n];
        for i in 1..n {
            let tp = bars[i].typical_price();
            let prev_tp = bars[i - 1].typical_price();
            let raw = tp * bars[i].volume;
            if raw.is_nan() || prev_tp.is_nan() {
                continue;
            }
            flows[i] = if tp > prev_tp {
                (raw, 0.0)
            } else if tp < prev_tp {
                (0.0, raw)
            } else {
                (0.0, 0.0)
            };
        }

        for i in self.period..n {
            let window = &flows[i + 1 - self.period..=i];
            if window.iter().any(|(p, m)| p.is_nan() || m.is_nan()) {
                continue;
            }
            let positive: f64 = window.iter().map(|(p, _)| p).sum();
            let negative: f64 = window.iter().map(|(_, m)| m).sum();
            result[i] = money_flow_index(positive, negative);
        }

        result
    }
}

fn money_flow_index(positive: f64, negative: f64) -> f64 {
    if positive == 0.0 && negative == 0.0 {
        50.0
    } else if negative == 0.0 {
        100.0
    } else if positive == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + positive / negative)
    }
}
