//! Indicator provider and concrete indicator implementations.
//!
//! Every indicator implements the `Indicator` trait. They are computed once
//! over a bar history and read back per bar by `IndicatorProvider`, which
//! assembles the `IndicatorSnapshot`s the detectors and risk manager consume.
//!
//! Multi-series indicators (DMI, stochastic) are exposed as separate named
//! instances per line, keeping the single-series `Indicator` trait unchanged.

pub mod atr;
pub mod cci;
pub mod dmi;
pub mod indicator;
pub mod mfi;
pub mod provider;
pub mod rolling;
pub mod stochastic;

pub use atr::Atr;
pub use cci::Cci;
pub use dmi::{Dmi, DmiLine, DmiSeries};
pub use indicator::{Indicator, IndicatorValues};
pub use mfi::Mfi;
pub use provider::{IndicatorConfig, IndicatorProvider, ZoneConfig};
pub use stochastic::{Stochastic, StochasticLine};

#[cfg(test)]
fn test_time(i: usize) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                time: test_time(i),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Create bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            symbol: "TEST".to_string(),
            time: test_time(i),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
