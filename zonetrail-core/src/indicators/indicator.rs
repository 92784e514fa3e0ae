//! Indicator trait and precomputed indicator values container.
//!
//! Indicators are pure functions: bar history in, numeric series out.
//! They are computed once per bar history and read back by index when the
//! snapshots are assembled.

use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warm-up),
/// and a NaN input inside a window yields NaN output rather than a default.
///
/// No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Series name (e.g., "adx_14", "stoch_k_14_3").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Container for precomputed indicator series, keyed by indicator name.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the indicator value at a specific bar index.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    /// Value at `bar_index`, NaN when the series or index is missing.
    pub fn get_or_nan(&self, name: &str, bar_index: usize) -> f64 {
        self.get(name, bar_index).unwrap_or(f64::NAN)
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_values_insert_and_get() {
        let mut iv = IndicatorValues::new();
        iv.insert(
            "adx_14",
            vec![f64::NAN; 27]
                .into_iter()
                .chain(vec![21.0, 22.5])
                .collect(),
        );
        assert!(iv.get("adx_14", 0).unwrap().is_nan());
        assert_eq!(iv.get("adx_14", 27), Some(21.0));
        assert_eq!(iv.get("adx_14", 28), Some(22.5));
        assert_eq!(iv.get("adx_14", 29), None); // out of bounds
    }

    #[test]
    fn missing_series_reads_as_nan() {
        let iv = IndicatorValues::new();
        assert_eq!(iv.get("nonexistent", 0), None);
        assert!(iv.get_or_nan("nonexistent", 0).is_nan());
    }

    #[test]
    fn indicator_values_len() {
        let mut iv = IndicatorValues::new();
        assert!(iv.is_empty());
        iv.insert("mfi_14", vec![1.0, 2.0]);
        iv.insert("cci_20", vec![1.0, 2.0]);
        assert_eq!(iv.len(), 2);
    }
}
