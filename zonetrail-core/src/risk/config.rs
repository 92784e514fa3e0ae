//! Risk manager configuration.

use serde::{Deserialize, Serialize};

use crate::config::{non_negative, ordered, ConfigError};
use crate::domain::OscillatorKind;

/// An oscillator watched for inversion and the tightening it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedOscillator {
    pub kind: OscillatorKind,
    /// Trailing-width reduction (percentage points) applied when this
    /// oscillator alone inverts.
    pub adjust_percent: f64,
}

impl TrackedOscillator {
    pub fn new(kind: OscillatorKind, adjust_percent: f64) -> Self {
        Self {
            kind,
            adjust_percent,
        }
    }
}

/// Trailing-stop widths, inversion escalation and early-exit policy.
///
/// All percentages are in percent of price (2.5 = 2.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Initial width for positions opened with the trend.
    pub trend_trailing_percent: f64,
    /// Initial width for positions opened against the trend.
    pub counter_trend_trailing_percent: f64,
    /// Initial width when the trend is unclassified.
    pub default_trailing_percent: f64,
    /// Floor for the trailing width. Adjustments never go below it.
    pub min_trailing_percent: f64,
    /// Ceiling for the initial width.
    pub max_trailing_percent: f64,
    /// Scale the initial width by `volatility_percent / volatility_reference_percent`.
    pub use_volatility_scaling: bool,
    pub volatility_reference_percent: f64,
    pub tracked: Vec<TrackedOscillator>,
    /// Width reduction applied once when every tracked oscillator is inverted.
    pub full_inverse_adjust_percent: f64,
    /// Cap on the total accepted width reduction over a position's life.
    pub max_cumulative_adjust_percent: f64,
    /// Inverted oscillators needed for `PartialInverse`.
    pub partial_inverse_count: usize,
    /// Inverted oscillators needed for `FullInverse`; `None` means all tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_inverse_count: Option<usize>,
    pub min_profit_for_early_exit: f64,
    pub early_exit_on_full_inverse: bool,
    pub early_exit_on_directional_flip: bool,
    /// Adjustment records kept in history; oldest are dropped first.
    pub history_limit: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            trend_trailing_percent: 2.5,
            counter_trend_trailing_percent: 1.5,
            default_trailing_percent: 2.0,
            min_trailing_percent: 0.5,
            max_trailing_percent: 5.0,
            use_volatility_scaling: false,
            volatility_reference_percent: 2.0,
            tracked: vec![
                TrackedOscillator::new(OscillatorKind::StochasticK, 0.2),
                TrackedOscillator::new(OscillatorKind::StochasticD, 0.2),
                TrackedOscillator::new(OscillatorKind::MoneyFlow, 0.3),
                TrackedOscillator::new(OscillatorKind::CommodityChannel, 0.3),
            ],
            full_inverse_adjust_percent: 0.8,
            max_cumulative_adjust_percent: 1.5,
            partial_inverse_count: 1,
            full_inverse_count: None,
            min_profit_for_early_exit: 0.5,
            early_exit_on_full_inverse: true,
            early_exit_on_directional_flip: false,
            history_limit: 256,
        }
    }
}

impl RiskConfig {
    /// Inverted-oscillator count at which monitoring reaches `FullInverse`.
    pub fn resolved_full_inverse_count(&self) -> usize {
        self.full_inverse_count.unwrap_or(self.tracked.len())
    }

    /// Configured reduction for `kind`, 0 if it is not tracked.
    pub fn adjust_percent(&self, kind: OscillatorKind) -> f64 {
        self.tracked
            .iter()
            .find(|t| t.kind == kind)
            .map_or(0.0, |t| t.adjust_percent)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("risk.trend_trailing_percent", self.trend_trailing_percent)?;
        non_negative(
            "risk.counter_trend_trailing_percent",
            self.counter_trend_trailing_percent,
        )?;
        non_negative("risk.default_trailing_percent", self.default_trailing_percent)?;
        non_negative("risk.min_trailing_percent", self.min_trailing_percent)?;
        ordered(
            "risk.trailing_percent",
            self.min_trailing_percent,
            self.max_trailing_percent,
        )?;
        if self.max_trailing_percent >= 100.0 {
            return Err(ConfigError::Invalid {
                field: "risk.max_trailing_percent".into(),
                reason: "must be below 100".into(),
            });
        }
        if self.use_volatility_scaling
            && !(self.volatility_reference_percent.is_finite()
                && self.volatility_reference_percent > 0.0)
        {
            return Err(ConfigError::Invalid {
                field: "risk.volatility_reference_percent".into(),
                reason: "must be finite and > 0 when scaling is enabled".into(),
            });
        }
        non_negative(
            "risk.full_inverse_adjust_percent",
            self.full_inverse_adjust_percent,
        )?;
        non_negative(
            "risk.max_cumulative_adjust_percent",
            self.max_cumulative_adjust_percent,
        )?;
        non_negative(
            "risk.min_profit_for_early_exit",
            self.min_profit_for_early_exit,
        )?;

        if self.tracked.is_empty() {
            return Err(ConfigError::Invalid {
                field: "risk.tracked".into(),
                reason: "at least one oscillator must be tracked".into(),
            });
        }
        for (i, tracked) in self.tracked.iter().enumerate() {
            non_negative(
                &format!("risk.tracked[{i}].adjust_percent"),
                tracked.adjust_percent,
            )?;
            if self.tracked[..i].iter().any(|t| t.kind == tracked.kind) {
                return Err(ConfigError::Invalid {
                    field: "risk.tracked".into(),
                    reason: format!("{} listed twice", tracked.kind),
                });
            }
        }

        let full = self.resolved_full_inverse_count();
        if self.partial_inverse_count == 0 {
            return Err(ConfigError::Invalid {
                field: "risk.partial_inverse_count".into(),
                reason: "must be >= 1".into(),
            });
        }
        if full < self.partial_inverse_count || full > self.tracked.len() {
            return Err(ConfigError::Invalid {
                field: "risk.full_inverse_count".into(),
                reason: format!(
                    "must be between partial_inverse_count ({}) and the tracked count ({}), got {full}",
                    self.partial_inverse_count,
                    self.tracked.len()
                ),
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "risk.history_limit".into(),
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }
}
