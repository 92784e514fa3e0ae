//! Detector configuration: polarity, edge constraints, gate rules and recheck offsets.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{non_negative, ordered, ConfigError};
use crate::domain::Side;

/// Largest recheck offset, in bars after the crossover.
pub const MAX_RECHECK_LAG: usize = 6;

/// Polarity of the crossover a detector looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    /// Momentum rises through average strength.
    Rising,
    /// Momentum falls back below average strength after being above it.
    Respiration,
}

impl fmt::Display for DetectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorMode::Rising => write!(f, "rising"),
            DetectorMode::Respiration => write!(f, "respiration"),
        }
    }
}

/// Independently toggleable threshold rules. A gate passes when every enabled
/// rule passes; a NaN operand fails its rule.
///
/// "Superior" is the directional line on the crossover's side (+DI for Long,
/// -DI for Short); "inferior" is the other one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub use_min_momentum: bool,
    pub min_momentum: f64,
    pub use_min_strength: bool,
    pub min_strength: f64,
    pub use_max_strength: bool,
    pub max_strength: f64,
    /// Momentum strictly above the inferior line.
    pub use_momentum_above_inferior: bool,
    /// Average strength strictly below the superior line.
    pub use_strength_below_superior: bool,
    /// Average strength strictly above the inferior line.
    pub use_strength_above_inferior: bool,
    pub use_min_gap: bool,
    pub min_gap: f64,
    pub use_max_gap: bool,
    pub max_gap: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            use_min_momentum: false,
            min_momentum: 20.0,
            use_min_strength: false,
            min_strength: 20.0,
            use_max_strength: false,
            max_strength: 50.0,
            use_momentum_above_inferior: false,
            use_strength_below_superior: false,
            use_strength_above_inferior: false,
            use_min_gap: false,
            min_gap: 5.0,
            use_max_gap: false,
            max_gap: 10.0,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("gate.min_momentum", self.min_momentum)?;
        non_negative("gate.min_strength", self.min_strength)?;
        non_negative("gate.max_strength", self.max_strength)?;
        non_negative("gate.min_gap", self.min_gap)?;
        non_negative("gate.max_gap", self.max_gap)?;
        if self.use_min_strength && self.use_max_strength {
            ordered("gate.strength", self.min_strength, self.max_strength)?;
        }
        if self.use_min_gap && self.use_max_gap {
            ordered("gate.gap", self.min_gap, self.max_gap)?;
        }
        Ok(())
    }
}

/// Configuration of one `LaggedCrossoverDetector` instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Label carried on every emitted event.
    pub name: String,
    pub mode: DetectorMode,
    /// Restrict this instance to one side; `None` detects both.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_side: Option<Side>,
    /// Tolerance on the non-strict side of the edge test.
    pub epsilon: f64,
    pub require_momentum_rising: bool,
    pub require_strength_rising: bool,
    pub gate: GateConfig,
    /// `use_recheck[n - 1]` enables the recheck `n` bars after the crossover.
    pub use_recheck: [bool; MAX_RECHECK_LAG],
    /// At recheck time the DI context must still match the crossover side.
    pub recheck_require_context_side: bool,
    /// At recheck time momentum must still be on the crossed side of average
    /// strength (above for `Rising`, below for `Respiration`).
    pub recheck_require_momentum_above_strength: bool,
    /// An integrity failure drops every pending recheck of the same crossover.
    pub recheck_cancel_siblings_on_flip: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::crossover()
    }
}

impl DetectorConfig {
    /// Rising-momentum preset: floor on momentum, ceiling on average strength,
    /// momentum above the inferior line and a minimum gap, with three rechecks.
    pub fn crossover() -> Self {
        Self {
            name: "crossover".into(),
            mode: DetectorMode::Rising,
            allowed_side: None,
            epsilon: 0.0,
            require_momentum_rising: true,
            require_strength_rising: false,
            gate: GateConfig {
                use_min_momentum: true,
                min_momentum: 20.0,
                use_max_strength: true,
                max_strength: 50.0,
                use_momentum_above_inferior: true,
                use_min_gap: true,
                min_gap: 2.0,
                ..GateConfig::default()
            },
            use_recheck: [true, true, true, false, false, false],
            recheck_require_context_side: true,
            recheck_require_momentum_above_strength: true,
            recheck_cancel_siblings_on_flip: true,
        }
    }

    /// Falling-momentum preset: single-bar confirmation, validated against the
    /// inferior line with a maximum gap.
    pub fn respiration() -> Self {
        Self {
            name: "respiration".into(),
            mode: DetectorMode::Respiration,
            allowed_side: None,
            epsilon: 0.0,
            require_momentum_rising: false,
            require_strength_rising: false,
            gate: GateConfig {
                use_strength_above_inferior: true,
                use_max_gap: true,
                max_gap: 5.0,
                ..GateConfig::default()
            },
            use_recheck: [true, false, false, false, false, false],
            recheck_require_context_side: true,
            recheck_require_momentum_above_strength: true,
            recheck_cancel_siblings_on_flip: true,
        }
    }

    /// Enabled recheck offsets in ascending order.
    pub fn recheck_lags(&self) -> impl Iterator<Item = usize> + '_ {
        self.use_recheck
            .iter()
            .enumerate()
            .filter(|(_, &enabled)| enabled)
            .map(|(i, _)| i + 1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "name".into(),
                reason: "must not be empty".into(),
            });
        }
        non_negative("epsilon", self.epsilon)?;
        self.gate.validate()
    }
}
