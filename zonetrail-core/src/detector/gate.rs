//! Gate evaluation shared by the immediate check and every recheck.

use serde::{Deserialize, Serialize};

use super::config::GateConfig;
use crate::domain::{IndicatorSnapshot, Side};

/// One gate rule, named in diagnostics when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRule {
    MinMomentum,
    MinStrength,
    MaxStrength,
    MomentumAboveInferior,
    StrengthBelowSuperior,
    StrengthAboveInferior,
    MinGap,
    MaxGap,
}

/// Values the gate looked at, plus the rules that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDiagnostics {
    pub momentum: f64,
    pub average_strength: f64,
    pub superior: f64,
    pub inferior: f64,
    pub gap: f64,
    pub failed: Vec<GateRule>,
}

impl GateDiagnostics {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }
}

impl GateConfig {
    /// Evaluate every enabled rule for a crossover on `side` against `snapshot`.
    ///
    /// Each comparison is written so that a NaN operand fails the rule.
    pub fn evaluate(&self, side: Side, snapshot: &IndicatorSnapshot) -> GateDiagnostics {
        let momentum = snapshot.momentum;
        let strength = snapshot.average_strength;
        let superior = snapshot.superior_line(side);
        let inferior = snapshot.inferior_line(side);
        let gap = snapshot.gap();

        let rules = [
            (
                GateRule::MinMomentum,
                self.use_min_momentum,
                momentum >= self.min_momentum,
            ),
            (
                GateRule::MinStrength,
                self.use_min_strength,
                strength >= self.min_strength,
            ),
            (
                GateRule::MaxStrength,
                self.use_max_strength,
                strength <= self.max_strength,
            ),
            (
                GateRule::MomentumAboveInferior,
                self.use_momentum_above_inferior,
                momentum > inferior,
            ),
            (
                GateRule::StrengthBelowSuperior,
                self.use_strength_below_superior,
                strength < superior,
            ),
            (
                GateRule::StrengthAboveInferior,
                self.use_strength_above_inferior,
                strength > inferior,
            ),
            (GateRule::MinGap, self.use_min_gap, gap >= self.min_gap),
            (GateRule::MaxGap, self.use_max_gap, gap <= self.max_gap),
        ];

        let failed = rules
            .iter()
            .filter(|(_, enabled, passed)| *enabled && !*passed)
            .map(|(rule, _, _)| *rule)
            .collect();

        GateDiagnostics {
            momentum,
            average_strength: strength,
            superior,
            inferior,
            gap,
            failed,
        }
    }
}
