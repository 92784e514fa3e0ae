//! Advisory early-exit policy.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::RiskConfig;
use super::state::{MonitoringState, PositionState};
use crate::domain::IndicatorSnapshot;

/// Condition that proposed an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTrigger {
    FullInverse,
    /// The DI lines crossed against the position before the stop reached profit.
    DirectionalFlip,
}

impl fmt::Display for ExitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitTrigger::FullInverse => write!(f, "full_inverse"),
            ExitTrigger::DirectionalFlip => write!(f, "directional_flip"),
        }
    }
}

/// Outcome of the early-exit check. Closing is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyExitDecision {
    pub should_exit: bool,
    pub reason: String,
    pub profit_percent: f64,
    pub trigger: Option<ExitTrigger>,
}

impl EarlyExitDecision {
    fn hold(reason: impl Into<String>, profit_percent: f64) -> Self {
        Self {
            should_exit: false,
            reason: reason.into(),
            profit_percent,
            trigger: None,
        }
    }
}

/// Exit is proposed only when profit is at least `min_profit_for_early_exit`
/// and either full inversion is active or the DI lines flipped against the
/// position while the stop is not yet in profit.
pub fn evaluate_early_exit(
    position: &PositionState,
    config: &RiskConfig,
    price: f64,
    snapshot: &IndicatorSnapshot,
) -> EarlyExitDecision {
    let profit = position.profit_percent(price);
    if !(profit >= config.min_profit_for_early_exit) {
        return EarlyExitDecision::hold(
            format!(
                "profit {profit:.2}% below minimum {:.2}%",
                config.min_profit_for_early_exit
            ),
            profit,
        );
    }

    if config.early_exit_on_full_inverse && position.monitoring == MonitoringState::FullInverse {
        return EarlyExitDecision {
            should_exit: true,
            reason: format!("full inverse with {profit:.2}% profit"),
            profit_percent: profit,
            trigger: Some(ExitTrigger::FullInverse),
        };
    }

    if config.early_exit_on_directional_flip
        && snapshot.context_side() == Some(position.side.opposite())
        && !position.stop_in_profit()
    {
        return EarlyExitDecision {
            should_exit: true,
            reason: format!(
                "directional lines turned {} with {profit:.2}% profit and stop not in profit",
                position.side.opposite()
            ),
            profit_percent: profit,
            trigger: Some(ExitTrigger::DirectionalFlip),
        };
    }

    EarlyExitDecision::hold("no exit condition met", profit)
}
