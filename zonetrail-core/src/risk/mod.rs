//! Position risk management: trailing-stop lifecycle, zone-inversion
//! escalation and early-exit advice for one open position.
//!
//! - `RiskManager`: lock-guarded owner of the open `PositionState`.
//! - `apply_adjustment`: the single chokepoint for tightening. A stop never
//!   loosens and total tightening never exceeds the configured cap.
//! - `evaluate_early_exit`: advisory; closing is the caller's decision.

pub mod adjustment;
pub mod config;
pub mod exit;
pub mod manager;
pub mod state;

pub use adjustment::{apply_adjustment, AdjustmentReason, TrailingAdjustment};
pub use config::{RiskConfig, TrackedOscillator};
pub use exit::{evaluate_early_exit, EarlyExitDecision, ExitTrigger};
pub use manager::{RiskManager, StateChange, UpdateOutcome};
pub use state::{EntryZone, MonitoringState, PositionState, TrendClass};

use crate::domain::Side;

/// Disallowed risk-manager operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("a {side} position is already open (entry {entry_price})")]
    AlreadyOpen { side: Side, entry_price: f64 },
    #[error("entry price must be finite and positive, got {0}")]
    NonFiniteEntry(f64),
}
