//! Trailing-width adjustments and the single place where they are applied.
//!
//! Every tightening goes through `apply_adjustment`. It clamps the request to
//! the cumulative cap and the width floor, and accepts the result only if the
//! new stop is strictly tighter than the current one. Rejected candidates are
//! recorded but never touch the live position.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::RiskConfig;
use super::state::PositionState;
use crate::domain::{IndicatorSnapshot, OscillatorKind};

/// Reductions at or below this size are treated as nothing left to apply.
const MIN_ADJUSTMENT: f64 = 1e-9;

/// Why an adjustment was proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "oscillator")]
pub enum AdjustmentReason {
    /// One oscillator moved into the zone opposite its entry zone.
    OscillatorInverse(OscillatorKind),
    /// Every tracked oscillator (or the configured count) is inverted.
    FullInverse,
}

impl fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentReason::OscillatorInverse(kind) => write!(f, "{kind}_inverse"),
            AdjustmentReason::FullInverse => write!(f, "full_inverse"),
        }
    }
}

/// Immutable record of one proposed tightening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingAdjustment {
    pub reason: AdjustmentReason,
    /// Price the candidate stop was computed from.
    pub price: f64,
    pub requested_percent: f64,
    /// Reduction after clamping to the cap and the floor.
    pub applied_percent: f64,
    pub old_trailing_percent: f64,
    pub new_trailing_percent: f64,
    pub old_stop: f64,
    pub new_stop: f64,
    /// Cumulative reduction after this record (unchanged when rejected).
    pub cumulative_after: f64,
    pub success: bool,
    pub snapshot: IndicatorSnapshot,
}

/// Propose narrowing `position`'s trailing width by `requested` points at `price`.
///
/// Returns `None` when clamping leaves nothing to apply (cap reached, width
/// already at the floor, or a non-positive request). Otherwise returns the
/// record; `success` tells whether the position was changed.
pub fn apply_adjustment(
    position: &mut PositionState,
    config: &RiskConfig,
    requested: f64,
    price: f64,
    reason: AdjustmentReason,
    snapshot: &IndicatorSnapshot,
) -> Option<TrailingAdjustment> {
    if !(requested > 0.0) {
        return None;
    }
    let remaining_cap = config.max_cumulative_adjust_percent - position.cumulative_adjust_percent;
    let above_floor = position.trailing_percent - config.min_trailing_percent;
    let applied = requested.min(remaining_cap).min(above_floor);
    if !(applied > MIN_ADJUSTMENT) {
        return None;
    }

    let new_width = position.trailing_percent - applied;
    let candidate = position.side.stop_from(price, new_width);
    let success = position.side.is_tighter(candidate, position.stop_price);

    let record = TrailingAdjustment {
        reason,
        price,
        requested_percent: requested,
        applied_percent: applied,
        old_trailing_percent: position.trailing_percent,
        new_trailing_percent: new_width,
        old_stop: position.stop_price,
        new_stop: candidate,
        cumulative_after: if success {
            position.cumulative_adjust_percent + applied
        } else {
            position.cumulative_adjust_percent
        },
        success,
        snapshot: snapshot.clone(),
    };

    if success {
        position.trailing_percent = new_width;
        position.stop_price = candidate;
        position.adjustment_count += 1;
        position.cumulative_adjust_percent = record.cumulative_after;
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::indicators::assert_approx;
    use crate::risk::state::test_position;

    fn config() -> RiskConfig {
        RiskConfig {
            min_trailing_percent: 0.5,
            max_cumulative_adjust_percent: 1.0,
            ..RiskConfig::default()
        }
    }

    fn reason() -> AdjustmentReason {
        AdjustmentReason::OscillatorInverse(OscillatorKind::MoneyFlow)
    }

    #[test]
    fn accepted_tightening_updates_position() {
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        let snap = IndicatorSnapshot::warming_up();
        let adj = apply_adjustment(&mut pos, &config(), 0.5, 102.0, reason(), &snap).unwrap();
        assert!(adj.success);
        assert_approx(adj.new_trailing_percent, 1.5, 1e-12);
        assert_approx(adj.new_stop, 102.0 * 0.985, 1e-9);
        assert_approx(pos.stop_price, adj.new_stop, 1e-12);
        assert_eq!(pos.adjustment_count, 1);
        assert_approx(pos.cumulative_adjust_percent, 0.5, 1e-12);
    }

    #[test]
    fn unfavorable_candidate_is_rejected() {
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        let before = pos.clone();
        // Price fell: 95 * 0.985 = 93.575 < 98
        let adj =
            apply_adjustment(&mut pos, &config(), 0.5, 95.0, reason(), &before.entry_snapshot)
                .unwrap();
        assert!(!adj.success);
        assert!(adj.new_stop < adj.old_stop);
        assert_eq!(adj.cumulative_after, 0.0);
        assert_eq!(pos.stop_price, before.stop_price);
        assert_eq!(pos.trailing_percent, before.trailing_percent);
        assert_eq!(pos.adjustment_count, 0);
        assert_eq!(pos.cumulative_adjust_percent, 0.0);
    }

    #[test]
    fn clamps_to_cumulative_cap() {
        let mut pos = test_position(Side::Short, 100.0, 3.0);
        let snap = IndicatorSnapshot::warming_up();
        let first = apply_adjustment(&mut pos, &config(), 0.8, 100.0, reason(), &snap).unwrap();
        assert_approx(first.applied_percent, 0.8, 1e-12);
        let second = apply_adjustment(&mut pos, &config(), 0.8, 100.0, reason(), &snap).unwrap();
        assert_approx(second.applied_percent, 0.2, 1e-12);
        assert_approx(pos.cumulative_adjust_percent, 1.0, 1e-12);
        assert!(apply_adjustment(&mut pos, &config(), 0.8, 100.0, reason(), &snap).is_none());
    }

    #[test]
    fn clamps_to_width_floor() {
        let mut pos = test_position(Side::Long, 100.0, 0.8);
        let snap = IndicatorSnapshot::warming_up();
        let adj = apply_adjustment(&mut pos, &config(), 0.5, 100.0, reason(), &snap).unwrap();
        assert_approx(adj.applied_percent, 0.3, 1e-12);
        assert_approx(pos.trailing_percent, 0.5, 1e-12);
        assert!(apply_adjustment(&mut pos, &config(), 0.5, 100.0, reason(), &snap).is_none());
    }

    #[test]
    fn nan_request_is_noop() {
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        let snap = IndicatorSnapshot::warming_up();
        assert!(apply_adjustment(&mut pos, &config(), f64::NAN, 100.0, reason(), &snap).is_none());
        assert!(apply_adjustment(&mut pos, &config(), 0.0, 100.0, reason(), &snap).is_none());
    }

    #[test]
    fn nan_price_is_rejected() {
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        let snap = IndicatorSnapshot::warming_up();
        let adj = apply_adjustment(&mut pos, &config(), 0.5, f64::NAN, reason(), &snap).unwrap();
        assert!(!adj.success);
        assert_approx(pos.stop_price, 98.0, 1e-9);
    }

    #[test]
    fn reason_display() {
        assert_eq!(reason().to_string(), "mfi_inverse");
        assert_eq!(AdjustmentReason::FullInverse.to_string(), "full_inverse");
    }
}
