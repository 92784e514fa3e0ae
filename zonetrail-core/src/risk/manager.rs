//! `RiskManager` — lifecycle of one open position's protective stop.
//!
//! State lives behind a single `parking_lot::RwLock`. Queries take the shared
//! lock; open, close and update take the exclusive lock for the whole call.

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use super::adjustment::{apply_adjustment, AdjustmentReason, TrailingAdjustment};
use super::config::RiskConfig;
use super::exit::{evaluate_early_exit, EarlyExitDecision};
use super::state::{EntryZone, MonitoringState, PositionState, TrendClass};
use super::RiskError;
use crate::config::ConfigError;
use crate::domain::{IndicatorSnapshot, Side};

/// Monitoring level transition reported by `on_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: MonitoringState,
    pub to: MonitoringState,
}

/// Everything one `on_update` call produced. Empty when no position is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub state_change: Option<StateChange>,
    /// Adjustments attempted this update, accepted or not.
    pub adjustments: Vec<TrailingAdjustment>,
    /// The stop trailed the price at the current width.
    pub ratcheted: bool,
    pub stop_price: Option<f64>,
    pub early_exit: Option<EarlyExitDecision>,
}

impl UpdateOutcome {
    pub fn should_exit(&self) -> bool {
        self.early_exit.as_ref().is_some_and(|d| d.should_exit)
    }

    pub fn stop_moved(&self) -> bool {
        self.ratcheted || self.adjustments.iter().any(|a| a.success)
    }
}

#[derive(Debug, Default)]
struct Inner {
    position: Option<PositionState>,
    history: VecDeque<TrailingAdjustment>,
}

/// Owns at most one open position and keeps its stop tightening, never loosening.
#[derive(Debug)]
pub struct RiskManager {
    config: RiskConfig,
    inner: RwLock<Inner>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: RwLock::new(Inner::default()),
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Start tracking a position. Fails if one is already open.
    pub fn on_position_opened(
        &self,
        side: Side,
        entry_price: f64,
        entry_time: NaiveDateTime,
        entry_snapshot: IndicatorSnapshot,
        trend: TrendClass,
    ) -> Result<PositionState, RiskError> {
        let mut inner = self.inner.write();
        if let Some(open) = &inner.position {
            return Err(RiskError::AlreadyOpen {
                side: open.side,
                entry_price: open.entry_price,
            });
        }
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(RiskError::NonFiniteEntry(entry_price));
        }

        let width = self.initial_width(trend, &entry_snapshot);
        let entry_zones = self
            .config
            .tracked
            .iter()
            .map(|t| EntryZone {
                kind: t.kind,
                zone: entry_snapshot.zone(t.kind),
            })
            .collect();

        let position = PositionState {
            side,
            entry_price,
            entry_time,
            entry_snapshot,
            entry_zones,
            trend,
            trailing_percent: width,
            stop_price: side.stop_from(entry_price, width),
            monitoring: MonitoringState::Normal,
            adjustment_count: 0,
            cumulative_adjust_percent: 0.0,
            episode_adjusted: Vec::new(),
            full_inverse_adjusted: false,
        };
        info!(
            %side,
            entry_price,
            %trend,
            trailing_percent = width,
            stop = position.stop_price,
            "position opened"
        );
        inner.position = Some(position.clone());
        Ok(position)
    }

    /// Stop tracking. Closing when nothing is open does nothing.
    pub fn on_position_closed(&self) {
        let mut inner = self.inner.write();
        if let Some(position) = inner.position.take() {
            info!(
                side = %position.side,
                stop = position.stop_price,
                adjustments = position.adjustment_count,
                "position closed"
            );
        }
    }

    /// Re-evaluate the open position against `price` and `snapshot`.
    ///
    /// 1. Recompute the monitoring level from entry vs current zones.
    /// 2. Report a level change.
    /// 3. Tighten: once per newly inverted oscillator while partially
    ///    inverted, once per episode while fully inverted. A rejected
    ///    candidate is retried on the next update. Then trail the stop at the
    ///    current width.
    /// 4. Evaluate the early-exit policy.
    pub fn on_update(&self, price: f64, snapshot: &IndicatorSnapshot) -> UpdateOutcome {
        let mut inner = self.inner.write();
        let Inner { position, history } = &mut *inner;
        let Some(position) = position.as_mut() else {
            return UpdateOutcome::default();
        };

        let inverted = position.inverted(snapshot);
        let next = MonitoringState::from_inverse_count(
            inverted.len(),
            self.config.partial_inverse_count,
            self.config.resolved_full_inverse_count(),
        );
        let state_change = (next != position.monitoring).then(|| {
            info!(from = %position.monitoring, to = %next, inverted = inverted.len(), "monitoring state changed");
            StateChange {
                from: position.monitoring,
                to: next,
            }
        });
        position.monitoring = next;

        // An oscillator that recovered starts a fresh episode next time it inverts.
        position.episode_adjusted.retain(|kind| inverted.contains(kind));
        if next != MonitoringState::FullInverse {
            position.full_inverse_adjusted = false;
        }

        let mut adjustments = Vec::new();
        match next {
            MonitoringState::Normal => {}
            MonitoringState::PartialInverse => {
                for kind in inverted {
                    if position.episode_adjusted.contains(&kind) {
                        continue;
                    }
                    let adjustment = apply_adjustment(
                        position,
                        &self.config,
                        self.config.adjust_percent(kind),
                        price,
                        AdjustmentReason::OscillatorInverse(kind),
                        snapshot,
                    );
                    // Rejected or clamped-out attempts retry on the next update.
                    if adjustment.as_ref().is_some_and(|a| a.success) {
                        position.episode_adjusted.push(kind);
                    }
                    adjustments.extend(adjustment);
                }
            }
            MonitoringState::FullInverse => {
                if !position.full_inverse_adjusted {
                    let adjustment = apply_adjustment(
                        position,
                        &self.config,
                        self.config.full_inverse_adjust_percent,
                        price,
                        AdjustmentReason::FullInverse,
                        snapshot,
                    );
                    if adjustment.as_ref().is_some_and(|a| a.success) {
                        position.full_inverse_adjusted = true;
                        for kind in inverted {
                            if !position.episode_adjusted.contains(&kind) {
                                position.episode_adjusted.push(kind);
                            }
                        }
                    }
                    adjustments.extend(adjustment);
                }
            }
        }

        for adjustment in &adjustments {
            if adjustment.success {
                debug!(
                    reason = %adjustment.reason,
                    old_stop = adjustment.old_stop,
                    new_stop = adjustment.new_stop,
                    width = adjustment.new_trailing_percent,
                    "trailing width tightened"
                );
            } else {
                debug!(
                    reason = %adjustment.reason,
                    stop = adjustment.old_stop,
                    candidate = adjustment.new_stop,
                    "adjustment rejected: candidate stop is not tighter"
                );
            }
            history.push_back(adjustment.clone());
            while history.len() > self.config.history_limit {
                history.pop_front();
            }
        }

        let ratcheted = position.ratchet_to(price);

        let decision = evaluate_early_exit(position, &self.config, price, snapshot);
        if decision.should_exit {
            info!(reason = %decision.reason, "early exit proposed");
        }

        UpdateOutcome {
            state_change,
            adjustments,
            ratcheted,
            stop_price: Some(position.stop_price),
            early_exit: Some(decision),
        }
    }

    /// Early-exit decision for `price` without mutating anything.
    pub fn evaluate_early_exit(
        &self,
        price: f64,
        snapshot: &IndicatorSnapshot,
    ) -> Option<EarlyExitDecision> {
        let inner = self.inner.read();
        inner
            .position
            .as_ref()
            .map(|p| evaluate_early_exit(p, &self.config, price, snapshot))
    }

    /// `true` when `price` has reached the stop. Always `false` when closed.
    pub fn should_trigger_stop(&self, price: f64) -> bool {
        self.inner
            .read()
            .position
            .as_ref()
            .is_some_and(|p| p.is_stop_hit(price))
    }

    pub fn current_stop_price(&self) -> Option<f64> {
        self.inner.read().position.as_ref().map(|p| p.stop_price)
    }

    /// Monitoring level of the open position; `Normal` when closed.
    pub fn monitoring_state(&self) -> MonitoringState {
        self.inner
            .read()
            .position
            .as_ref()
            .map_or(MonitoringState::Normal, |p| p.monitoring)
    }

    /// `true` while inverted: the caller should update per tick instead of per bar.
    pub fn is_monitoring_active(&self) -> bool {
        self.monitoring_state().is_active()
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().position.is_some()
    }

    /// Copy of the open position.
    pub fn position(&self) -> Option<PositionState> {
        self.inner.read().position.clone()
    }

    /// Adjustment records, oldest first.
    pub fn history(&self) -> Vec<TrailingAdjustment> {
        self.inner.read().history.iter().cloned().collect()
    }

    fn initial_width(&self, trend: TrendClass, snapshot: &IndicatorSnapshot) -> f64 {
        let base = match trend {
            TrendClass::Trend => self.config.trend_trailing_percent,
            TrendClass::CounterTrend => self.config.counter_trend_trailing_percent,
            TrendClass::Unclassified => self.config.default_trailing_percent,
        };
        let scaled = if self.config.use_volatility_scaling {
            let volatility = snapshot.volatility_percent;
            if volatility.is_finite() && volatility > 0.0 {
                base * volatility / self.config.volatility_reference_percent
            } else {
                debug!(volatility, "volatility unavailable, using unscaled width");
                base
            }
        } else {
            base
        };
        scaled.clamp(
            self.config.min_trailing_percent,
            self.config.max_trailing_percent,
        )
    }
}
