//! Lagged crossover detection between momentum (DX) and average strength (ADX).
//!
//! A detector watches for an edge-triggered crossover, evaluates a gate on the
//! crossover bar and, when the gate fails, defers judgment to fixed future bars
//! ("rechecks"). Each crossover produces at most one event across its
//! immediate check and all of its rechecks.
//!
//! Per `step` at index `i`:
//! 1. Rechecks due at `i` are resolved first, in scheduling order.
//! 2. A crossover at `i` is detected and gated.
//! 3. If the gate passes and nothing was emitted this step, the event fires
//!    with lag 0; otherwise each enabled recheck offset is scheduled.
//!
//! `step` must be called once per bar with strictly increasing, gap-free
//! indices. The caller passes the previous and the current snapshot.

pub mod config;
pub mod gate;

pub use config::{DetectorConfig, DetectorMode, GateConfig, MAX_RECHECK_LAG};
pub use gate::{GateDiagnostics, GateRule};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::domain::{IndicatorSnapshot, Side};

/// A validated crossover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    /// Name of the detector that emitted it.
    pub detector: String,
    pub mode: DetectorMode,
    pub side: Side,
    /// 0 for an immediate pass, otherwise the recheck offset that validated it.
    pub lag: usize,
    /// Bar at which the gate passed.
    pub validation_index: usize,
    /// Bar at which the crossover happened.
    pub cross_index: usize,
    pub diagnostics: GateDiagnostics,
}

/// A deferred gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRecheck {
    pub side: Side,
    pub cross_index: usize,
    pub recheck_at_index: usize,
    pub lag: usize,
}

/// Crossover detector with deferred confirmation.
///
/// Holds no state besides its pending rechecks; independent instances can run
/// on separate threads.
#[derive(Debug, Clone)]
pub struct LaggedCrossoverDetector {
    config: DetectorConfig,
    pending: Vec<PendingRecheck>,
}

impl LaggedCrossoverDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            pending: Vec::new(),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Rechecks not yet resolved, in scheduling order.
    pub fn pending(&self) -> &[PendingRecheck] {
        &self.pending
    }

    /// Drop every pending recheck. Used when a stream restarts.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Advance to bar `index`, returning at most one validated event.
    pub fn step(
        &mut self,
        index: usize,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> Option<CrossoverEvent> {
        let mut emitted = self.process_rechecks(index, current);

        if let Some(side) = self.detect(index, previous, current) {
            let diagnostics = self.config.gate.evaluate(side, current);
            if diagnostics.passed() && emitted.is_none() {
                debug!(
                    detector = %self.config.name,
                    index,
                    %side,
                    "crossover validated immediately"
                );
                emitted = Some(self.event(side, 0, index, index, diagnostics));
            } else {
                if diagnostics.passed() {
                    debug!(
                        detector = %self.config.name,
                        index,
                        "crossover passed but a recheck already emitted this bar; deferring"
                    );
                } else {
                    debug!(
                        detector = %self.config.name,
                        index,
                        %side,
                        failed = ?diagnostics.failed,
                        "crossover gate failed"
                    );
                }
                self.schedule(side, index);
            }
        }

        emitted
    }

    fn process_rechecks(
        &mut self,
        index: usize,
        current: &IndicatorSnapshot,
    ) -> Option<CrossoverEvent> {
        let (due, remaining): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|r| r.recheck_at_index <= index);
        self.pending = remaining;

        let mut emitted = None;
        let mut resolved: Vec<usize> = Vec::new();

        for recheck in due {
            if recheck.recheck_at_index < index {
                // Out-of-order stepping; the bar this recheck needed is gone.
                continue;
            }
            if resolved.contains(&recheck.cross_index) {
                continue;
            }

            if !self.integrity_holds(&recheck, current) {
                debug!(
                    detector = %self.config.name,
                    index,
                    cross_index = recheck.cross_index,
                    lag = recheck.lag,
                    "recheck integrity violated"
                );
                if self.config.recheck_cancel_siblings_on_flip {
                    self.cancel_siblings(recheck.cross_index);
                    resolved.push(recheck.cross_index);
                    continue;
                }
                // Without cancellation the gate alone decides this recheck.
            }

            let diagnostics = self.config.gate.evaluate(recheck.side, current);
            if !diagnostics.passed() {
                debug!(
                    detector = %self.config.name,
                    index,
                    cross_index = recheck.cross_index,
                    lag = recheck.lag,
                    failed = ?diagnostics.failed,
                    "recheck gate failed"
                );
                continue;
            }
            if emitted.is_some() {
                continue;
            }

            debug!(
                detector = %self.config.name,
                index,
                cross_index = recheck.cross_index,
                lag = recheck.lag,
                "crossover validated on recheck"
            );
            self.cancel_siblings(recheck.cross_index);
            resolved.push(recheck.cross_index);
            emitted = Some(self.event(
                recheck.side,
                recheck.lag,
                index,
                recheck.cross_index,
                diagnostics,
            ));
        }

        emitted
    }

    fn integrity_holds(&self, recheck: &PendingRecheck, current: &IndicatorSnapshot) -> bool {
        if self.config.recheck_require_context_side
            && current.context_side() != Some(recheck.side)
        {
            return false;
        }
        if self.config.recheck_require_momentum_above_strength {
            let still_crossed = match self.config.mode {
                DetectorMode::Rising => current.momentum > current.average_strength,
                DetectorMode::Respiration => current.momentum < current.average_strength,
            };
            if !still_crossed {
                return false;
            }
        }
        true
    }

    fn detect(
        &self,
        index: usize,
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> Option<Side> {
        if index == 0 {
            return None;
        }
        let eps = self.config.epsilon;
        let edge = match self.config.mode {
            DetectorMode::Rising => {
                previous.momentum <= previous.average_strength + eps
                    && current.momentum > current.average_strength
            }
            DetectorMode::Respiration => {
                previous.momentum >= previous.average_strength - eps
                    && current.momentum < current.average_strength
            }
        };
        if !edge {
            return None;
        }
        if self.config.require_momentum_rising && !(current.momentum > previous.momentum) {
            return None;
        }
        if self.config.require_strength_rising
            && !(current.average_strength > previous.average_strength)
        {
            return None;
        }

        let side = current.context_side()?;
        match self.config.allowed_side {
            Some(allowed) if allowed != side => None,
            _ => Some(side),
        }
    }

    fn schedule(&mut self, side: Side, cross_index: usize) {
        let lags: Vec<usize> = self.config.recheck_lags().collect();
        for lag in lags {
            let exists = self
                .pending
                .iter()
                .any(|r| r.cross_index == cross_index && r.lag == lag);
            if !exists {
                self.pending.push(PendingRecheck {
                    side,
                    cross_index,
                    recheck_at_index: cross_index + lag,
                    lag,
                });
            }
        }
    }

    fn cancel_siblings(&mut self, cross_index: usize) {
        self.pending.retain(|r| r.cross_index != cross_index);
    }

    fn event(
        &self,
        side: Side,
        lag: usize,
        validation_index: usize,
        cross_index: usize,
        diagnostics: GateDiagnostics,
    ) -> CrossoverEvent {
        CrossoverEvent {
            detector: self.config.name.clone(),
            mode: self.config.mode,
            side,
            lag,
            validation_index,
            cross_index,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(plus: f64, minus: f64, momentum: f64, strength: f64) -> IndicatorSnapshot {
        IndicatorSnapshot::new(plus, minus, momentum, strength)
    }

    fn plain(mode: DetectorMode) -> DetectorConfig {
        DetectorConfig {
            name: "test".into(),
            mode,
            allowed_side: None,
            epsilon: 0.0,
            require_momentum_rising: false,
            require_strength_rising: false,
            gate: GateConfig::default(),
            use_recheck: [false; MAX_RECHECK_LAG],
            recheck_require_context_side: true,
            recheck_require_momentum_above_strength: true,
            recheck_cancel_siblings_on_flip: true,
        }
    }

    #[test]
    fn rising_edge_emits_immediately() {
        let mut det = LaggedCrossoverDetector::new(plain(DetectorMode::Rising)).unwrap();
        let prev = snap(30.0, 10.0, 18.0, 20.0);
        let cur = snap(30.0, 10.0, 22.0, 20.0);
        let event = det.step(1, &prev, &cur).unwrap();
        assert_eq!(event.side, Side::Long);
        assert_eq!(event.lag, 0);
        assert_eq!(event.cross_index, 1);
        assert_eq!(event.validation_index, 1);
        assert_eq!(event.mode, DetectorMode::Rising);
    }

    #[test]
    fn no_edge_at_index_zero() {
        let mut det = LaggedCrossoverDetector::new(plain(DetectorMode::Rising)).unwrap();
        assert!(det
            .step(0, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
    }

    #[test]
    fn already_above_is_not_an_edge() {
        let mut det = LaggedCrossoverDetector::new(plain(DetectorMode::Rising)).unwrap();
        assert!(det
            .step(1, &snap(30.0, 10.0, 21.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
    }

    #[test]
    fn epsilon_widens_previous_bar_test() {
        let mut config = plain(DetectorMode::Rising);
        config.epsilon = 0.5;
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        assert!(det
            .step(1, &snap(30.0, 10.0, 20.3, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_some());
    }

    #[test]
    fn short_context_from_directional_lines() {
        let mut det = LaggedCrossoverDetector::new(plain(DetectorMode::Rising)).unwrap();
        let event = det
            .step(1, &snap(10.0, 30.0, 18.0, 20.0), &snap(10.0, 30.0, 22.0, 20.0))
            .unwrap();
        assert_eq!(event.side, Side::Short);
    }

    #[test]
    fn tied_or_nan_context_suppresses_crossover() {
        let mut det = LaggedCrossoverDetector::new(plain(DetectorMode::Rising)).unwrap();
        assert!(det
            .step(1, &snap(20.0, 20.0, 18.0, 20.0), &snap(20.0, 20.0, 22.0, 20.0))
            .is_none());
        assert!(det
            .step(2, &snap(20.0, 20.0, 18.0, 20.0), &snap(f64::NAN, 20.0, 22.0, 20.0))
            .is_none());
    }

    #[test]
    fn allowed_side_filters() {
        let mut config = plain(DetectorMode::Rising);
        config.allowed_side = Some(Side::Short);
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        assert!(det
            .step(1, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
    }

    #[test]
    fn slope_constraints() {
        let mut config = plain(DetectorMode::Rising);
        config.require_strength_rising = true;
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        // ADX flat: rejected
        assert!(det
            .step(1, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
        // ADX rising: accepted
        assert!(det
            .step(2, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 21.0))
            .is_some());
    }

    #[test]
    fn respiration_detects_falling_edge() {
        let mut det = LaggedCrossoverDetector::new(plain(DetectorMode::Respiration)).unwrap();
        assert!(det
            .step(1, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
        let event = det
            .step(2, &snap(30.0, 10.0, 22.0, 20.0), &snap(30.0, 10.0, 18.0, 20.0))
            .unwrap();
        assert_eq!(event.mode, DetectorMode::Respiration);
        assert_eq!(event.side, Side::Long);
    }

    #[test]
    fn failed_gate_schedules_enabled_rechecks() {
        let mut config = plain(DetectorMode::Rising);
        config.gate.use_min_gap = true;
        config.gate.min_gap = 5.0;
        config.use_recheck = [true, false, true, false, false, true];
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        assert!(det
            .step(4, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
        let at: Vec<(usize, usize)> = det
            .pending()
            .iter()
            .map(|r| (r.lag, r.recheck_at_index))
            .collect();
        assert_eq!(at, vec![(1, 5), (3, 7), (6, 10)]);
        det.reset();
        assert!(det.pending().is_empty());
    }

    #[test]
    fn integrity_failure_without_cancel_keeps_siblings() {
        let mut config = plain(DetectorMode::Rising);
        config.gate.use_min_gap = true;
        config.gate.min_gap = 5.0;
        config.use_recheck = [true, true, false, false, false, false];
        config.recheck_cancel_siblings_on_flip = false;
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        det.step(1, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0));
        // Context flips at the first recheck.
        let flipped = snap(10.0, 30.0, 22.0, 20.0);
        assert!(det.step(2, &snap(30.0, 10.0, 22.0, 20.0), &flipped).is_none());
        assert_eq!(det.pending().len(), 1);
        // Context restored and gap wide enough at the second recheck.
        let event = det
            .step(3, &flipped, &snap(30.0, 10.0, 27.0, 20.0))
            .unwrap();
        assert_eq!(event.lag, 2);
    }

    #[test]
    fn integrity_failure_without_cancel_still_evaluates_gate() {
        let mut config = plain(DetectorMode::Rising);
        config.gate.use_min_gap = true;
        config.gate.min_gap = 5.0;
        config.use_recheck = [true, true, false, false, false, false];
        config.recheck_cancel_siblings_on_flip = false;
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        // Gap 2 at the crossover: gate fails, rechecks at 2 and 3.
        assert!(det
            .step(1, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0))
            .is_none());
        // Context flipped but the gap is now 10: the gate passes.
        let event = det
            .step(2, &snap(30.0, 10.0, 22.0, 20.0), &snap(10.0, 30.0, 30.0, 20.0))
            .unwrap();
        assert_eq!(event.lag, 1);
        assert_eq!(event.cross_index, 1);
        assert!(det.pending().is_empty());
    }

    #[test]
    fn integrity_failure_with_cancel_drops_even_a_passing_gate() {
        let mut config = plain(DetectorMode::Rising);
        config.gate.use_min_gap = true;
        config.gate.min_gap = 5.0;
        config.use_recheck = [true, true, false, false, false, false];
        config.recheck_cancel_siblings_on_flip = true;
        let mut det = LaggedCrossoverDetector::new(config).unwrap();
        det.step(1, &snap(30.0, 10.0, 18.0, 20.0), &snap(30.0, 10.0, 22.0, 20.0));
        assert!(det
            .step(2, &snap(30.0, 10.0, 22.0, 20.0), &snap(10.0, 30.0, 30.0, 20.0))
            .is_none());
        assert!(det.pending().is_empty());
    }

    #[test]
    fn passing_crossover_deferred_when_recheck_emitted_same_bar() {
        let mut config = plain(DetectorMode::Respiration);
        config.recheck_require_momentum_above_strength = false;
        config.gate.use_max_gap = true;
        config.gate.max_gap = 3.0;
        config.use_recheck = [true, true, false, false, false, false];
        let mut det = LaggedCrossoverDetector::new(config).unwrap();

        // Bar 1: falls through with a wide gap. Gate fails, rechecks at 2 and 3.
        assert!(det
            .step(1, &snap(30.0, 10.0, 25.0, 20.0), &snap(30.0, 10.0, 10.0, 20.0))
            .is_none());
        // Bar 2: back above with gap 5. First recheck fails.
        assert!(det
            .step(2, &snap(30.0, 10.0, 10.0, 20.0), &snap(30.0, 10.0, 25.0, 20.0))
            .is_none());
        // Bar 3: the second recheck passes and a new narrow crossover happens
        // on the same bar. The recheck wins; the new crossover waits.
        let first = det
            .step(3, &snap(30.0, 10.0, 25.0, 20.0), &snap(30.0, 10.0, 19.0, 20.0))
            .unwrap();
        assert_eq!((first.cross_index, first.lag), (1, 2));
        let waiting: Vec<(usize, usize)> = det
            .pending()
            .iter()
            .map(|r| (r.cross_index, r.recheck_at_index))
            .collect();
        assert_eq!(waiting, vec![(3, 4), (3, 5)]);
        // Bar 4: the deferred crossover validates on its first recheck.
        let second = det
            .step(4, &snap(30.0, 10.0, 19.0, 20.0), &snap(30.0, 10.0, 18.5, 20.0))
            .unwrap();
        assert_eq!((second.cross_index, second.lag), (3, 1));
        assert!(det.pending().is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = plain(DetectorMode::Rising);
        config.name = " ".into();
        assert!(LaggedCrossoverDetector::new(config).is_err());
    }
}
