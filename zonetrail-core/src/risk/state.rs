//! Position state owned by the risk manager.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{IndicatorSnapshot, OscillatorKind, Side};
use crate::zone::Zone;

/// How the position relates to the prevailing trend at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Trend,
    CounterTrend,
    Unclassified,
}

impl fmt::Display for TrendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendClass::Trend => write!(f, "trend"),
            TrendClass::CounterTrend => write!(f, "counter_trend"),
            TrendClass::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Escalation level driven by the number of inverted oscillators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringState {
    Normal,
    PartialInverse,
    FullInverse,
}

impl MonitoringState {
    /// Level for `inverted` oscillators given the escalation thresholds.
    pub fn from_inverse_count(inverted: usize, partial_at: usize, full_at: usize) -> Self {
        if inverted >= full_at {
            MonitoringState::FullInverse
        } else if inverted >= partial_at {
            MonitoringState::PartialInverse
        } else {
            MonitoringState::Normal
        }
    }

    /// `true` when the caller should move from per-bar to per-tick updates.
    pub fn is_active(self) -> bool {
        self != MonitoringState::Normal
    }
}

impl fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoringState::Normal => write!(f, "NORMAL"),
            MonitoringState::PartialInverse => write!(f, "PARTIAL_INVERSE"),
            MonitoringState::FullInverse => write!(f, "FULL_INVERSE"),
        }
    }
}

/// Zone of one tracked oscillator at entry. `None` when it was NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryZone {
    pub kind: OscillatorKind,
    pub zone: Option<Zone>,
}

/// The one open position a risk manager tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_snapshot: IndicatorSnapshot,
    pub entry_zones: Vec<EntryZone>,
    pub trend: TrendClass,
    /// Current distance between price and stop, in percent.
    pub trailing_percent: f64,
    pub stop_price: f64,
    pub monitoring: MonitoringState,
    pub adjustment_count: usize,
    /// Sum of accepted width reductions.
    pub cumulative_adjust_percent: f64,
    /// Oscillators already tightened for during their current inversion.
    pub episode_adjusted: Vec<OscillatorKind>,
    /// The full-inverse tightening already ran for the current episode.
    pub full_inverse_adjusted: bool,
}

impl PositionState {
    /// Tracked oscillators currently inverse to their entry zone.
    pub fn inverted(&self, snapshot: &IndicatorSnapshot) -> Vec<OscillatorKind> {
        self.entry_zones
            .iter()
            .filter(|entry| Zone::is_inverse(self.side, entry.zone, snapshot.zone(entry.kind)))
            .map(|entry| entry.kind)
            .collect()
    }

    pub fn profit_percent(&self, price: f64) -> f64 {
        self.side.profit_percent(self.entry_price, price)
    }

    /// `true` once the stop sits on the profitable side of entry.
    pub fn stop_in_profit(&self) -> bool {
        self.side.is_tighter(self.stop_price, self.entry_price)
    }

    /// `true` when `price` has reached the stop.
    pub fn is_stop_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_price,
            Side::Short => price >= self.stop_price,
        }
    }

    /// Trail the stop behind `price` at the current width.
    ///
    /// The stop only moves when the candidate is tighter, so a price moving
    /// against the position never loosens it. Returns `true` if it moved.
    pub fn ratchet_to(&mut self, price: f64) -> bool {
        let candidate = self.side.stop_from(price, self.trailing_percent);
        if self.side.is_tighter(candidate, self.stop_price) {
            self.stop_price = candidate;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
pub(crate) fn test_position(side: Side, entry: f64, width: f64) -> PositionState {
    let time = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    PositionState {
        side,
        entry_price: entry,
        entry_time: time,
        entry_snapshot: IndicatorSnapshot::warming_up(),
        entry_zones: Vec::new(),
        trend: TrendClass::Unclassified,
        trailing_percent: width,
        stop_price: side.stop_from(entry, width),
        monitoring: MonitoringState::Normal,
        adjustment_count: 0,
        cumulative_adjust_percent: 0.0,
        episode_adjusted: Vec::new(),
        full_inverse_adjusted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use crate::zone::ZoneThresholds;

    #[test]
    fn escalation_ladder() {
        use MonitoringState::*;
        assert_eq!(MonitoringState::from_inverse_count(0, 1, 3), Normal);
        assert_eq!(MonitoringState::from_inverse_count(1, 1, 3), PartialInverse);
        assert_eq!(MonitoringState::from_inverse_count(2, 1, 3), PartialInverse);
        assert_eq!(MonitoringState::from_inverse_count(3, 1, 3), FullInverse);
        assert_eq!(MonitoringState::from_inverse_count(1, 2, 3), Normal);
        assert!(!Normal.is_active());
        assert!(PartialInverse.is_active());
        assert!(FullInverse.is_active());
    }

    #[test]
    fn ratchet_long_only_rises() {
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        assert_approx(pos.stop_price, 98.0, 1e-9);
        assert!(pos.ratchet_to(110.0));
        assert_approx(pos.stop_price, 107.8, 1e-9);
        assert!(!pos.ratchet_to(105.0));
        assert_approx(pos.stop_price, 107.8, 1e-9);
        assert!(!pos.ratchet_to(f64::NAN));
    }

    #[test]
    fn ratchet_short_only_falls() {
        let mut pos = test_position(Side::Short, 100.0, 2.0);
        assert_approx(pos.stop_price, 102.0, 1e-9);
        assert!(pos.ratchet_to(90.0));
        assert_approx(pos.stop_price, 91.8, 1e-9);
        assert!(!pos.ratchet_to(95.0));
    }

    #[test]
    fn stop_hit_and_in_profit() {
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        assert!(pos.is_stop_hit(98.0));
        assert!(!pos.is_stop_hit(98.5));
        assert!(!pos.stop_in_profit());
        pos.ratchet_to(103.0);
        assert!(pos.stop_in_profit());

        let short = test_position(Side::Short, 100.0, 2.0);
        assert!(short.is_stop_hit(102.0));
        assert!(!short.is_stop_hit(f64::NAN));
    }

    #[test]
    fn inverted_counts_only_opposite_extremes() {
        let t = ZoneThresholds::default_for(OscillatorKind::MoneyFlow);
        let mut pos = test_position(Side::Long, 100.0, 2.0);
        pos.entry_zones = vec![
            EntryZone { kind: OscillatorKind::MoneyFlow, zone: Some(Zone::Low) },
            EntryZone { kind: OscillatorKind::StochasticK, zone: Some(Zone::Low) },
            EntryZone { kind: OscillatorKind::StochasticD, zone: Some(Zone::Mid) },
        ];
        let snap = IndicatorSnapshot::warming_up()
            .with_oscillator(OscillatorKind::MoneyFlow, 90.0, t)
            .with_oscillator(OscillatorKind::StochasticK, 50.0, t)
            .with_oscillator(OscillatorKind::StochasticD, 95.0, t);
        assert_eq!(pos.inverted(&snap), vec![OscillatorKind::MoneyFlow]);
    }
}
