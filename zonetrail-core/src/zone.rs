//! Zone classification for bounded oscillators.
//!
//! Every oscillator value maps onto one of three zones using a pair of
//! thresholds. The same classifier feeds signal generation (zone transitions)
//! and inversion detection in the risk manager.

use crate::domain::{OscillatorKind, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

/// Oscillator zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Low,
    Mid,
    High,
}

impl Zone {
    /// Classify `value` against `thresholds`.
    ///
    /// `value <= low` is Low, `value >= high` is High, anything between is Mid.
    /// NaN has no zone.
    pub fn classify(value: f64, thresholds: ZoneThresholds) -> Option<Zone> {
        if value.is_nan() {
            None
        } else if value <= thresholds.low {
            Some(Zone::Low)
        } else if value >= thresholds.high {
            Some(Zone::High)
        } else {
            Some(Zone::Mid)
        }
    }

    /// The zone a position on `side` would call favorable at entry.
    pub fn entry_extreme(side: Side) -> Zone {
        match side {
            Side::Long => Zone::Low,
            Side::Short => Zone::High,
        }
    }

    /// `true` when `current` is the inverse of `entry` for a position on `side`:
    /// Long entered in Low and now High, or Short entered in High and now Low.
    pub fn is_inverse(side: Side, entry: Option<Zone>, current: Option<Zone>) -> bool {
        entry == Some(Zone::entry_extreme(side))
            && current == Some(Zone::entry_extreme(side.opposite()))
    }

    /// `true` when this zone does not argue against a position on `side`
    /// (Long is contradicted by High, Short by Low).
    pub fn supports(self, side: Side) -> bool {
        match side {
            Side::Long => self != Zone::High,
            Side::Short => self != Zone::Low,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Low => write!(f, "LOW"),
            Zone::Mid => write!(f, "MID"),
            Zone::High => write!(f, "HIGH"),
        }
    }
}

/// Low/high classification thresholds for one oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    pub low: f64,
    pub high: f64,
}

impl ZoneThresholds {
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        let thresholds = Self { low, high };
        thresholds.validate("zone")?;
        Ok(thresholds)
    }

    /// Default thresholds per oscillator family.
    pub fn default_for(kind: OscillatorKind) -> Self {
        match kind {
            OscillatorKind::StochasticK | OscillatorKind::StochasticD => {
                Self { low: 20.0, high: 80.0 }
            }
            OscillatorKind::MoneyFlow => Self { low: 20.0, high: 80.0 },
            OscillatorKind::CommodityChannel => Self {
                low: -100.0,
                high: 100.0,
            },
        }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(ConfigError::NonFinite {
                field: format!("{field}.thresholds"),
            });
        }
        if self.low >= self.high {
            return Err(ConfigError::InvertedRange {
                field: format!("{field}.thresholds"),
                min: self.low,
                max: self.high,
            });
        }
        Ok(())
    }
}

/// A change of zone for one oscillator between consecutive bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEvent {
    pub kind: OscillatorKind,
    pub index: usize,
    pub from: Zone,
    pub to: Zone,
}

impl ZoneEvent {
    /// `true` if the oscillator just left `zone`.
    pub fn exits(&self, zone: Zone) -> bool {
        self.from == zone && self.to != zone
    }

    /// `true` if the oscillator just entered `zone`.
    pub fn enters(&self, zone: Zone) -> bool {
        self.to == zone && self.from != zone
    }
}

/// Edge detector over the zone stream of one oscillator.
///
/// Only consecutive classified bars produce events; a NaN bar clears the
/// remembered zone so no event spans a gap.
#[derive(Debug, Clone)]
pub struct ZoneTracker {
    kind: OscillatorKind,
    last: Option<Zone>,
}

impl ZoneTracker {
    pub fn new(kind: OscillatorKind) -> Self {
        Self { kind, last: None }
    }

    pub fn kind(&self) -> OscillatorKind {
        self.kind
    }

    pub fn last_zone(&self) -> Option<Zone> {
        self.last
    }

    /// Feed the zone observed at `index`, returning a transition if any.
    pub fn observe(&mut self, index: usize, zone: Option<Zone>) -> Option<ZoneEvent> {
        let previous = std::mem::replace(&mut self.last, zone);
        match (previous, zone) {
            (Some(from), Some(to)) if from != to => Some(ZoneEvent {
                kind: self.kind,
                index,
                from,
                to,
            }),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stoch() -> ZoneThresholds {
        ZoneThresholds::default_for(OscillatorKind::StochasticK)
    }

    #[test]
    fn classify_boundaries_are_inclusive() {
        assert_eq!(Zone::classify(20.0, stoch()), Some(Zone::Low));
        assert_eq!(Zone::classify(80.0, stoch()), Some(Zone::High));
        assert_eq!(Zone::classify(50.0, stoch()), Some(Zone::Mid));
        assert_eq!(Zone::classify(-5.0, stoch()), Some(Zone::Low));
    }

    #[test]
    fn classify_nan_has_no_zone() {
        assert_eq!(Zone::classify(f64::NAN, stoch()), None);
    }

    #[test]
    fn inverse_is_side_relative() {
        assert!(Zone::is_inverse(Side::Long, Some(Zone::Low), Some(Zone::High)));
        assert!(!Zone::is_inverse(Side::Long, Some(Zone::High), Some(Zone::Low)));
        assert!(Zone::is_inverse(Side::Short, Some(Zone::High), Some(Zone::Low)));
        assert!(!Zone::is_inverse(Side::Short, Some(Zone::Low), Some(Zone::High)));
        assert!(!Zone::is_inverse(Side::Long, Some(Zone::Mid), Some(Zone::High)));
        assert!(!Zone::is_inverse(Side::Long, Some(Zone::Low), None));
    }

    #[test]
    fn thresholds_reject_inverted_range() {
        assert!(ZoneThresholds::new(80.0, 20.0).is_err());
        assert!(ZoneThresholds::new(50.0, 50.0).is_err());
        assert!(ZoneThresholds::new(f64::NAN, 50.0).is_err());
        assert!(ZoneThresholds::new(20.0, 80.0).is_ok());
    }

    #[test]
    fn tracker_emits_on_change_only() {
        let mut tracker = ZoneTracker::new(OscillatorKind::MoneyFlow);
        assert_eq!(tracker.observe(0, Some(Zone::Low)), None);
        assert_eq!(tracker.observe(1, Some(Zone::Low)), None);
        let event = tracker.observe(2, Some(Zone::Mid)).unwrap();
        assert_eq!(event.from, Zone::Low);
        assert_eq!(event.to, Zone::Mid);
        assert_eq!(event.index, 2);
        assert!(event.exits(Zone::Low));
        assert!(!event.enters(Zone::Low));
    }

    #[test]
    fn tracker_does_not_bridge_nan_gap() {
        let mut tracker = ZoneTracker::new(OscillatorKind::CommodityChannel);
        tracker.observe(0, Some(Zone::Low));
        assert_eq!(tracker.observe(1, None), None);
        assert_eq!(tracker.observe(2, Some(Zone::High)), None);
        assert_eq!(tracker.last_zone(), Some(Zone::High));
    }
}
