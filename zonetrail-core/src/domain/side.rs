//! Position side and the directional comparisons that depend on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Profits when price rises.
    Long,
    /// Profits when price falls.
    Short,
}

impl Side {
    /// Side implied by the directional lines: +DI above -DI is a Long context,
    /// the reverse a Short context. Ties and NaN give no context.
    pub fn from_directional(plus: f64, minus: f64) -> Option<Self> {
        if plus > minus {
            Some(Side::Long)
        } else if minus > plus {
            Some(Side::Short)
        } else {
            None
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// `true` if `candidate` is strictly more favorable than `current` for a
    /// protective stop on this side (higher for Long, lower for Short).
    ///
    /// NaN on either side is never favorable.
    pub fn is_tighter(self, candidate: f64, current: f64) -> bool {
        match self {
            Side::Long => candidate > current,
            Side::Short => candidate < current,
        }
    }

    /// Stop price `width_percent` away from `price` on the losing side.
    pub fn stop_from(self, price: f64, width_percent: f64) -> f64 {
        match self {
            Side::Long => price * (1.0 - width_percent / 100.0),
            Side::Short => price * (1.0 + width_percent / 100.0),
        }
    }

    /// Profit in percent of `entry` at `price`.
    pub fn profit_percent(self, entry: f64, price: f64) -> f64 {
        match self {
            Side::Long => (price - entry) / entry * 100.0,
            Side::Short => (entry - price) / entry * 100.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}
