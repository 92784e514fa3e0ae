//! Indicator snapshot — the immutable per-bar (or per-tick) view of every
//! indicator the detectors and the risk manager read.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Side;
use crate::zone::{Zone, ZoneThresholds};

/// Oscillators that can be classified into zones and tracked for inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OscillatorKind {
    #[serde(rename = "stoch_k")]
    StochasticK,
    #[serde(rename = "stoch_d")]
    StochasticD,
    #[serde(rename = "mfi")]
    MoneyFlow,
    #[serde(rename = "cci")]
    CommodityChannel,
}

impl OscillatorKind {
    pub const ALL: [OscillatorKind; 4] = [
        OscillatorKind::StochasticK,
        OscillatorKind::StochasticD,
        OscillatorKind::MoneyFlow,
        OscillatorKind::CommodityChannel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OscillatorKind::StochasticK => "stoch_k",
            OscillatorKind::StochasticD => "stoch_d",
            OscillatorKind::MoneyFlow => "mfi",
            OscillatorKind::CommodityChannel => "cci",
        }
    }
}

impl fmt::Display for OscillatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One oscillator value and its zone. `zone` is `None` while the value is NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorReading {
    pub kind: OscillatorKind,
    pub value: f64,
    pub zone: Option<Zone>,
}

impl OscillatorReading {
    pub fn classify(kind: OscillatorKind, value: f64, thresholds: ZoneThresholds) -> Self {
        Self {
            kind,
            value,
            zone: Zone::classify(value, thresholds),
        }
    }
}

/// Immutable indicator values captured at one bar or tick.
///
/// NaN marks a value that is not yet available (warm-up). Snapshots are built
/// fresh for every update; the builder methods consume `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// +DI line.
    pub directional_plus: f64,
    /// -DI line.
    pub directional_minus: f64,
    /// DX: raw directional movement strength.
    pub momentum: f64,
    /// ADX: smoothed directional movement strength.
    pub average_strength: f64,
    /// ATR as a percentage of close.
    pub volatility_percent: f64,
    pub oscillators: Vec<OscillatorReading>,
}

impl IndicatorSnapshot {
    pub fn new(
        directional_plus: f64,
        directional_minus: f64,
        momentum: f64,
        average_strength: f64,
    ) -> Self {
        Self {
            directional_plus,
            directional_minus,
            momentum,
            average_strength,
            volatility_percent: f64::NAN,
            oscillators: Vec::new(),
        }
    }

    /// A snapshot where every value is still warming up.
    pub fn warming_up() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn with_volatility(mut self, volatility_percent: f64) -> Self {
        self.volatility_percent = volatility_percent;
        self
    }

    /// Add (or replace) an oscillator reading, classifying it against `thresholds`.
    pub fn with_oscillator(
        self,
        kind: OscillatorKind,
        value: f64,
        thresholds: ZoneThresholds,
    ) -> Self {
        self.with_reading(OscillatorReading::classify(kind, value, thresholds))
    }

    pub fn with_reading(mut self, reading: OscillatorReading) -> Self {
        match self.oscillators.iter_mut().find(|r| r.kind == reading.kind) {
            Some(existing) => *existing = reading,
            None => self.oscillators.push(reading),
        }
        self
    }

    pub fn oscillator(&self, kind: OscillatorKind) -> Option<&OscillatorReading> {
        self.oscillators.iter().find(|r| r.kind == kind)
    }

    /// Zone of `kind`, `None` if absent or NaN.
    pub fn zone(&self, kind: OscillatorKind) -> Option<Zone> {
        self.oscillator(kind).and_then(|r| r.zone)
    }

    /// Directional context: Long when +DI > -DI, Short when -DI > +DI.
    pub fn context_side(&self) -> Option<Side> {
        Side::from_directional(self.directional_plus, self.directional_minus)
    }

    /// The directional line on `side`'s own side (+DI for Long, -DI for Short).
    pub fn superior_line(&self, side: Side) -> f64 {
        match side {
            Side::Long => self.directional_plus,
            Side::Short => self.directional_minus,
        }
    }

    /// The directional line opposing `side`.
    pub fn inferior_line(&self, side: Side) -> f64 {
        self.superior_line(side.opposite())
    }

    /// `|momentum - average_strength|`, NaN if either is NaN.
    pub fn gap(&self) -> f64 {
        (self.momentum - self.average_strength).abs()
    }

    /// `true` once the four directional values are all available.
    pub fn is_warm(&self) -> bool {
        [
            self.directional_plus,
            self.directional_minus,
            self.momentum,
            self.average_strength,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
