//! Signal generation: turns crossover events and oscillator zone transitions
//! into directional `TradeSignal`s with a confidence score and a trend class.
//!
//! Two sources feed candidates:
//! - a validated `CrossoverEvent` (takes precedence when both fire);
//! - a zone reversal, when enough oscillators leave the Low zone (Long) or
//!   the High zone (Short) on the same bar.
//!
//! Confidence rises with the share of oscillators whose zone does not argue
//! against the side. Signals below `min_confidence` are dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{non_negative, ConfigError};
use crate::detector::CrossoverEvent;
use crate::domain::{IndicatorSnapshot, OscillatorKind, Side};
use crate::risk::TrendClass;
use crate::zone::{Zone, ZoneEvent, ZoneTracker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub use_crossovers: bool,
    pub use_zone_reversals: bool,
    /// Oscillators that must leave the same extreme on one bar.
    pub min_zone_agreement: usize,
    /// Confidence with no supporting oscillator.
    pub base_confidence: f64,
    pub min_confidence: f64,
    /// ADX at or above which a with-context signal counts as `Trend`.
    pub trend_strength_threshold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            use_crossovers: true,
            use_zone_reversals: true,
            min_zone_agreement: 2,
            base_confidence: 0.5,
            min_confidence: 0.6,
            trend_strength_threshold: 25.0,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_zone_agreement == 0 {
            return Err(ConfigError::Invalid {
                field: "signal.min_zone_agreement".into(),
                reason: "must be >= 1".into(),
            });
        }
        for (field, value) in [
            ("signal.base_confidence", self.base_confidence),
            ("signal.min_confidence", self.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("must be within [0, 1], got {value}"),
                });
            }
        }
        non_negative(
            "signal.trend_strength_threshold",
            self.trend_strength_threshold,
        )
    }
}

/// What produced a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SignalSource {
    Crossover {
        detector: String,
        lag: usize,
        cross_index: usize,
    },
    ZoneReversal {
        oscillators: Vec<OscillatorKind>,
    },
}

/// A directional entry suggestion. Opening the position is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub index: usize,
    pub side: Side,
    pub confidence: f64,
    pub trend: TrendClass,
    pub source: SignalSource,
}

/// Stateful per-symbol signal generator.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: SignalConfig,
    trackers: Vec<ZoneTracker>,
}

impl SignalGenerator {
    /// `oscillators` are the kinds present in the snapshots this generator sees.
    pub fn new(config: SignalConfig, oscillators: &[OscillatorKind]) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            trackers: oscillators.iter().map(|&k| ZoneTracker::new(k)).collect(),
        })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.trackers.iter_mut().for_each(ZoneTracker::reset);
    }

    /// Feed bar `index`. Must be called for every bar, in order, so zone
    /// transitions are seen.
    pub fn on_bar(
        &mut self,
        index: usize,
        snapshot: &IndicatorSnapshot,
        crossover: Option<&CrossoverEvent>,
    ) -> Option<TradeSignal> {
        let transitions: Vec<ZoneEvent> = self
            .trackers
            .iter_mut()
            .filter_map(|t| {
                let zone = snapshot.zone(t.kind());
                t.observe(index, zone)
            })
            .collect();

        // Trend classification needs the DMI lines; zones are still tracked above.
        if !snapshot.is_warm() {
            return None;
        }

        let (side, source) = match crossover.filter(|_| self.config.use_crossovers) {
            Some(event) => (
                event.side,
                SignalSource::Crossover {
                    detector: event.detector.clone(),
                    lag: event.lag,
                    cross_index: event.cross_index,
                },
            ),
            None if self.config.use_zone_reversals => self.zone_reversal(&transitions)?,
            None => return None,
        };

        let confidence = self.confidence(side, snapshot);
        if confidence < self.config.min_confidence {
            debug!(index, %side, confidence, "signal below minimum confidence");
            return None;
        }

        let trend = self.classify_trend(side, snapshot);
        debug!(index, %side, confidence, %trend, "signal generated");
        Some(TradeSignal {
            index,
            side,
            confidence,
            trend,
            source,
        })
    }

    /// Long when enough oscillators leave Low, Short when enough leave High.
    /// Both at once is ambiguous and yields nothing.
    fn zone_reversal(&self, transitions: &[ZoneEvent]) -> Option<(Side, SignalSource)> {
        let leaving = |zone: Zone| -> Vec<OscillatorKind> {
            transitions
                .iter()
                .filter(|e| e.exits(zone))
                .map(|e| e.kind)
                .collect()
        };
        let from_low = leaving(Zone::Low);
        let from_high = leaving(Zone::High);
        let need = self.config.min_zone_agreement;

        match (from_low.len() >= need, from_high.len() >= need) {
            (true, false) => Some((
                Side::Long,
                SignalSource::ZoneReversal {
                    oscillators: from_low,
                },
            )),
            (false, true) => Some((
                Side::Short,
                SignalSource::ZoneReversal {
                    oscillators: from_high,
                },
            )),
            _ => None,
        }
    }

    /// `base + (1 - base) * supportive / tracked`, in [0, 1].
    pub fn confidence(&self, side: Side, snapshot: &IndicatorSnapshot) -> f64 {
        let tracked = self.trackers.len();
        if tracked == 0 {
            return self.config.base_confidence;
        }
        let supportive = self
            .trackers
            .iter()
            .filter(|t| snapshot.zone(t.kind()).is_some_and(|z| z.supports(side)))
            .count();
        let base = self.config.base_confidence;
        (base + (1.0 - base) * supportive as f64 / tracked as f64).clamp(0.0, 1.0)
    }

    /// With-context and strong ADX is `Trend`; against the DI context is
    /// `CounterTrend`; anything else is `Unclassified`.
    pub fn classify_trend(&self, side: Side, snapshot: &IndicatorSnapshot) -> TrendClass {
        match snapshot.context_side() {
            Some(context)
                if context == side
                    && snapshot.average_strength >= self.config.trend_strength_threshold =>
            {
                TrendClass::Trend
            }
            Some(context) if context != side => TrendClass::CounterTrend,
            _ => TrendClass::Unclassified,
        }
    }
}
