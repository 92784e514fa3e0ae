//! Indicator provider — turns a bar history into aligned `IndicatorSnapshot`s.
//!
//! The provider computes every series once over the whole history and then
//! reads them back by index. Each snapshot carries the DMI lines, ATR% and the
//! configured oscillators already classified into zones.

use serde::{Deserialize, Serialize};

use super::atr::Atr;
use super::cci::Cci;
use super::dmi::Dmi;
use super::indicator::{Indicator, IndicatorValues};
use super::mfi::Mfi;
use super::stochastic::Stochastic;
use crate::config::ConfigError;
use crate::domain::{Bar, IndicatorSnapshot, OscillatorKind};
use crate::zone::ZoneThresholds;

/// Series name under which ATR% is stored.
const VOLATILITY_KEY: &str = "atr_percent";

/// Closed bars behind a forming bar, as a multiple of the warm-up length.
/// Wilder-smoothed series forget their seed well inside this window.
const FORMING_CONTEXT_MULTIPLE: usize = 10;

/// Indicator periods and the oscillators included in each snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub dmi_period: usize,
    pub atr_period: usize,
    pub stoch_k_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_period: usize,
    pub mfi_period: usize,
    pub cci_period: usize,
    pub oscillators: Vec<OscillatorKind>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            dmi_period: 14,
            atr_period: 14,
            stoch_k_period: 14,
            stoch_k_smooth: 3,
            stoch_d_period: 3,
            mfi_period: 14,
            cci_period: 20,
            oscillators: OscillatorKind::ALL.to_vec(),
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("indicators.dmi_period", self.dmi_period),
            ("indicators.atr_period", self.atr_period),
            ("indicators.stoch_k_period", self.stoch_k_period),
            ("indicators.stoch_k_smooth", self.stoch_k_smooth),
            ("indicators.stoch_d_period", self.stoch_d_period),
            ("indicators.mfi_period", self.mfi_period),
            ("indicators.cci_period", self.cci_period),
        ];
        for (field, period) in periods {
            if period == 0 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "period must be >= 1".into(),
                });
            }
        }
        for (i, kind) in self.oscillators.iter().enumerate() {
            if self.oscillators[..i].contains(kind) {
                return Err(ConfigError::Invalid {
                    field: "indicators.oscillators".into(),
                    reason: format!("{kind} listed twice"),
                });
            }
        }
        Ok(())
    }

    fn oscillator_indicator(&self, kind: OscillatorKind) -> Box<dyn Indicator> {
        match kind {
            OscillatorKind::StochasticK => {
                Box::new(Stochastic::k(self.stoch_k_period, self.stoch_k_smooth))
            }
            OscillatorKind::StochasticD => Box::new(Stochastic::d(
                self.stoch_k_period,
                self.stoch_k_smooth,
                self.stoch_d_period,
            )),
            OscillatorKind::MoneyFlow => Box::new(Mfi::new(self.mfi_period)),
            OscillatorKind::CommodityChannel => Box::new(Cci::new(self.cci_period)),
        }
    }
}

/// Zone thresholds for each oscillator family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub stoch_k: ZoneThresholds,
    pub stoch_d: ZoneThresholds,
    pub mfi: ZoneThresholds,
    pub cci: ZoneThresholds,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            stoch_k: ZoneThresholds::default_for(OscillatorKind::StochasticK),
            stoch_d: ZoneThresholds::default_for(OscillatorKind::StochasticD),
            mfi: ZoneThresholds::default_for(OscillatorKind::MoneyFlow),
            cci: ZoneThresholds::default_for(OscillatorKind::CommodityChannel),
        }
    }
}

impl ZoneConfig {
    pub fn thresholds(&self, kind: OscillatorKind) -> ZoneThresholds {
        match kind {
            OscillatorKind::StochasticK => self.stoch_k,
            OscillatorKind::StochasticD => self.stoch_d,
            OscillatorKind::MoneyFlow => self.mfi,
            OscillatorKind::CommodityChannel => self.cci,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in OscillatorKind::ALL {
            self.thresholds(kind)
                .validate(&format!("zones.{}", kind.as_str()))?;
        }
        Ok(())
    }
}

/// Computes indicator series and assembles snapshots.
#[derive(Debug, Clone)]
pub struct IndicatorProvider {
    config: IndicatorConfig,
    zones: ZoneConfig,
}

impl IndicatorProvider {
    pub fn new(config: IndicatorConfig, zones: ZoneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        zones.validate()?;
        Ok(Self { config, zones })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn zones(&self) -> &ZoneConfig {
        &self.zones
    }

    /// Bars required before every series in a snapshot is available.
    pub fn warmup_bars(&self) -> usize {
        let dmi = Dmi::adx(self.config.dmi_period).lookback();
        let atr = Atr::new(self.config.atr_period).lookback();
        self.config
            .oscillators
            .iter()
            .map(|&kind| self.config.oscillator_indicator(kind).lookback())
            .fold(dmi.max(atr), usize::max)
    }

    /// Compute every configured series over `bars`.
    pub fn compute(&self, bars: &[Bar]) -> IndicatorValues {
        let period = self.config.dmi_period;
        let mut values = IndicatorValues::new();

        let dmi = Dmi::compute_all(period, bars);
        values.insert(Dmi::plus(period).name(), dmi.plus_di);
        values.insert(Dmi::minus(period).name(), dmi.minus_di);
        values.insert(Dmi::dx(period).name(), dmi.dx);
        values.insert(Dmi::adx(period).name(), dmi.adx);

        values.insert(
            VOLATILITY_KEY,
            Atr::new(self.config.atr_period).percent_of_close(bars),
        );

        for &kind in &self.config.oscillators {
            let indicator = self.config.oscillator_indicator(kind);
            values.insert(kind.as_str(), indicator.compute(bars));
        }

        values
    }

    /// Snapshot at `index` from precomputed `values`.
    pub fn snapshot_at(&self, values: &IndicatorValues, index: usize) -> IndicatorSnapshot {
        let period = self.config.dmi_period;
        let mut snapshot = IndicatorSnapshot::new(
            values.get_or_nan(Dmi::plus(period).name(), index),
            values.get_or_nan(Dmi::minus(period).name(), index),
            values.get_or_nan(Dmi::dx(period).name(), index),
            values.get_or_nan(Dmi::adx(period).name(), index),
        )
        .with_volatility(values.get_or_nan(VOLATILITY_KEY, index));

        for &kind in &self.config.oscillators {
            snapshot = snapshot.with_oscillator(
                kind,
                values.get_or_nan(kind.as_str(), index),
                self.zones.thresholds(kind),
            );
        }
        snapshot
    }

    /// One snapshot per bar.
    pub fn snapshots(&self, bars: &[Bar]) -> Vec<IndicatorSnapshot> {
        let values = self.compute(bars);
        (0..bars.len())
            .map(|i| self.snapshot_at(&values, i))
            .collect()
    }

    /// Closed bars a forming snapshot is evaluated on.
    pub fn forming_context_bars(&self) -> usize {
        (self.warmup_bars() + 1) * FORMING_CONTEXT_MULTIPLE
    }

    /// Snapshot for a bar that is still forming, evaluated on top of the
    /// closed `history`. Used for per-tick risk updates.
    ///
    /// Only the last `forming_context_bars` of `history` are read, so the cost
    /// per tick does not grow with the history. Windowed oscillators are exact;
    /// DMI and ATR agree with the full series to well below display precision.
    pub fn forming_snapshot(&self, history: &[Bar], forming: &Bar) -> IndicatorSnapshot {
        let start = history.len().saturating_sub(self.forming_context_bars());
        let history = &history[start..];
        let mut bars = Vec::with_capacity(history.len() + 1);
        bars.extend_from_slice(history);
        bars.push(forming.clone());
        let values = self.compute(&bars);
        self.snapshot_at(&values, bars.len() - 1)
    }
}
