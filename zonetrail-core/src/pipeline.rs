//! Symbol pipeline: wires indicators, detectors, the signal generator and a
//! risk manager for one symbol and replays a bar history through them.
//!
//! Per bar:
//! 1. If a position is open, feed prices to the risk manager. In `Normal`
//!    monitoring that is one update at the close after checking the bar's
//!    adverse extreme against the stop. Once monitoring is active, every point
//!    of the open → low → high → close path is a tick. Ticks before the close
//!    see a snapshot of the bar as formed so far, never its close.
//! 2. Step every detector.
//! 3. Feed the signal generator with the first crossover of the bar.
//! 4. Open a position on a signal when none was open at any point this bar.
//!
//! The pipeline follows positions but never simulates fills or equity.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::detector::{CrossoverEvent, LaggedCrossoverDetector};
use crate::domain::{Bar, IndicatorSnapshot, Side};
use crate::indicators::IndicatorProvider;
use crate::risk::{
    EarlyExitDecision, RiskManager, StateChange, TrailingAdjustment, TrendClass, UpdateOutcome,
};
use crate::signal::{SignalGenerator, TradeSignal};

/// Why a tracked position was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopHit,
    EarlyExit,
}

/// Something the pipeline observed or decided at one bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Crossover(CrossoverEvent),
    Signal(TradeSignal),
    PositionOpened {
        side: Side,
        entry_price: f64,
        stop_price: f64,
        trailing_percent: f64,
        trend: TrendClass,
    },
    MonitoringChanged(StateChange),
    Adjustment(TrailingAdjustment),
    EarlyExit(EarlyExitDecision),
    PositionClosed {
        reason: CloseReason,
        price: f64,
        profit_percent: f64,
    },
}

/// One output line: an event stamped with symbol, bar index and bar time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRecord {
    pub symbol: String,
    pub index: usize,
    pub time: NaiveDateTime,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

/// Event counts for one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub symbol: String,
    pub bars: usize,
    pub crossovers: usize,
    pub signals: usize,
    pub positions: usize,
    pub adjustments: usize,
    pub rejected_adjustments: usize,
    pub early_exits: usize,
    pub stop_hits: usize,
}

impl ScanSummary {
    pub fn from_records(symbol: &str, bars: usize, records: &[PipelineRecord]) -> Self {
        let mut summary = ScanSummary {
            symbol: symbol.to_string(),
            bars,
            ..ScanSummary::default()
        };
        for record in records {
            match &record.event {
                PipelineEvent::Crossover(_) => summary.crossovers += 1,
                PipelineEvent::Signal(_) => summary.signals += 1,
                PipelineEvent::PositionOpened { .. } => summary.positions += 1,
                PipelineEvent::Adjustment(a) if a.success => summary.adjustments += 1,
                PipelineEvent::Adjustment(_) => summary.rejected_adjustments += 1,
                PipelineEvent::PositionClosed { reason, .. } => match reason {
                    CloseReason::StopHit => summary.stop_hits += 1,
                    CloseReason::EarlyExit => summary.early_exits += 1,
                },
                PipelineEvent::MonitoringChanged(_) | PipelineEvent::EarlyExit(_) => {}
            }
        }
        summary
    }
}

/// Everything needed to replay one symbol.
#[derive(Debug)]
pub struct SymbolPipeline {
    symbol: String,
    provider: IndicatorProvider,
    detectors: Vec<LaggedCrossoverDetector>,
    signals: SignalGenerator,
    risk: RiskManager,
}

impl SymbolPipeline {
    pub fn new(symbol: impl Into<String>, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let provider = IndicatorProvider::new(config.indicators.clone(), config.zones.clone())?;
        let detectors = config
            .detectors
            .iter()
            .cloned()
            .map(LaggedCrossoverDetector::new)
            .collect::<Result<Vec<_>, _>>()?;
        let signals = SignalGenerator::new(config.signal.clone(), &config.indicators.oscillators)?;
        let risk = RiskManager::new(config.risk.clone())?;
        Ok(Self {
            symbol: symbol.into(),
            provider,
            detectors,
            signals,
            risk,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn provider(&self) -> &IndicatorProvider {
        &self.provider
    }

    pub fn detectors(&self) -> &[LaggedCrossoverDetector] {
        &self.detectors
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    /// Clear detector, zone and position state.
    pub fn reset(&mut self) {
        self.detectors.iter_mut().for_each(LaggedCrossoverDetector::reset);
        self.signals.reset();
        self.risk.on_position_closed();
    }

    /// Replay `bars` from a clean state and collect every event.
    pub fn run(&mut self, bars: &[Bar]) -> Vec<PipelineRecord> {
        self.reset();
        let snapshots = self.provider.snapshots(bars);
        info!(
            symbol = %self.symbol,
            bars = bars.len(),
            warmup = self.provider.warmup_bars(),
            "replaying bars"
        );

        let warming = IndicatorSnapshot::warming_up();
        let mut records = Vec::new();
        for (index, (bar, snapshot)) in bars.iter().zip(&snapshots).enumerate() {
            let previous = index
                .checked_sub(1)
                .map_or(&warming, |p| &snapshots[p]);
            let history = &bars[..index];
            for event in self.process_bar(index, history, bar, previous, snapshot) {
                records.push(PipelineRecord {
                    symbol: self.symbol.clone(),
                    index,
                    time: bar.time,
                    event,
                });
            }
        }
        records
    }

    fn process_bar(
        &mut self,
        index: usize,
        history: &[Bar],
        bar: &Bar,
        previous: &IndicatorSnapshot,
        snapshot: &IndicatorSnapshot,
    ) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        let was_open = self.risk.is_open();
        if was_open {
            self.track_position(history, bar, snapshot, &mut events);
        }

        let mut first_crossover = None;
        for detector in &mut self.detectors {
            if let Some(event) = detector.step(index, previous, snapshot) {
                if first_crossover.is_none() {
                    first_crossover = Some(event.clone());
                }
                events.push(PipelineEvent::Crossover(event));
            }
        }

        if let Some(signal) = self
            .signals
            .on_bar(index, snapshot, first_crossover.as_ref())
        {
            events.push(PipelineEvent::Signal(signal.clone()));
            if !was_open {
                self.open_position(bar, snapshot, &signal, &mut events);
            } else {
                debug!(index, side = %signal.side, "signal ignored: position already tracked");
            }
        }

        events
    }

    fn open_position(
        &self,
        bar: &Bar,
        snapshot: &IndicatorSnapshot,
        signal: &TradeSignal,
        events: &mut Vec<PipelineEvent>,
    ) {
        match self.risk.on_position_opened(
            signal.side,
            bar.close,
            bar.time,
            snapshot.clone(),
            signal.trend,
        ) {
            Ok(position) => events.push(PipelineEvent::PositionOpened {
                side: position.side,
                entry_price: position.entry_price,
                stop_price: position.stop_price,
                trailing_percent: position.trailing_percent,
                trend: position.trend,
            }),
            Err(e) => warn!(symbol = %self.symbol, error = %e, "could not open position"),
        }
    }

    fn track_position(
        &self,
        history: &[Bar],
        bar: &Bar,
        snapshot: &IndicatorSnapshot,
        events: &mut Vec<PipelineEvent>,
    ) {
        if !self.risk.is_monitoring_active() {
            let Some(side) = self.risk.position().map(|p| p.side) else {
                return;
            };
            let adverse = match side {
                Side::Long => bar.low,
                Side::Short => bar.high,
            };
            if self.stop_breached(adverse, events) {
                return;
            }
            let outcome = self.risk.on_update(bar.close, snapshot);
            self.record_outcome(bar.close, outcome, events);
            return;
        }

        // Monitoring active: walk the intrabar path tick by tick.
        for (price, forming) in intrabar_ticks(bar) {
            if self.stop_breached(price, events) {
                return;
            }
            let tick_snapshot = self.provider.forming_snapshot(history, &forming);
            let outcome = self.risk.on_update(price, &tick_snapshot);
            if self.record_outcome(price, outcome, events) {
                return;
            }
        }
        if self.stop_breached(bar.close, events) {
            return;
        }
        let outcome = self.risk.on_update(bar.close, snapshot);
        self.record_outcome(bar.close, outcome, events);
    }

    /// Close on a stop breach at `price`. Returns `true` if the position closed.
    fn stop_breached(&self, price: f64, events: &mut Vec<PipelineEvent>) -> bool {
        if !self.risk.should_trigger_stop(price) {
            return false;
        }
        let Some(position) = self.risk.position() else {
            return false;
        };
        // Reported at the stop level; fills are the caller's concern.
        let exit = position.stop_price;
        self.risk.on_position_closed();
        events.push(PipelineEvent::PositionClosed {
            reason: CloseReason::StopHit,
            price: exit,
            profit_percent: position.profit_percent(exit),
        });
        true
    }

    /// Record an update. Returns `true` if an early exit closed the position.
    fn record_outcome(
        &self,
        price: f64,
        outcome: UpdateOutcome,
        events: &mut Vec<PipelineEvent>,
    ) -> bool {
        let should_exit = outcome.should_exit();
        if let Some(change) = outcome.state_change {
            events.push(PipelineEvent::MonitoringChanged(change));
        }
        events.extend(outcome.adjustments.into_iter().map(PipelineEvent::Adjustment));

        if !should_exit {
            return false;
        }
        let profit = outcome
            .early_exit
            .as_ref()
            .map_or(f64::NAN, |d| d.profit_percent);
        if let Some(decision) = outcome.early_exit {
            events.push(PipelineEvent::EarlyExit(decision));
        }
        self.risk.on_position_closed();
        events.push(PipelineEvent::PositionClosed {
            reason: CloseReason::EarlyExit,
            price,
            profit_percent: profit,
        });
        true
    }
}

/// Open, low and high ticks of `bar`, each with the bar as formed up to that
/// point. The close is not a forming tick; it uses the closed bar.
///
/// Intrabar volume is unknown, so forming bars carry none.
fn intrabar_ticks(bar: &Bar) -> [(f64, Bar); 3] {
    let forming = |high: f64, low: f64, price: f64| Bar {
        high,
        low,
        close: price,
        volume: 0.0,
        ..bar.clone()
    };
    [
        (bar.open, forming(bar.open, bar.open, bar.open)),
        (bar.low, forming(bar.open, bar.low, bar.low)),
        (bar.high, forming(bar.high, bar.low, bar.high)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OscillatorKind;
    use crate::indicators::{make_bars, IndicatorConfig};

    fn config() -> EngineConfig {
        EngineConfig {
            indicators: IndicatorConfig {
                dmi_period: 3,
                atr_period: 3,
                stoch_k_period: 3,
                stoch_k_smooth: 1,
                stoch_d_period: 2,
                mfi_period: 3,
                cci_period: 3,
                ..IndicatorConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn swings(n: usize) -> Vec<Bar> {
        let closes: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64;
                100.0 + 0.4 * t + 6.0 * (t / 5.0).sin()
            })
            .collect();
        make_bars(&closes)
    }

    #[test]
    fn records_are_in_bar_order() {
        let mut pipeline = SymbolPipeline::new("TEST", &config()).unwrap();
        let records = pipeline.run(&swings(120));
        assert!(records.windows(2).all(|w| w[0].index <= w[1].index));
        assert!(records.iter().all(|r| r.symbol == "TEST"));
    }

    #[test]
    fn positions_open_and_close_in_sequence() {
        let mut pipeline = SymbolPipeline::new("TEST", &config()).unwrap();
        let records = pipeline.run(&swings(200));
        let mut open = false;
        for record in &records {
            match record.event {
                PipelineEvent::PositionOpened { .. } => {
                    assert!(!open, "opened twice at bar {}", record.index);
                    open = true;
                }
                PipelineEvent::PositionClosed { .. } => {
                    assert!(open, "closed while flat at bar {}", record.index);
                    open = false;
                }
                PipelineEvent::Adjustment(_) | PipelineEvent::MonitoringChanged(_) => {
                    assert!(open)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn replay_is_deterministic() {
        let bars = swings(150);
        let mut a = SymbolPipeline::new("TEST", &config()).unwrap();
        let mut b = SymbolPipeline::new("TEST", &config()).unwrap();
        let first = a.run(&bars);
        assert_eq!(first.len(), b.run(&bars).len());
        // Running again on the same instance starts from a clean state.
        assert_eq!(first.len(), a.run(&bars).len());
    }

    #[test]
    fn summary_counts_events() {
        let mut pipeline = SymbolPipeline::new("TEST", &config()).unwrap();
        let bars = swings(200);
        let records = pipeline.run(&bars);
        let summary = ScanSummary::from_records("TEST", bars.len(), &records);
        assert_eq!(summary.bars, 200);
        assert!(summary.positions >= summary.stop_hits + summary.early_exits);
        assert!(summary.signals >= summary.positions);
    }

    #[test]
    fn records_serialize_with_event_tag() {
        let record = PipelineRecord {
            symbol: "TEST".into(),
            index: 7,
            time: make_bars(&[1.0])[0].time,
            event: PipelineEvent::PositionClosed {
                reason: CloseReason::StopHit,
                price: 98.0,
                profit_percent: -2.0,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "position_closed");
        assert_eq!(json["reason"], "stop_hit");
        assert_eq!(json["index"], 7);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = config();
        config.risk.tracked.clear();
        assert!(SymbolPipeline::new("TEST", &config).is_err());
    }

    #[test]
    fn rejects_tracked_oscillator_that_is_not_computed() {
        let mut config = config();
        config.indicators.oscillators =
            vec![OscillatorKind::MoneyFlow, OscillatorKind::CommodityChannel];
        match SymbolPipeline::new("TEST", &config) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "risk.tracked"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn intrabar_ticks_only_see_prices_so_far() {
        let bar = Bar {
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 108.0,
            ..make_bars(&[100.0])[0].clone()
        };
        let ticks = intrabar_ticks(&bar);
        let prices: Vec<f64> = ticks.iter().map(|(p, _)| *p).collect();
        assert_eq!(prices, vec![100.0, 95.0, 110.0]);

        let (_, at_open) = &ticks[0];
        assert_eq!((at_open.high, at_open.low, at_open.close), (100.0, 100.0, 100.0));
        let (_, at_low) = &ticks[1];
        assert_eq!((at_low.high, at_low.low, at_low.close), (100.0, 95.0, 95.0));
        let (_, at_high) = &ticks[2];
        assert_eq!((at_high.high, at_high.low, at_high.close), (110.0, 95.0, 110.0));
        for (_, forming) in &ticks {
            assert!(forming.is_sane());
            assert_eq!(forming.open, bar.open);
            assert_eq!(forming.volume, 0.0);
        }
    }

    #[test]
    fn adjustments_carry_the_snapshot_of_their_tick() {
        let bars = swings(300);
        let mut pipeline = SymbolPipeline::new("TEST", &config()).unwrap();
        let records = pipeline.run(&bars);
        let provider = pipeline.provider();
        let closed = provider.snapshots(&bars);
        let json = |s: &IndicatorSnapshot| serde_json::to_string(s).unwrap();

        for record in &records {
            let PipelineEvent::Adjustment(adj) = &record.event else {
                continue;
            };
            let i = record.index;
            let mut expected = Vec::new();
            if adj.price == bars[i].close {
                expected.push(json(&closed[i]));
            }
            for (price, forming) in intrabar_ticks(&bars[i]) {
                if price == adj.price {
                    expected.push(json(&provider.forming_snapshot(&bars[..i], &forming)));
                }
            }
            assert!(
                expected.contains(&json(&adj.snapshot)),
                "adjustment at bar {i} price {} used a snapshot from another tick",
                adj.price
            );
        }
    }
}
