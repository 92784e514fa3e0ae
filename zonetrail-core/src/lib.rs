//! Zonetrail Core — crossover detection, zone signals and trailing-stop risk management.
//!
//! This crate contains the stream-processing core:
//! - Domain types (bars, sides, indicator snapshots)
//! - Indicator provider (DMI, ADX, ATR, stochastic, MFI, CCI) with NaN warm-up
//! - Zone classification and zone-transition tracking
//! - Lagged crossover detector with gated rechecks and sibling cancellation
//! - Signal generator combining crossovers and zone reversals
//! - Position risk manager with a never-loosening stop and inversion escalation
//! - Symbol pipeline wiring everything for one bar history

pub mod config;
pub mod detector;
pub mod domain;
pub mod fingerprint;
pub mod indicators;
pub mod pipeline;
pub mod risk;
pub mod signal;
pub mod zone;

pub use config::{ConfigError, EngineConfig};
pub use pipeline::{PipelineEvent, PipelineRecord, ScanSummary, SymbolPipeline};
