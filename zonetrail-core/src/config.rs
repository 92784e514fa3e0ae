//! Engine configuration: every tunable the pipeline reads, loadable from TOML.
//!
//! Each component validates its own section at construction time, so an
//! invalid configuration never reaches the per-bar path.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::detector::DetectorConfig;
use crate::fingerprint::ConfigId;
use crate::indicators::{IndicatorConfig, ZoneConfig};
use crate::risk::RiskConfig;
use crate::signal::SignalConfig;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field}: must be finite")]
    NonFinite { field: String },
    #[error("{field}: must be >= 0, got {value}")]
    Negative { field: String, value: f64 },
    #[error("{field}: min {min} must be below max {max}")]
    InvertedRange { field: String, min: f64, max: f64 },
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to fingerprint config: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Check that `value` is finite and not negative.
pub(crate) fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite {
            field: field.into(),
        });
    }
    if value < 0.0 {
        return Err(ConfigError::Negative {
            field: field.into(),
            value,
        });
    }
    Ok(())
}

/// Check that `min < max` (both finite).
pub(crate) fn ordered(field: &str, min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(ConfigError::NonFinite {
            field: field.into(),
        });
    }
    if min >= max {
        return Err(ConfigError::InvertedRange {
            field: field.into(),
            min,
            max,
        });
    }
    Ok(())
}

/// Complete configuration for one symbol pipeline.
///
/// ```toml
/// [indicators]
/// dmi_period = 14
///
/// [[detectors]]
/// mode = "rising"
/// use_recheck = [false, true, false, false, false, false]
///
/// [risk]
/// trend_trailing_percent = 2.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub zones: ZoneConfig,
    pub detectors: Vec<DetectorConfig>,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(),
            zones: ZoneConfig::default(),
            detectors: vec![DetectorConfig::crossover(), DetectorConfig::respiration()],
            signal: SignalConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing sections take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        self.zones.validate()?;
        for (i, detector) in self.detectors.iter().enumerate() {
            detector
                .validate()
                .map_err(|e| prefix_field(e, &format!("detectors[{i}]")))?;
        }
        self.signal.validate()?;
        self.risk.validate()?;
        // Untracked zones are never classified, so escalation could stall.
        for tracked in &self.risk.tracked {
            if !self.indicators.oscillators.contains(&tracked.kind) {
                return Err(ConfigError::Invalid {
                    field: "risk.tracked".into(),
                    reason: format!("{} is not listed in indicators.oscillators", tracked.kind),
                });
            }
        }
        Ok(())
    }

    /// Deterministic identity of this configuration.
    pub fn fingerprint(&self) -> Result<ConfigId, ConfigError> {
        Ok(ConfigId::of(self)?)
    }
}

fn prefix_field(error: ConfigError, prefix: &str) -> ConfigError {
    match error {
        ConfigError::NonFinite { field } => ConfigError::NonFinite {
            field: format!("{prefix}.{field}"),
        },
        ConfigError::Negative { field, value } => ConfigError::Negative {
            field: format!("{prefix}.{field}"),
            value,
        },
        ConfigError::InvertedRange { field, min, max } => ConfigError::InvertedRange {
            field: format!("{prefix}.{field}"),
            min,
            max,
        },
        ConfigError::Invalid { field, reason } => ConfigError::Invalid {
            field: format!("{prefix}.{field}"),
            reason,
        },
        other => other,
    }
}
