//! Deterministic identification of configurations and bar datasets.
//!
//! - `ConfigId`: BLAKE3 of the canonical JSON of a configuration.
//! - `DatasetHash`: BLAKE3 over the OHLCV content of a bar series.
//!
//! Both appear in log lines and CLI output so two scans can be matched to the
//! exact inputs that produced them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Bar;

/// Deterministic configuration ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigId(pub String);

impl ConfigId {
    /// Hash the JSON form of `config`. Struct fields serialize in declaration
    /// order, so equal configs always produce equal IDs.
    pub fn of<T: Serialize>(config: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(config)?;
        Ok(Self(blake3::hash(json.as_bytes()).to_hex().to_string()))
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of a bar series (symbol, timestamps and OHLCV bit patterns).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of_bars(bars: &[Bar]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in bars {
            hasher.update(bar.symbol.as_bytes());
            hasher.update(&bar.time.and_utc().timestamp().to_le_bytes());
            for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
                hasher.update(&value.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[derive(Serialize)]
    struct Params {
        period: usize,
        width: f64,
    }

    #[test]
    fn config_id_is_deterministic() {
        let a = ConfigId::of(&Params { period: 14, width: 2.5 }).unwrap();
        let b = ConfigId::of(&Params { period: 14, width: 2.5 }).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn config_id_differs_for_different_params() {
        let a = ConfigId::of(&Params { period: 14, width: 2.5 }).unwrap();
        let b = ConfigId::of(&Params { period: 14, width: 3.0 }).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let mut changed = bars.clone();
        changed[1].close = 101.5;
        assert_eq!(DatasetHash::of_bars(&bars), DatasetHash::of_bars(&bars));
        assert_ne!(DatasetHash::of_bars(&bars), DatasetHash::of_bars(&changed));
    }
}
