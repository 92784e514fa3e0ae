//! Bar files: CSV ingestion with row-level errors, CSV export, and seeded
//! synthetic random walks for development runs.
//!
//! Expected columns: `time,open,high,low,close[,volume]`. `date` and
//! `timestamp` are accepted for the time column; `volume` defaults to 0.
//! Timestamps may be `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, RFC 3339 without
//! offset, or integer Unix seconds.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use zonetrail_core::domain::Bar;

/// Errors from reading bar files. Row errors carry the 1-based file line.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: unrecognized timestamp '{value}'")]
    BadTime { line: u64, value: String },

    #[error("line {line}: inconsistent OHLCV values")]
    InsaneBar { line: u64 },

    #[error("line {line}: timestamp {time} is not after the previous bar")]
    OutOfOrder { line: u64, time: NaiveDateTime },

    #[error("no bars in input")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "timestamp")]
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(time);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.naive_utc())
}

/// Symbol name for a bar file: the file stem, upper-cased.
pub fn symbol_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".into())
}

/// Read bars from any CSV source. Rows must be strictly increasing in time.
pub fn read_bars<R: Read>(reader: R, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|source| DataError::Csv { line: 1, source })?
        .clone();
    let mut record = csv::StringRecord::new();
    let mut bars: Vec<Bar> = Vec::new();

    loop {
        let more = rdr.read_record(&mut record).map_err(|source| DataError::Csv {
            line: source.position().map_or(0, |p| p.line()),
            source,
        })?;
        if !more {
            break;
        }
        let line = record.position().map_or(0, |p| p.line());
        let row: CsvRow = record
            .deserialize(Some(&headers))
            .map_err(|source| DataError::Csv { line, source })?;

        let time = parse_time(&row.time).ok_or_else(|| DataError::BadTime {
            line,
            value: row.time.clone(),
        })?;
        let bar = Bar {
            symbol: symbol.to_string(),
            time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(0.0),
        };
        if !bar.is_sane() {
            return Err(DataError::InsaneBar { line });
        }
        if bars.last().is_some_and(|prev| prev.time >= bar.time) {
            return Err(DataError::OutOfOrder { line, time });
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(DataError::Empty);
    }
    Ok(bars)
}

/// Load a bar file; the symbol is taken from the file name.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let symbol = symbol_from_path(path);
    let bars = read_bars(file, &symbol)?;
    debug!(path = %path.display(), %symbol, bars = bars.len(), "loaded bar file");
    Ok(bars)
}

/// Write bars in the same layout `read_bars` accepts.
pub fn write_bars<W: Write>(writer: W, bars: &[Bar]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["time", "open", "high", "low", "close", "volume"])?;
    for bar in bars {
        wtr.write_record([
            bar.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Seeded random walk from 100.0, one bar per `step_minutes`.
///
/// Drift is redrawn every 40 bars so the series trends, reverses and
/// ranges; the same seed always yields the same bars.
pub fn generate_synthetic_bars(
    symbol: &str,
    seed: u64,
    count: usize,
    start: NaiveDateTime,
    step_minutes: i64,
) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    let mut drift = 0.0_f64;

    for i in 0..count {
        if i % 40 == 0 {
            drift = rng.gen_range(-0.004..0.004);
        }
        let ret: f64 = drift + rng.gen_range(-0.015..0.015);
        let open = price;
        let close = (price * (1.0 + ret)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.008));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.008));
        let volume = rng.gen_range(500.0..5_000.0_f64).round();

        bars.push(Bar {
            symbol: symbol.to_string(),
            time: start + chrono::Duration::minutes(step_minutes * i as i64),
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }
    bars
}
