//! Scanning: one `SymbolPipeline` per bar series, fanned out over rayon.
//!
//! Output is JSON Lines: every pipeline record, then one summary line per
//! symbol carrying the dataset hash and the configuration fingerprint.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use zonetrail_core::domain::Bar;
use zonetrail_core::fingerprint::{ConfigId, DatasetHash};
use zonetrail_core::{EngineConfig, PipelineRecord, ScanSummary, SymbolPipeline};

use crate::data::{load_csv, symbol_from_path};

/// Everything one symbol's replay produced.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub dataset: DatasetHash,
    pub records: Vec<PipelineRecord>,
    pub summary: ScanSummary,
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    event: &'static str,
    config: &'a str,
    dataset: &'a str,
    #[serde(flatten)]
    summary: &'a ScanSummary,
}

/// Replay `bars` for `symbol` with a fresh pipeline.
pub fn scan_bars(config: &EngineConfig, symbol: &str, bars: &[Bar]) -> Result<ScanReport> {
    let mut pipeline = SymbolPipeline::new(symbol, config)
        .with_context(|| format!("invalid configuration for {symbol}"))?;
    let records = pipeline.run(bars);
    let summary = ScanSummary::from_records(symbol, bars.len(), &records);
    let dataset = DatasetHash::of_bars(bars);
    info!(
        %symbol,
        dataset = dataset.short(),
        crossovers = summary.crossovers,
        signals = summary.signals,
        positions = summary.positions,
        "scan complete"
    );
    Ok(ScanReport {
        dataset,
        records,
        summary,
    })
}

/// Load and scan every file in parallel. Results keep the input order.
pub fn scan_files(config: &EngineConfig, files: &[PathBuf]) -> Vec<(PathBuf, Result<ScanReport>)> {
    files
        .par_iter()
        .map(|path| {
            let result = load_csv(path)
                .with_context(|| format!("failed to load {}", path.display()))
                .and_then(|bars| scan_bars(config, &symbol_from_path(path), &bars));
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %format!("{e:#}"), "scan failed");
            }
            (path.clone(), result)
        })
        .collect()
}

/// Write a report as JSON Lines. With `summary_only`, records are skipped.
pub fn write_report<W: Write>(
    out: &mut W,
    config_id: &ConfigId,
    report: &ScanReport,
    summary_only: bool,
) -> Result<()> {
    if !summary_only {
        for record in &report.records {
            serde_json::to_writer(&mut *out, record)?;
            writeln!(out)?;
        }
    }
    let line = SummaryLine {
        event: "summary",
        config: config_id.short(),
        dataset: report.dataset.short(),
        summary: &report.summary,
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{generate_synthetic_bars, write_bars};
    use chrono::NaiveDate;

    fn bars(seed: u64) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        generate_synthetic_bars("SYN", seed, 600, start, 60)
    }

    #[test]
    fn report_ends_with_summary_line() {
        let config = EngineConfig::default();
        let report = scan_bars(&config, "SYN", &bars(3)).unwrap();
        let id = config.fingerprint().unwrap();

        let mut buf = Vec::new();
        write_report(&mut buf, &id, &report, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), report.records.len() + 1);

        let last: serde_json::Value = serde_json::from_str(lines[lines.len() - 1]).unwrap();
        assert_eq!(last["event"], "summary");
        assert_eq!(last["symbol"], "SYN");
        assert_eq!(last["bars"], 600);
        assert_eq!(last["config"], id.short());
        for line in &lines[..lines.len() - 1] {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["event"].is_string());
        }
    }

    #[test]
    fn summary_only_writes_one_line() {
        let config = EngineConfig::default();
        let report = scan_bars(&config, "SYN", &bars(4)).unwrap();
        let mut buf = Vec::new();
        write_report(&mut buf, &config.fingerprint().unwrap(), &report, true).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }

    #[test]
    fn scan_files_keeps_order_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = dir.path().join("aaa.csv");
        let good_b = dir.path().join("bbb.csv");
        let missing = dir.path().join("missing.csv");
        write_bars(std::fs::File::create(&good_a).unwrap(), &bars(1)).unwrap();
        write_bars(std::fs::File::create(&good_b).unwrap(), &bars(2)).unwrap();

        let files = vec![good_a.clone(), missing.clone(), good_b.clone()];
        let results = scan_files(&EngineConfig::default(), &files);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, good_a);
        assert_eq!(results[1].0, missing);
        assert_eq!(results[2].0, good_b);
        assert_eq!(results[0].1.as_ref().unwrap().summary.symbol, "AAA");
        assert!(results[1].1.is_err());
        assert_eq!(results[2].1.as_ref().unwrap().summary.symbol, "BBB");
    }

    #[test]
    fn same_input_same_report() {
        let config = EngineConfig::default();
        let a = scan_bars(&config, "SYN", &bars(9)).unwrap();
        let b = scan_bars(&config, "SYN", &bars(9)).unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.records.len(), b.records.len());
    }
}
