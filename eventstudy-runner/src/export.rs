//! Analysis outputs: summary and regression CSVs, run manifest JSON, and the
//! input-dataset hash recorded in the manifest.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use eventstudy_core::filter::{FilterStats, ZeroReturnProfile};
use eventstudy_core::linkage::LinkageStats;
use eventstudy_core::matcher::DeviationStats;
use eventstudy_core::shifter::ShiftFailure;

use crate::regression::RegressionRow;
use crate::summary::SummaryRow;

/// Current schema version of `manifest.json`.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Render summary statistics as CSV text.
pub fn summary_csv(rows: &[SummaryRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "category",
        "n_obs",
        "mean",
        "median",
        "skewness",
        "pct_zero",
        "pct_positive",
    ])?;
    for row in rows {
        wtr.write_record([
            row.category.clone(),
            row.n_obs.to_string(),
            cell(row.mean),
            cell(row.median),
            cell(row.skewness),
            cell(row.pct_zero),
            cell(row.pct_positive),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush summary CSV")?;
    String::from_utf8(bytes).context("summary CSV is not valid UTF-8")
}

/// Render regression rows as CSV text.
pub fn regression_csv(rows: &[RegressionRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "period",
        "intercept",
        "slope_q1",
        "slope_q2",
        "slope_q3",
        "slope_q4",
        "r2",
        "adj_r2",
        "abnormal_r2",
        "n_obs",
    ])?;
    for row in rows {
        let mut record = vec![row.period.clone(), row.intercept.to_string()];
        record.extend(row.slopes.iter().map(|s| s.to_string()));
        record.extend([
            row.r2.to_string(),
            row.adj_r2.to_string(),
            row.abnormal_r2.to_string(),
            row.n_obs.to_string(),
        ]);
        wtr.write_record(&record)?;
    }
    let bytes = wtr.into_inner().context("failed to flush regression CSV")?;
    String::from_utf8(bytes).context("regression CSV is not valid UTF-8")
}

pub fn write_summary_csv(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, summary_csv(rows)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_regression_csv(path: &Path, rows: &[RegressionRow]) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, regression_csv(rows)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Row counts of every stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageCounts {
    pub linkage: LinkageStats,
    pub filter: FilterStats,
    pub missing_returns: usize,
    pub candidates: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub without_firm_data: usize,
    pub shifted: usize,
    pub shift_removed_rows: usize,
    pub kept_firm_years: usize,
    pub dropped_firm_years: usize,
    pub event_bhr: usize,
    pub event_bhr_skipped: usize,
    pub annual_bhr: usize,
    pub annual_bhr_skipped: usize,
    pub regression_sample: usize,
    pub regression_periods: usize,
    pub regression_periods_skipped: usize,
}

/// Everything needed to tell two runs apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub config_hash: String,
    pub dataset_hash: String,
    pub match_policy: String,
    pub counts: StageCounts,
    pub zero_returns: ZeroReturnProfile,
    pub deviation: DeviationStats,
    pub shift_failures: Vec<ShiftFailure>,
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")?;
    fs::write(path, json).with_context(|| format!("failed to write manifest to {}", path.display()))
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > MANIFEST_SCHEMA_VERSION {
        anyhow::bail!(
            "unsupported manifest schema version {} (max supported: {})",
            manifest.schema_version,
            MANIFEST_SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

/// BLAKE3 over the bytes of every input file, in the given order. The file
/// name is hashed too, so swapping two inputs changes the hash.
pub fn compute_dataset_hash(paths: &[&Path]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in paths {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        hasher.update(name.as_bytes());
        let mut file =
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        io::copy(&mut file, &mut hasher)
            .with_context(|| format!("failed to hash {}", path.display()))?;
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::describe;

    #[test]
    fn summary_csv_leaves_missing_cells_blank() {
        let rows = vec![describe("Calendar-Year Returns", &[0.1, 0.2]), describe("empty", &[])];
        let text = summary_csv(&rows).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "category,n_obs,mean,median,skewness,pct_zero,pct_positive");
        assert!(lines[1].starts_with("Calendar-Year Returns,2,"));
        assert_eq!(lines[2], "empty,0,,,,,");
    }

    #[test]
    fn regression_csv_has_one_line_per_period() {
        let rows = vec![RegressionRow {
            period: "all".into(),
            intercept: 0.01,
            slopes: [1.0, 2.0, 3.0, 4.0],
            r2: 0.5,
            adj_r2: 0.4,
            abnormal_r2: 0.352,
            n_obs: 40,
        }];
        let text = regression_csv(&rows).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.lines().nth(1), Some("all,0.01,1,2,3,4,0.5,0.4,0.352,40"));
    }

    #[test]
    fn manifest_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/manifest.json");
        let manifest = RunManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            created_at: Utc::now(),
            config_hash: "abc".into(),
            dataset_hash: "def".into(),
            match_policy: "nearest_future".into(),
            counts: StageCounts::default(),
            zero_returns: ZeroReturnProfile::default(),
            deviation: DeviationStats::default(),
            shift_failures: Vec::new(),
        };
        write_manifest(&path, &manifest).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), manifest);
    }

    #[test]
    fn dataset_hash_depends_on_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "x\n1\n").unwrap();
        fs::write(&b, "x\n2\n").unwrap();
        let h1 = compute_dataset_hash(&[&a, &b]).unwrap();
        assert_eq!(h1, compute_dataset_hash(&[&a, &b]).unwrap());
        fs::write(&b, "x\n3\n").unwrap();
        assert_ne!(h1, compute_dataset_hash(&[&a, &b]).unwrap());
    }
}
