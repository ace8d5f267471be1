//! TOML pipeline configuration.
//!
//! Every section has defaults, so a minimal file only names the three input
//! tables. `validate` runs after parsing; a config that parses but fails
//! validation is rejected before any stage starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use eventstudy_core::data::{MissingReturnPolicy, RawColumns};
use eventstudy_core::matcher::MatchPolicy;
use eventstudy_core::shifter::{ShiftConfig, ShiftFailurePolicy};
use eventstudy_core::window::WindowSpec;

use crate::acquisition::AcquisitionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("serialize config: {0}")]
    Serialize(String),
}

/// Raw input tables. CSV or Parquet by extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    pub worldscope: PathBuf,
    pub datastream: PathBuf,
    pub link: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            worldscope: PathBuf::from("data/pulled/ws_stock.csv"),
            datastream: PathBuf::from("data/pulled/ds2dsf.csv"),
            link: PathBuf::from("data/pulled/link_ds_ws.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Last calendar year whose announcements are kept.
    pub cutoff_year: i32,
    pub missing_returns: MissingReturnPolicy,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            cutoff_year: 2023,
            missing_returns: MissingReturnPolicy::Drop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventWindowConfig {
    pub offsets: Vec<i32>,
    pub match_policy: MatchPolicy,
    /// Offsets whose zero returns are shifted forward.
    pub shift_offsets: Vec<i32>,
    pub shift_failure: ShiftFailurePolicy,
}

impl Default for EventWindowConfig {
    fn default() -> Self {
        Self {
            offsets: vec![-1, 0, 1],
            match_policy: MatchPolicy::NearestFuture,
            shift_offsets: vec![-1, 0, 1],
            shift_failure: ShiftFailurePolicy::RemoveWindow,
        }
    }
}

impl EventWindowConfig {
    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec::new(self.offsets.clone())
    }

    pub fn shift_config(&self) -> ShiftConfig {
        ShiftConfig {
            offsets: self.shift_offsets.clone(),
            failure_policy: self.shift_failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Adjusted R² subtracted to obtain abnormal R².
    pub benchmark_r2: f64,
    /// Also fit one regression over all years.
    pub pooled: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            benchmark_r2: 0.048,
            pooled: true,
        }
    }
}

/// Output locations. Unset paths fall back to fixed names under `dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prepared_csv: Option<PathBuf>,
    pub prepared_parquet: Option<PathBuf>,
    pub event_bhr_csv: Option<PathBuf>,
    pub event_bhr_parquet: Option<PathBuf>,
    pub annual_bhr_csv: Option<PathBuf>,
    pub annual_bhr_parquet: Option<PathBuf>,
    pub summary_csv: Option<PathBuf>,
    pub regression_csv: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/generated"),
            prepared_csv: None,
            prepared_parquet: None,
            event_bhr_csv: None,
            event_bhr_parquet: None,
            annual_bhr_csv: None,
            annual_bhr_parquet: None,
            summary_csv: None,
            regression_csv: None,
            manifest: None,
        }
    }
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub prepared_csv: PathBuf,
    pub prepared_parquet: PathBuf,
    pub event_bhr_csv: PathBuf,
    pub event_bhr_parquet: PathBuf,
    pub annual_bhr_csv: PathBuf,
    pub annual_bhr_parquet: PathBuf,
    pub summary_csv: PathBuf,
    pub regression_csv: PathBuf,
    pub manifest: PathBuf,
}

impl OutputConfig {
    pub fn resolve(&self) -> OutputPaths {
        let pick = |path: &Option<PathBuf>, name: &str| {
            path.clone().unwrap_or_else(|| self.dir.join(name))
        };
        OutputPaths {
            prepared_csv: pick(&self.prepared_csv, "prepared.csv"),
            prepared_parquet: pick(&self.prepared_parquet, "prepared.parquet"),
            event_bhr_csv: pick(&self.event_bhr_csv, "bhr_event.csv"),
            event_bhr_parquet: pick(&self.event_bhr_parquet, "bhr_event.parquet"),
            annual_bhr_csv: pick(&self.annual_bhr_csv, "bhr_annual.csv"),
            annual_bhr_parquet: pick(&self.annual_bhr_parquet, "bhr_annual.parquet"),
            summary_csv: pick(&self.summary_csv, "summary_statistics.csv"),
            regression_csv: pick(&self.regression_csv, "regression.csv"),
            manifest: pick(&self.manifest, "manifest.json"),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inputs: InputPaths,
    pub columns: RawColumns,
    pub sample: SampleConfig,
    pub event_window: EventWindowConfig,
    pub analysis: AnalysisConfig,
    pub outputs: OutputConfig,
    pub acquisition: AcquisitionConfig,
}

impl PipelineConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.announcement_dates.len() != 4 {
            return Err(ConfigError::Invalid(format!(
                "columns.announcement_dates must name 4 columns (Q1..Q4), got {}",
                self.columns.announcement_dates.len()
            )));
        }
        if self.columns.date_formats.is_empty() {
            return Err(ConfigError::Invalid("columns.date_formats is empty".into()));
        }
        let window = &self.event_window;
        if let Some(missing) = [-1, 0, 1].into_iter().find(|o| !window.offsets.contains(o)) {
            return Err(ConfigError::Invalid(format!(
                "event_window.offsets must include -1, 0 and 1 (missing {missing})"
            )));
        }
        if let Some(extra) = window.shift_offsets.iter().find(|o| !window.offsets.contains(o)) {
            return Err(ConfigError::Invalid(format!(
                "event_window.shift_offsets contains {extra}, which is not a window offset"
            )));
        }
        if !self.analysis.benchmark_r2.is_finite() {
            return Err(ConfigError::Invalid("analysis.benchmark_r2 must be finite".into()));
        }
        Ok(())
    }

    /// BLAKE3 hash of the canonical JSON form. Equal configs hash equally
    /// regardless of TOML formatting.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn output_paths(&self) -> OutputPaths {
        self.outputs.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[inputs]
worldscope = "raw/ws.csv"
datastream = "raw/ds.parquet"
link = "raw/link.csv"
"#;

    #[test]
    fn minimal_file_gets_defaults() {
        let config = PipelineConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.inputs.datastream, PathBuf::from("raw/ds.parquet"));
        assert_eq!(config.sample.cutoff_year, 2023);
        assert_eq!(config.event_window.match_policy, MatchPolicy::NearestFuture);
        assert_eq!(config.event_window.shift_failure, ShiftFailurePolicy::RemoveWindow);
        assert_eq!(config.analysis.benchmark_r2, 0.048);
        assert_eq!(config.columns.announcement_dates[3], "item5904");
        let paths = config.output_paths();
        assert_eq!(paths.regression_csv, PathBuf::from("data/generated/regression.csv"));
    }

    #[test]
    fn policies_parse_from_snake_case() {
        let toml = format!(
            "{MINIMAL}\n[event_window]\nmatch_policy = \"exact\"\nshift_offsets = [0]\nshift_failure = \"drop_row\"\n\n[sample]\nmissing_returns = \"zero\"\n"
        );
        let config = PipelineConfig::from_toml(&toml).unwrap();
        assert_eq!(config.event_window.match_policy, MatchPolicy::Exact);
        assert_eq!(config.event_window.shift_offsets, vec![0]);
        assert_eq!(config.event_window.shift_failure, ShiftFailurePolicy::DropRow);
        assert_eq!(config.sample.missing_returns, MissingReturnPolicy::Zero);
    }

    #[test]
    fn shift_offsets_must_be_window_offsets() {
        let toml = format!("{MINIMAL}\n[event_window]\nshift_offsets = [0, 2]\n");
        let err = PipelineConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn window_needs_the_three_day_core() {
        let toml = format!("{MINIMAL}\n[event_window]\noffsets = [0, 1, 2]\nshift_offsets = [0]\n");
        assert!(PipelineConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn wrong_number_of_announcement_columns_is_rejected() {
        let toml = format!("{MINIMAL}\n[columns]\nannouncement_dates = [\"a\", \"b\", \"c\"]\n");
        assert!(matches!(
            PipelineConfig::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            PipelineConfig::from_toml("[inputs\nworldscope = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/eventstudy.toml");
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.acquisition.datastream_vars.len(), 3);
        assert_eq!(config, PipelineConfig::from_file(&path).unwrap());
    }

    #[test]
    fn config_hash_tracks_content() {
        let a = PipelineConfig::from_toml(MINIMAL).unwrap();
        let mut b = a.clone();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        b.analysis.benchmark_r2 = 0.05;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }
}
