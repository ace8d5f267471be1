//! Event-study runner: configuration, stage orchestration, analysis, exports.
//!
//! This crate builds on `eventstudy-core` to provide:
//! - TOML configuration with validation and a content hash
//! - The prepare / BHR / analyze stages and a full run with manifest
//! - Summary statistics and per-year OLS regressions
//! - CSV and JSON exports
//! - Acquisition query rendering and a synthetic sample generator

pub mod acquisition;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod regression;
pub mod summary;
pub mod synth;

pub use acquisition::{AcquisitionConfig, QuerySpec};
pub use config::{ConfigError, OutputPaths, PipelineConfig};
pub use export::{RunManifest, StageCounts};
pub use pipeline::{
    analyze, bhr_from_prepared, compute_bhr, prepare, run_pipeline, AnalysisOutput, BhrOutput,
    PrepareOutput, RunError, RunOutput,
};
pub use regression::{RegressionOutcome, RegressionRow};
pub use summary::SummaryRow;
pub use synth::{write_synthetic, SynthConfig, SynthSummary};
