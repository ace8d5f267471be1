//! Stage orchestration.
//!
//! Four entry points, one per CLI command:
//! - `prepare()`: raw tables to the prepared panel
//! - `compute_bhr()` / `bhr_from_prepared()`: panel plus returns to BHR tables
//! - `analyze()`: BHR tables to summary statistics and regressions
//! - `run_pipeline()`: all of the above plus the run manifest
//!
//! Every stage writes its outputs before returning, so each command can be
//! run on its own against the previous command's files.

use chrono::Utc;
use std::path::Path;
use thiserror::Error;

use eventstudy_core::aggregate::{aggregate_event_bhr, annual_bhr, AnnualBhrOutcome, EventBhrOutcome};
use eventstudy_core::data::{
    build_prepared, load_link, load_observations, load_worldscope, read_annual_bhr,
    read_event_bhr, read_prepared, write_annual_bhr, write_event_bhr, write_prepared, DataError,
    ObservationLoad, PreparedRow,
};
use eventstudy_core::domain::{FirmYearRecord, TradingObservation};
use eventstudy_core::filter::{filter_valid_earnings, zero_return_profile, FilterStats, ZeroReturnProfile};
use eventstudy_core::linkage::{link_tables, LinkageStats};
use eventstudy_core::matcher::{deviation_stats, match_candidates, DeviationStats, TradingCalendar};
use eventstudy_core::report::{PipelineReporter, SkipReason, Stage};
use eventstudy_core::selector::{select_complete_event_years, select_complete_firm_years};
use eventstudy_core::shifter::{shift_zero_returns, ShiftFailure};
use eventstudy_core::window::{build_event_windows, WindowSpec};

use crate::config::{ConfigError, PipelineConfig};
use crate::export::{
    compute_dataset_hash, write_manifest, write_regression_csv, write_summary_csv, RunManifest,
    StageCounts, MANIFEST_SCHEMA_VERSION,
};
use crate::regression::{build_regression_sample, run_regressions, RegressionOutcome};
use crate::summary::{summary_statistics, SummaryRow};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("export error: {0}")]
    Export(String),
}

impl RunError {
    fn export(err: anyhow::Error) -> Self {
        RunError::Export(format!("{err:#}"))
    }
}

/// Result of the preparation stage.
#[derive(Debug, Clone)]
pub struct PrepareOutput {
    pub records: Vec<FirmYearRecord>,
    pub observations: Vec<TradingObservation>,
    pub prepared: Vec<PreparedRow>,
    pub linkage: LinkageStats,
    pub filter: FilterStats,
    pub missing_returns: usize,
    pub zero_returns: ZeroReturnProfile,
    pub deviation: DeviationStats,
}

/// Result of the BHR stage. Matched rows are not kept; only counts are.
#[derive(Debug, Clone)]
pub struct BhrOutput {
    pub candidates: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub without_firm_data: usize,
    pub deviation: DeviationStats,
    pub shifted: usize,
    pub shift_removed_rows: usize,
    pub shift_failures: Vec<ShiftFailure>,
    pub kept_firm_years: usize,
    pub dropped_firm_years: usize,
    pub events: EventBhrOutcome,
    pub annual: AnnualBhrOutcome,
}

/// Result of the analysis stage.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub summary: Vec<SummaryRow>,
    pub regression: RegressionOutcome,
    pub sample_size: usize,
    pub incomplete_firm_years: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub prepare: PrepareOutput,
    pub bhr: BhrOutput,
    pub analysis: AnalysisOutput,
    pub manifest: RunManifest,
}

fn load_returns(config: &PipelineConfig, reporter: &dyn PipelineReporter) -> Result<ObservationLoad, RunError> {
    Ok(load_observations(
        &config.inputs.datastream,
        &config.columns,
        config.sample.missing_returns,
        reporter,
    )?)
}

/// Load, link and filter the raw tables, match day 0 of every announcement,
/// and write the prepared panel as CSV and Parquet.
pub fn prepare(config: &PipelineConfig, reporter: &dyn PipelineReporter) -> Result<PrepareOutput, RunError> {
    reporter.stage_started(Stage::Load);
    let worldscope = load_worldscope(&config.inputs.worldscope, &config.columns, reporter)?;
    let link = load_link(&config.inputs.link, &config.columns, reporter)?;
    let load = load_returns(config, reporter)?;
    reporter.stage_finished(
        Stage::Load,
        worldscope.len() + link.len() + load.observations.len(),
    );

    let zero_returns = zero_return_profile(&load.observations);
    reporter.note(
        Stage::Load,
        &format!(
            "{} of {} trading observations have a zero return; top years {:?}",
            zero_returns.zero_returns, zero_returns.observations, zero_returns.top_years
        ),
    );

    let (panel, linkage) = link_tables(worldscope, &link, load.observations, reporter);
    let (records, filter) = filter_valid_earnings(panel.records, config.sample.cutoff_year, reporter);

    let calendar = TradingCalendar::from_observations(&panel.observations);
    let day_0 = build_event_windows(&records, &WindowSpec::new(vec![0]), reporter);
    let matched = match_candidates(&day_0, &calendar, config.event_window.match_policy, reporter);
    let deviation = deviation_stats(&matched.rows);
    report_deviation(&deviation, reporter);

    let prepared = build_prepared(&records, &matched.rows);
    let paths = config.output_paths();
    reporter.stage_started(Stage::Export);
    write_prepared(&prepared, &[paths.prepared_csv.as_path(), paths.prepared_parquet.as_path()])?;
    log_written(&[&paths.prepared_csv, &paths.prepared_parquet]);
    reporter.stage_finished(Stage::Export, prepared.len());

    Ok(PrepareOutput {
        records,
        observations: panel.observations,
        prepared,
        linkage,
        filter,
        missing_returns: load.missing_returns,
        zero_returns,
        deviation,
    })
}

fn report_deviation(stats: &DeviationStats, reporter: &dyn PipelineReporter) {
    let means: Vec<String> = stats
        .mean_day_0_deviation
        .iter()
        .enumerate()
        .map(|(q, m)| match m {
            Some(m) => format!("Q{}={m:.3}", q + 1),
            None => format!("Q{}=n/a", q + 1),
        })
        .collect();
    reporter.note(
        Stage::Match,
        &format!(
            "mean day-0 deviation in days: {} (max {:?})",
            means.join(" "),
            stats.max_day_0_deviation
        ),
    );
}

fn log_written<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        tracing::info!(path = %path.as_ref().display(), "wrote output");
    }
}

/// Window, match, shift, select and aggregate, then write both BHR tables.
pub fn compute_bhr(
    config: &PipelineConfig,
    records: &[FirmYearRecord],
    observations: &[TradingObservation],
    reporter: &dyn PipelineReporter,
) -> Result<BhrOutput, RunError> {
    let window = &config.event_window;
    let calendar = TradingCalendar::from_observations(observations);
    let candidates = build_event_windows(records, &window.window_spec(), reporter);
    let matched = match_candidates(&candidates, &calendar, window.match_policy, reporter);
    let deviation = deviation_stats(&matched.rows);
    let matched_rows = matched.rows.len();

    let shifted = shift_zero_returns(matched.rows, &calendar, &window.shift_config(), reporter);
    let selected = select_complete_firm_years(shifted.rows, reporter);
    let mut events = aggregate_event_bhr(&selected.rows, reporter);
    let complete = select_complete_event_years(std::mem::take(&mut events.results), reporter);
    events.results = complete.results;
    events.skipped_incomplete_firm_year = complete.dropped_events;
    let annual = annual_bhr(&complete.firm_years, &calendar, reporter);

    let paths = config.output_paths();
    reporter.stage_started(Stage::Export);
    write_event_bhr(
        &events.results,
        &[paths.event_bhr_csv.as_path(), paths.event_bhr_parquet.as_path()],
    )?;
    write_annual_bhr(
        &annual.results,
        &[paths.annual_bhr_csv.as_path(), paths.annual_bhr_parquet.as_path()],
    )?;
    log_written(&[
        &paths.event_bhr_csv,
        &paths.event_bhr_parquet,
        &paths.annual_bhr_csv,
        &paths.annual_bhr_parquet,
    ]);
    reporter.stage_finished(Stage::Export, events.results.len() + annual.results.len());

    Ok(BhrOutput {
        candidates: candidates.len(),
        matched: matched_rows,
        unmatched: matched.unmatched,
        without_firm_data: matched.without_firm_data,
        deviation,
        shifted: shifted.shifted,
        shift_removed_rows: shifted.removed_rows,
        shift_failures: shifted.failures,
        kept_firm_years: complete.firm_years.len(),
        dropped_firm_years: selected.dropped_firm_years + complete.dropped_firm_years,
        events,
        annual,
    })
}

/// BHR stage on its own: read the prepared panel back and reload returns.
pub fn bhr_from_prepared(config: &PipelineConfig, reporter: &dyn PipelineReporter) -> Result<BhrOutput, RunError> {
    let paths = config.output_paths();
    reporter.stage_started(Stage::Load);
    let records: Vec<FirmYearRecord> = read_prepared(&paths.prepared_csv)?
        .into_iter()
        .map(|row| row.record)
        .collect();
    let load = load_returns(config, reporter)?;
    reporter.stage_finished(Stage::Load, records.len() + load.observations.len());
    compute_bhr(config, &records, &load.observations, reporter)
}

/// Read the BHR tables, compute summary statistics and regressions, and
/// write both CSVs.
pub fn analyze(config: &PipelineConfig, reporter: &dyn PipelineReporter) -> Result<AnalysisOutput, RunError> {
    let paths = config.output_paths();
    reporter.stage_started(Stage::Load);
    let events = read_event_bhr(&paths.event_bhr_csv)?;
    let annual = read_annual_bhr(&paths.annual_bhr_csv)?;
    reporter.stage_finished(Stage::Load, events.len() + annual.len());

    reporter.stage_started(Stage::Summary);
    let summary = summary_statistics(&annual, &events);
    for row in &summary {
        reporter.note(
            Stage::Summary,
            &format!(
                "{}: n={} mean={:?} median={:?} skew={:?}",
                row.category, row.n_obs, row.mean, row.median, row.skewness
            ),
        );
    }
    reporter.stage_finished(Stage::Summary, summary.len());

    let (sample, incomplete_firm_years) = build_regression_sample(&annual, &events);
    reporter.skipped(
        Stage::Regression,
        SkipReason::MissingData,
        incomplete_firm_years,
        "firm-years without an event BHR for every quarter",
    );
    let regression = run_regressions(
        &sample,
        config.analysis.benchmark_r2,
        config.analysis.pooled,
        reporter,
    );

    reporter.stage_started(Stage::Export);
    write_summary_csv(&paths.summary_csv, &summary).map_err(RunError::export)?;
    write_regression_csv(&paths.regression_csv, &regression.rows).map_err(RunError::export)?;
    log_written(&[&paths.summary_csv, &paths.regression_csv]);
    reporter.stage_finished(Stage::Export, summary.len() + regression.rows.len());

    Ok(AnalysisOutput {
        summary,
        regression,
        sample_size: sample.len(),
        incomplete_firm_years,
    })
}

/// Run every stage and write the manifest.
pub fn run_pipeline(config: &PipelineConfig, reporter: &dyn PipelineReporter) -> Result<RunOutput, RunError> {
    config.validate()?;
    let config_hash = config.config_hash()?;
    let dataset_hash = compute_dataset_hash(&[
        config.inputs.worldscope.as_path(),
        config.inputs.datastream.as_path(),
        config.inputs.link.as_path(),
    ])
    .map_err(|e| match config_input_missing(config) {
        Some(path) => RunError::Data(DataError::MissingInput(path.to_path_buf())),
        None => RunError::export(e),
    })?;

    let prepare = prepare(config, reporter)?;
    let bhr = compute_bhr(config, &prepare.records, &prepare.observations, reporter)?;
    let analysis = analyze(config, reporter)?;

    let manifest = RunManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        created_at: Utc::now(),
        config_hash,
        dataset_hash,
        match_policy: config.event_window.match_policy.name().to_string(),
        counts: StageCounts {
            linkage: prepare.linkage.clone(),
            filter: prepare.filter.clone(),
            missing_returns: prepare.missing_returns,
            candidates: bhr.candidates,
            matched: bhr.matched,
            unmatched: bhr.unmatched,
            without_firm_data: bhr.without_firm_data,
            shifted: bhr.shifted,
            shift_removed_rows: bhr.shift_removed_rows,
            kept_firm_years: bhr.kept_firm_years,
            dropped_firm_years: bhr.dropped_firm_years,
            event_bhr: bhr.events.results.len(),
            event_bhr_skipped: bhr.events.skipped(),
            annual_bhr: bhr.annual.results.len(),
            annual_bhr_skipped: bhr.annual.skipped_no_data,
            regression_sample: analysis.sample_size,
            regression_periods: analysis.regression.rows.len(),
            regression_periods_skipped: analysis.regression.skipped_small.len()
                + analysis.regression.skipped_singular.len(),
        },
        zero_returns: prepare.zero_returns.clone(),
        deviation: bhr.deviation.clone(),
        shift_failures: bhr.shift_failures.clone(),
    };
    let manifest_path = config.output_paths().manifest;
    write_manifest(&manifest_path, &manifest).map_err(RunError::export)?;
    log_written(&[&manifest_path]);

    Ok(RunOutput {
        prepare,
        bhr,
        analysis,
        manifest,
    })
}

fn config_input_missing(config: &PipelineConfig) -> Option<&Path> {
    [
        &config.inputs.worldscope,
        &config.inputs.datastream,
        &config.inputs.link,
    ]
    .into_iter()
    .find(|p| !p.exists())
    .map(|p| p.as_path())
}
