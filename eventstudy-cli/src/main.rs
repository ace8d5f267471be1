//! `eventstudy` binary.
//!
//! - `prepare`: load, link and filter the raw tables; write the prepared panel
//! - `bhr`: event and annual BHR from the prepared panel
//! - `analyze`: summary statistics and per-year regressions from the BHR tables
//! - `run`: all three stages plus the run manifest
//! - `synth`: deterministic synthetic raw tables
//! - `queries`: acquisition SQL for the configured variables and filters

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use eventstudy_core::report::TracingReporter;
use eventstudy_runner::{
    analyze, bhr_from_prepared, prepare, run_pipeline, write_synthetic, AnalysisOutput,
    BhrOutput, PipelineConfig, SynthConfig,
};

#[derive(Parser)]
#[command(
    name = "eventstudy",
    about = "Earnings-announcement event study: buy-and-hold returns and Ball (2008) regressions"
)]
struct Cli {
    /// Path to the TOML pipeline config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, link and filter the raw tables and write the prepared panel.
    Prepare,
    /// Compute event and annual BHR from the prepared panel.
    Bhr,
    /// Compute summary statistics and regressions from the BHR tables.
    Analyze,
    /// Run prepare, bhr and analyze, then write the run manifest.
    Run,
    /// Write synthetic raw tables to the configured input paths.
    Synth {
        /// Number of firms.
        #[arg(long, default_value_t = 25)]
        firms: usize,

        /// First calendar year.
        #[arg(long, default_value_t = 2015)]
        start_year: i32,

        /// Number of calendar years.
        #[arg(long, default_value_t = 5)]
        years: usize,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print the acquisition queries.
    Queries,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare => run_prepare(&require_config(cli.config.as_deref())?),
        Commands::Bhr => run_bhr(&require_config(cli.config.as_deref())?),
        Commands::Analyze => run_analyze(&require_config(cli.config.as_deref())?),
        Commands::Run => run_all(&require_config(cli.config.as_deref())?),
        Commands::Synth {
            firms,
            start_year,
            years,
            seed,
        } => run_synth(
            &optional_config(cli.config.as_deref())?,
            SynthConfig {
                firms,
                start_year,
                years,
                seed,
                ..Default::default()
            },
        ),
        Commands::Queries => run_queries(&optional_config(cli.config.as_deref())?),
    }
}

fn require_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        bail!("--config is required for this command");
    };
    let config = PipelineConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    tracing::info!(config = %path.display(), policy = ?config.event_window.match_policy, "config loaded");
    Ok(config)
}

fn optional_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(_) => require_config(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_prepare(config: &PipelineConfig) -> Result<()> {
    let out = prepare(config, &TracingReporter)?;
    println!();
    println!("=== Prepared Panel ===");
    println!("Linked firm-years:   {}", out.linkage.records);
    println!("Valid firm-years:    {}", out.filter.kept);
    println!("Trading days:        {}", out.observations.len());
    println!("Null returns:        {}", out.missing_returns);
    println!(
        "Zero returns:        {} ({:.2}%)",
        out.zero_returns.zero_returns,
        pct(out.zero_returns.zero_returns, out.zero_returns.observations)
    );
    for (q, mean) in out.deviation.mean_day_0_deviation.iter().enumerate() {
        if let Some(mean) = mean {
            println!("Q{} day-0 deviation:  {mean:.3} days", q + 1);
        }
    }
    let paths = config.output_paths();
    println!("Written: {}", paths.prepared_csv.display());
    println!("Written: {}", paths.prepared_parquet.display());
    Ok(())
}

fn run_bhr(config: &PipelineConfig) -> Result<()> {
    let out = bhr_from_prepared(config, &TracingReporter)?;
    print_bhr(&out);
    let paths = config.output_paths();
    println!("Written: {}", paths.event_bhr_csv.display());
    println!("Written: {}", paths.annual_bhr_csv.display());
    Ok(())
}

fn run_analyze(config: &PipelineConfig) -> Result<()> {
    let out = analyze(config, &TracingReporter)?;
    print_analysis(&out);
    let paths = config.output_paths();
    println!("Written: {}", paths.summary_csv.display());
    println!("Written: {}", paths.regression_csv.display());
    Ok(())
}

fn run_all(config: &PipelineConfig) -> Result<()> {
    let out = run_pipeline(config, &TracingReporter)?;
    print_bhr(&out.bhr);
    print_analysis(&out.analysis);
    println!();
    println!("Config hash:  {}", out.manifest.config_hash);
    println!("Dataset hash: {}", out.manifest.dataset_hash);
    println!("Manifest:     {}", config.output_paths().manifest.display());
    Ok(())
}

fn run_synth(config: &PipelineConfig, synth: SynthConfig) -> Result<()> {
    let summary = write_synthetic(&synth, &config.columns, &config.inputs)?;
    println!("Synthetic sample (seed {}):", synth.seed);
    println!(
        "  {} worldscope rows -> {}",
        summary.worldscope_rows,
        config.inputs.worldscope.display()
    );
    println!(
        "  {} datastream rows -> {}",
        summary.datastream_rows,
        config.inputs.datastream.display()
    );
    println!("  {} link rows -> {}", summary.link_rows, config.inputs.link.display());
    Ok(())
}

fn run_queries(config: &PipelineConfig) -> Result<()> {
    for query in config.acquisition.queries() {
        println!("-- {}", query.name);
        println!("{};", query.render());
    }
    Ok(())
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn print_bhr(out: &BhrOutput) {
    println!();
    println!("=== Buy-and-Hold Returns ===");
    println!("Candidates:          {}", out.candidates);
    println!("Matched rows:        {}", out.matched);
    println!("Unmatched:           {}", out.unmatched + out.without_firm_data);
    println!("Shifted zero days:   {}", out.shifted);
    println!("Shift failures:      {}", out.shift_failures.len());
    println!("Complete firm-years: {}", out.kept_firm_years);
    println!("Dropped firm-years:  {}", out.dropped_firm_years);
    println!(
        "Event BHR:           {} ({} skipped)",
        out.events.results.len(),
        out.events.skipped()
    );
    println!(
        "Annual BHR:          {} ({} skipped)",
        out.annual.results.len(),
        out.annual.skipped_no_data
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:>9.4}")).unwrap_or_else(|| format!("{:>9}", "-"))
}

fn print_analysis(out: &AnalysisOutput) {
    println!();
    println!("=== Summary Statistics ===");
    println!(
        "{:<46} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Category", "N", "Mean", "Median", "Skew", "%=0", "%>0"
    );
    for row in &out.summary {
        println!(
            "{:<46} {:>6} {} {} {} {} {}",
            row.category,
            row.n_obs,
            fmt_opt(row.mean),
            fmt_opt(row.median),
            fmt_opt(row.skewness),
            fmt_opt(row.pct_zero),
            fmt_opt(row.pct_positive)
        );
    }

    println!();
    println!("=== Regressions (annual BHR on quarterly BHR) ===");
    println!(
        "{:<6} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Period", "N", "b0", "b1", "b2", "b3", "b4", "Abn. R2"
    );
    for row in &out.regression.rows {
        println!(
            "{:<6} {:>6} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            row.period,
            row.n_obs,
            row.intercept,
            row.slopes[0],
            row.slopes[1],
            row.slopes[2],
            row.slopes[3],
            row.abnormal_r2
        );
    }
    let skipped: Vec<&str> = out
        .regression
        .skipped_small
        .iter()
        .chain(&out.regression.skipped_singular)
        .map(String::as_str)
        .collect();
    if !skipped.is_empty() {
        println!("Skipped periods: {}", skipped.join(", "));
    }
}
