//! Lifecycle Report: customer lifecycle and rank/share reports over a
//! warehouse snapshot.
//!
//! Loads configuration, runs the lifecycle pipeline once, and writes the
//! requested report as CSV or JSON.

mod render;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use lifecycle_core::config::AppConfig;
use lifecycle_core::types::{Granularity, WarehouseSnapshot};
use lifecycle_engine::pipeline::LifecyclePipeline;
use render::{MetricArg, ReportKind};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "lifecycle-report")]
#[command(about = "Customer lifecycle and rank/share reports over a warehouse snapshot")]
#[command(version)]
struct Cli {
    /// Warehouse snapshot (JSON)
    #[arg(long, env = "LIFECYCLE_SNAPSHOT")]
    snapshot: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "LIFECYCLE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ReportKind::Lifecycle)]
    report: ReportKind,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Ranking metric for category and department reports
    #[arg(long, value_enum, default_value_t = MetricArg::Sales)]
    metric: MetricArg,

    /// Report date for a rolling window; replaces any configured window
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Period granularity: week, month or year (overrides config)
    #[arg(long, env = "LIFECYCLE__ANALYSIS__GRANULARITY")]
    granularity: Option<Granularity>,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Command-line flags win over the config file. `LIFECYCLE__ANALYSIS__AS_OF`
/// is read by the config layer and leaves explicit window bounds alone.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(as_of) = cli.as_of {
        config.analysis.as_of = Some(as_of);
        config.analysis.window_start = None;
        config.analysis.window_end = None;
    }
    if let Some(granularity) = cli.granularity {
        config.analysis.granularity = granularity;
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so reports can be piped from stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifecycle_report=info,lifecycle_engine=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(Some(path.as_path()))
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config from environment, using defaults");
            AppConfig::default()
        }),
    };

    apply_overrides(&mut config, &cli);

    info!(
        snapshot = %cli.snapshot.display(),
        report = ?cli.report,
        granularity = ?config.analysis.granularity,
        "Configuration loaded"
    );

    let snapshot = WarehouseSnapshot::from_path(&cli.snapshot)?;
    info!(
        orders = snapshot.orders.len(),
        lines = snapshot.lines.len(),
        calendar_days = snapshot.calendar.len(),
        "Snapshot loaded"
    );

    let pipeline = LifecyclePipeline::new(&config);
    let table = render::render(&pipeline, &snapshot, cli.report, cli.metric.into())?;

    let body = match cli.format {
        OutputFormat::Csv => table.to_csv(),
        OutputFormat::Json => table.to_json()?,
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), rows = table.len(), "Report written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(body.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}
