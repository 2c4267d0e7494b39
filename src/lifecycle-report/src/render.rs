//! Turns one pipeline run into the requested report table.

use anyhow::Context;
use clap::ValueEnum;
use lifecycle_core::types::{AnalysisWindow, WarehouseSnapshot};
use lifecycle_engine::pipeline::{LifecyclePipeline, LifecycleRun};
use lifecycle_reporting::categories::{
    add_uncategorized, rank_classes, rank_departments, summarize_classes, summarize_departments,
    CategoryMetric, CategorySummary,
};
use lifecycle_reporting::customers::{rank_customers, summarize_customers};
use lifecycle_reporting::qualification::{qualify, rank_qualified};
use lifecycle_reporting::segments::segment_mix;
use lifecycle_reporting::yoy::compare_year_over_year;
use lifecycle_reporting::{IntoReportTable, ReportTable};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// New/Retained/Reactivated counts per period and segment
    Lifecycle,
    /// Customers ranked by spend within tenure groups
    Customers,
    /// Classes ranked within their department
    Categories,
    /// Departments ranked against each other
    Departments,
    /// Segment share of each period's revenue
    Segments,
    /// Customers meeting the qualification rule
    Qualified,
    /// Lifecycle rows against the same period last year
    Yoy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    Sales,
    Units,
    Backorder,
}

impl From<MetricArg> for CategoryMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Sales => CategoryMetric::Sales,
            MetricArg::Units => CategoryMetric::Units,
            MetricArg::Backorder => CategoryMetric::Backorder,
        }
    }
}

pub fn render(
    pipeline: &LifecyclePipeline,
    snapshot: &WarehouseSnapshot,
    report: ReportKind,
    metric: CategoryMetric,
) -> anyhow::Result<ReportTable> {
    let run = pipeline.run(snapshot)?;
    let lines_dropped = run.gaps.lines_dropped();
    let unmapped_dates = run.unmapped_dates;

    let table = match report {
        ReportKind::Lifecycle => run.aggregates.into_report_table()?,
        ReportKind::Customers => {
            rank_customers(summarize_customers(&run.classified, &run.history, &run.window))
                .into_report_table()?
        }
        ReportKind::Categories => rank_classes(category_rows(&run), metric).into_report_table()?,
        ReportKind::Departments => {
            let classes = category_rows(&run);
            rank_departments(summarize_departments(&classes), metric).into_report_table()?
        }
        ReportKind::Segments => segment_mix(&run.aggregates).into_report_table()?,
        ReportKind::Qualified => {
            let rule = &pipeline.config().qualification;
            rank_qualified(qualify(&run.classified, rule, &run.window)).into_report_table()?
        }
        ReportKind::Yoy => {
            let prior = prior_year_run(pipeline, snapshot, &run)?;
            let prior_rows = prior.map(|p| p.aggregates).unwrap_or_default();
            compare_year_over_year(&run.aggregates, &prior_rows, &run.calendar, run.granularity)
                .into_report_table()?
        }
    };

    info!(
        report = ?report,
        rows = table.len(),
        lines_dropped = lines_dropped,
        unmapped_dates = unmapped_dates,
        "Report rendered"
    );
    Ok(table)
}

/// Class totals including revenue held out of classification for lack of
/// taxonomy.
fn category_rows(run: &LifecycleRun) -> Vec<CategorySummary> {
    let mut classes = summarize_classes(&run.classified);
    add_uncategorized(&mut classes, &run.uncategorized);
    classes
}

/// Runs the pipeline over the window one fiscal year before `run`'s.
fn prior_year_run(
    pipeline: &LifecyclePipeline,
    snapshot: &WarehouseSnapshot,
    run: &LifecycleRun,
) -> anyhow::Result<Option<LifecycleRun>> {
    let start = run.calendar.same_period_last_year(run.window.start, run.granularity);
    let end = run.calendar.same_period_last_year(run.window.end, run.granularity);
    let (Some(start), Some(end)) = (start, end) else {
        warn!(
            window_start = %run.window.start,
            window_end = %run.window.end,
            "Calendar does not cover the prior-year window; comparing against nothing"
        );
        return Ok(None);
    };
    let window = AnalysisWindow::new(start, end).context("prior-year window")?;
    Ok(Some(pipeline.run_window(snapshot, window)))
}
