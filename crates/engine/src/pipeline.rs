//! One parameterized run of extraction → bucketing → classification →
//! aggregation. Every report is built from a [`LifecycleRun`].

use lifecycle_core::calendar::FiscalCalendar;
use lifecycle_core::config::AppConfig;
use lifecycle_core::error::LifecycleResult;
use lifecycle_core::types::{AnalysisWindow, Granularity, Period, PurchaseEvent, WarehouseSnapshot};
use tracing::{info, warn};

use crate::aggregate::{aggregate, AggregateRow};
use crate::classify::{ClassifiedEvent, LifecycleClassifier};
use crate::extract::{ExtractionGaps, PurchaseEventExtractor};
use crate::index::{ActivityHistory, TimeBucketIndexer};

/// Everything a report needs from one pipeline run.
#[derive(Debug, Clone)]
pub struct LifecycleRun {
    pub window: AnalysisWindow,
    pub granularity: Granularity,
    pub calendar: FiscalCalendar,
    pub history: ActivityHistory,
    pub gaps: ExtractionGaps,
    pub unmapped_dates: u64,
    /// Period ordinals missing from the calendar; a non-empty list means
    /// some labels may be `Unclassified` because of the calendar itself.
    pub calendar_gaps: Vec<Period>,
    pub classified: Vec<ClassifiedEvent>,
    pub aggregates: Vec<AggregateRow>,
    /// In-window lines held out of classification for lack of taxonomy.
    pub uncategorized: Vec<PurchaseEvent>,
}

pub struct LifecyclePipeline {
    config: AppConfig,
    extractor: PurchaseEventExtractor,
}

impl LifecyclePipeline {
    pub fn new(config: &AppConfig) -> Self {
        info!(
            granularity = ?config.analysis.granularity,
            segment_mode = ?config.segments.mode,
            history_scope = ?config.analysis.history_scope,
            "Lifecycle pipeline initialized"
        );
        Self {
            config: config.clone(),
            extractor: PurchaseEventExtractor::new(&config.exclusions, &config.segments),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs over the window the configuration resolves to.
    pub fn run(&self, snapshot: &WarehouseSnapshot) -> LifecycleResult<LifecycleRun> {
        let calendar = FiscalCalendar::new(snapshot.calendar.iter().cloned());
        let window = self.config.analysis.resolve_window(&calendar)?;
        Ok(self.run_with_calendar(snapshot, calendar, window))
    }

    /// Runs over an explicit window, e.g. the prior-year window of a
    /// year-over-year comparison.
    pub fn run_window(&self, snapshot: &WarehouseSnapshot, window: AnalysisWindow) -> LifecycleRun {
        let calendar = FiscalCalendar::new(snapshot.calendar.iter().cloned());
        self.run_with_calendar(snapshot, calendar, window)
    }

    fn run_with_calendar(
        &self,
        snapshot: &WarehouseSnapshot,
        calendar: FiscalCalendar,
        window: AnalysisWindow,
    ) -> LifecycleRun {
        let granularity = self.config.analysis.granularity;

        let calendar_gaps = calendar.gaps(granularity);
        if !calendar_gaps.is_empty() {
            warn!(
                missing = calendar_gaps.len(),
                granularity = ?granularity,
                "Fiscal calendar is not dense; affected periods may be Unclassified"
            );
        }

        let gaps = self.extractor.gaps(snapshot);
        let indexer = TimeBucketIndexer::new(&calendar, granularity);
        let indexed = indexer.index(self.extractor.events(snapshot));
        let uncategorized: Vec<_> = self
            .extractor
            .uncategorized(snapshot)
            .filter_map(|line| indexer.assign(line))
            .filter(|event| window.contains(event.period))
            .collect();

        let history = ActivityHistory::build(
            &indexed.events,
            self.config.analysis.history_scope,
            Some(window.end),
        );

        let mut classified =
            LifecycleClassifier::new(&history).classify_window(indexed.events, &window);
        classified.sort_by(|a, b| {
            a.event
                .period
                .cmp(&b.event.period)
                .then_with(|| a.event.order_id.cmp(&b.event.order_id))
                .then_with(|| a.event.line_id.cmp(&b.event.line_id))
        });

        let aggregates = aggregate(&classified);

        info!(
            window_start = %window.start,
            window_end = %window.end,
            lines_kept = gaps.lines_kept,
            lines_dropped = gaps.lines_dropped(),
            identities = history.identity_count(),
            classified = classified.len(),
            aggregate_rows = aggregates.len(),
            uncategorized = uncategorized.len(),
            "Lifecycle run complete"
        );

        LifecycleRun {
            window,
            granularity,
            calendar,
            history,
            gaps,
            unmapped_dates: indexed.unmapped_dates,
            calendar_gaps,
            classified,
            aggregates,
            uncategorized,
        }
    }
}
