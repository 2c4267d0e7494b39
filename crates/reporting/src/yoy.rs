//! Year-over-year comparison of lifecycle aggregates.

use std::collections::HashMap;

use lifecycle_core::calendar::FiscalCalendar;
use lifecycle_core::types::{Granularity, LifecycleLabel, Period};
use lifecycle_engine::aggregate::AggregateRow;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YoyRow {
    pub period: Period,
    pub prior_period: Option<Period>,
    pub segment: Option<String>,
    pub label: LifecycleLabel,
    pub customer_count: u64,
    pub prior_customer_count: Option<u64>,
    pub total_value: f64,
    pub prior_total_value: Option<f64>,
    pub value_delta: f64,
    /// `None` when the prior value is absent or zero.
    pub pct_change: Option<f64>,
}

type RowKey<'a> = (Period, Option<&'a str>, LifecycleLabel);

/// Pairs each `current` row with the `prior` row for the same segment and
/// label at the same period last year.
///
/// `prior` may be the same slice as `current` when one run spans both years.
pub fn compare_year_over_year(
    current: &[AggregateRow],
    prior: &[AggregateRow],
    calendar: &FiscalCalendar,
    granularity: Granularity,
) -> Vec<YoyRow> {
    let prior_by_key: HashMap<RowKey<'_>, &AggregateRow> = prior
        .iter()
        .map(|row| ((row.period, row.segment.as_deref(), row.label), row))
        .collect();

    let mut unmapped = 0u64;
    let rows: Vec<YoyRow> = current
        .iter()
        .map(|row| {
            let prior_period = calendar.same_period_last_year(row.period, granularity);
            if prior_period.is_none() {
                unmapped += 1;
            }
            let matched = prior_period.and_then(|p| {
                prior_by_key
                    .get(&(p, row.segment.as_deref(), row.label))
                    .copied()
            });
            let prior_total_value = matched.map(|m| m.total_value);
            let value_delta = row.total_value - prior_total_value.unwrap_or(0.0);
            let pct_change = prior_total_value
                .filter(|&v| v != 0.0)
                .map(|v| value_delta / v.abs());
            YoyRow {
                period: row.period,
                prior_period,
                segment: row.segment.clone(),
                label: row.label,
                customer_count: row.customer_count,
                prior_customer_count: matched.map(|m| m.customer_count),
                total_value: row.total_value,
                prior_total_value,
                value_delta,
                pct_change,
            }
        })
        .collect();

    if unmapped > 0 {
        warn!(
            rows = unmapped,
            granularity = ?granularity,
            "No same-period-last-year mapping in calendar"
        );
    }
    rows
}
