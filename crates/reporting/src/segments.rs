//! Segment mix: each segment's share of a period's revenue.

use std::collections::BTreeMap;

use lifecycle_core::types::Period;
use lifecycle_engine::aggregate::AggregateRow;
use serde::Serialize;

use crate::rank::{rank_within_partitions, Rankable, RankedRow};

/// Segment name used when the run was not split by segment.
pub const TOTAL_SEGMENT: &str = "Total";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentShare {
    pub period: Period,
    pub segment: String,
    pub customer_count: u64,
    pub order_count: u64,
    pub total_value: f64,
}

impl Rankable for SegmentShare {
    type Partition = Period;

    fn partition(&self) -> Period {
        self.period
    }

    fn metric(&self) -> f64 {
        self.total_value
    }

    fn tie_key(&self) -> String {
        self.segment.clone()
    }
}

/// Collapses lifecycle labels and ranks segments within each period.
///
/// `customer_count` is the sum over labels. An identity appears under one
/// label per (period, segment), so the sum stays a distinct count.
pub fn segment_mix(aggregates: &[AggregateRow]) -> Vec<RankedRow<SegmentShare>> {
    let mut shares: BTreeMap<(Period, &str), SegmentShare> = BTreeMap::new();
    for row in aggregates {
        let segment = row.segment.as_deref().unwrap_or(TOTAL_SEGMENT);
        let entry = shares
            .entry((row.period, segment))
            .or_insert_with(|| SegmentShare {
                period: row.period,
                segment: segment.to_string(),
                customer_count: 0,
                order_count: 0,
                total_value: 0.0,
            });
        entry.customer_count += row.customer_count;
        entry.order_count += row.order_count;
        entry.total_value += row.total_value;
    }
    rank_within_partitions(shares.into_values().collect())
}

#[cfg(test)]
mod tests {
    use lifecycle_core::types::LifecycleLabel;

    use super::*;

    fn row(period: i32, segment: Option<&str>, label: LifecycleLabel, value: f64) -> AggregateRow {
        AggregateRow {
            period: Period(period),
            segment: segment.map(String::from),
            label,
            customer_count: 1,
            order_count: 1,
            total_value: value,
            total_units: 1,
        }
    }

    #[test]
    fn test_mix_sums_labels_and_ranks_per_period() {
        let aggregates = vec![
            row(1, Some("store"), LifecycleLabel::New, 30.0),
            row(1, Some("store"), LifecycleLabel::Retained, 20.0),
            row(1, Some("web"), LifecycleLabel::New, 150.0),
            row(2, Some("store"), LifecycleLabel::Retained, 10.0),
        ];
        let mix = segment_mix(&aggregates);
        let rows: Vec<_> = mix
            .iter()
            .map(|r| (r.row.period, r.row.segment.as_str(), r.rank, r.share))
            .collect();
        assert_eq!(
            rows,
            vec![
                (Period(1), "web", 1, 0.75),
                (Period(1), "store", 2, 0.25),
                (Period(2), "store", 1, 1.0),
            ]
        );
        assert_eq!(mix[1].row.customer_count, 2);
    }

    #[test]
    fn test_unsplit_runs_report_total() {
        let mix = segment_mix(&[row(3, None, LifecycleLabel::New, 5.0)]);
        assert_eq!(mix[0].row.segment, TOTAL_SEGMENT);
        assert_eq!(mix[0].cumulative_share, 1.0);
    }
}
