//! Property tests for lifecycle labelling and rank/share analytics.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use lifecycle_core::types::{AnalysisWindow, HistoryScope, LifecycleLabel, Period, PurchaseEvent};
use lifecycle_engine::classify::LifecycleClassifier;
use lifecycle_engine::index::ActivityHistory;
use lifecycle_reporting::rank::rank_by;
use proptest::prelude::*;

const IDENTITIES: [&str; 4] = ["a@x.com", "b@x.com", "c@x.com", "d@x.com"];
const SEGMENTS: [&str; 2] = ["Retail", "Direct"];

fn event_strategy() -> impl Strategy<Value = PurchaseEvent> {
    (
        proptest::option::weighted(0.8, 0..IDENTITIES.len()),
        0..SEGMENTS.len(),
        1..30i32,
        -50.0..500.0f64,
        0..1_000u32,
    )
        .prop_map(|(identity, segment, period, amount, order)| PurchaseEvent {
            identity: identity.map(|i| IDENTITIES[i].to_string()),
            order_id: format!("o-{order}"),
            line_id: "1".into(),
            period: Period(period),
            order_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            segment: Some(SEGMENTS[segment].to_string()),
            department: None,
            class_name: None,
            amount,
            quantity: 1,
            backordered: false,
        })
}

fn scope_strategy() -> impl Strategy<Value = HistoryScope> {
    prop_oneof![Just(HistoryScope::PerSegment), Just(HistoryScope::Global)]
}

fn history_segment(scope: HistoryScope, event: &PurchaseEvent) -> Option<String> {
    match scope {
        HistoryScope::PerSegment => event.segment.clone(),
        HistoryScope::Global => None,
    }
}

proptest! {
    #[test]
    fn prop_every_windowed_event_gets_one_label(
        events in proptest::collection::vec(event_strategy(), 0..60),
        scope in scope_strategy(),
        start in 1..15i32,
    ) {
        let window = AnalysisWindow::new(Period(start), Period(start + 10)).unwrap();
        let history = ActivityHistory::build(&events, scope, Some(window.end));
        let in_window = events.iter().filter(|e| window.contains(e.period)).count();
        let classified = LifecycleClassifier::new(&history).classify_window(events, &window);

        prop_assert_eq!(classified.len(), in_window);
        for c in &classified {
            prop_assert_eq!(
                c.label == LifecycleLabel::Anonymous,
                c.event.identity.is_none()
            );
        }
    }

    #[test]
    fn prop_first_active_period_is_new(
        events in proptest::collection::vec(event_strategy(), 1..60),
        scope in scope_strategy(),
    ) {
        let history = ActivityHistory::build(&events, scope, None);
        let classifier = LifecycleClassifier::new(&history);

        let mut first: HashMap<(String, Option<String>), Period> = HashMap::new();
        for e in &events {
            if let Some(identity) = &e.identity {
                let key = (identity.clone(), history_segment(scope, e));
                let entry = first.entry(key).or_insert(e.period);
                *entry = (*entry).min(e.period);
            }
        }

        for e in &events {
            let Some(identity) = &e.identity else { continue };
            let key = (identity.clone(), history_segment(scope, e));
            if first[&key] == e.period {
                prop_assert_eq!(classifier.label(e), LifecycleLabel::New);
            } else {
                prop_assert_ne!(classifier.label(e), LifecycleLabel::New);
            }
        }
    }

    // Metrics are non-negative; cumulative share is not monotonic otherwise.
    #[test]
    fn prop_rank_dense_rank_share_and_cumulative(
        rows in proptest::collection::vec((0..3u8, 0..20u32), 1..40),
    ) {
        let rows: Vec<(u8, f64, String)> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (partition, metric))| (partition, metric as f64 * 2.5, format!("r{i:03}")))
            .collect();
        let ranked = rank_by(rows, |r| r.0, |r| r.1, |r| r.2.clone());

        let mut partitions: BTreeMap<u8, Vec<_>> = BTreeMap::new();
        for r in &ranked {
            partitions.entry(r.row.0).or_default().push(r);
        }

        for members in partitions.values() {
            let total: f64 = members.iter().map(|r| r.row.1).sum();
            for (i, r) in members.iter().enumerate() {
                let strictly_before = members.iter().filter(|o| o.row.1 > r.row.1).count();
                prop_assert_eq!(r.rank as usize, strictly_before + 1);
                if i > 0 {
                    let prev = members[i - 1];
                    prop_assert!(prev.row.1 >= r.row.1);
                    prop_assert!(prev.cumulative_share <= r.cumulative_share + 1e-12);
                    if prev.row.1 == r.row.1 {
                        prop_assert_eq!(prev.rank, r.rank);
                        prop_assert_eq!(prev.dense_rank, r.dense_rank);
                    } else {
                        prop_assert_eq!(r.dense_rank, prev.dense_rank + 1);
                    }
                } else {
                    prop_assert_eq!(r.rank, 1);
                    prop_assert_eq!(r.dense_rank, 1);
                }
            }

            let share_sum: f64 = members.iter().map(|r| r.share).sum();
            let last = members[members.len() - 1];
            if total == 0.0 {
                prop_assert_eq!(share_sum, 0.0);
                prop_assert_eq!(last.cumulative_share, 0.0);
            } else {
                prop_assert!((share_sum - 1.0).abs() < 1e-9);
                prop_assert!((last.cumulative_share - 1.0).abs() < 1e-9);
            }
        }
    }
}
