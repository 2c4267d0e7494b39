//! Group-by over classified events: (period, segment, label) → counts and sums.

use std::collections::{BTreeMap, HashSet};

use lifecycle_core::types::{LifecycleLabel, Period};
use serde::{Deserialize, Serialize};

use crate::classify::ClassifiedEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub period: Period,
    pub segment: Option<String>,
    pub label: LifecycleLabel,
    /// Distinct identities; distinct orders for `Anonymous`.
    pub customer_count: u64,
    pub order_count: u64,
    pub total_value: f64,
    pub total_units: i64,
}

type AggregateKey = (Period, Option<String>, LifecycleLabel);

#[derive(Debug, Clone, Default)]
struct Bucket {
    identities: HashSet<String>,
    orders: HashSet<String>,
    total_value: f64,
    total_units: i64,
}

impl Bucket {
    fn absorb(&mut self, other: Bucket) {
        self.identities.extend(other.identities);
        self.orders.extend(other.orders);
        self.total_value += other.total_value;
        self.total_units += other.total_units;
    }
}

/// Partial aggregation state. Accumulators built over disjoint slices of
/// the input can be merged in any order.
#[derive(Debug, Clone, Default)]
pub struct AggregateAccumulator {
    buckets: BTreeMap<AggregateKey, Bucket>,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, classified: &ClassifiedEvent) {
        let event = &classified.event;
        let bucket = self
            .buckets
            .entry((event.period, event.segment.clone(), classified.label))
            .or_default();
        if let Some(identity) = &event.identity {
            bucket.identities.insert(identity.clone());
        }
        bucket.orders.insert(event.order_id.clone());
        bucket.total_value += event.amount;
        bucket.total_units += event.quantity;
    }

    pub fn merge(&mut self, other: AggregateAccumulator) {
        for (key, bucket) in other.buckets {
            self.buckets.entry(key).or_default().absorb(bucket);
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Rows sorted by period, segment, then label.
    pub fn finish(self) -> Vec<AggregateRow> {
        self.buckets
            .into_iter()
            .map(|((period, segment, label), bucket)| {
                let order_count = bucket.orders.len() as u64;
                let customer_count = match label {
                    LifecycleLabel::Anonymous => order_count,
                    _ => bucket.identities.len() as u64,
                };
                AggregateRow {
                    period,
                    segment,
                    label,
                    customer_count,
                    order_count,
                    total_value: bucket.total_value,
                    total_units: bucket.total_units,
                }
            })
            .collect()
    }
}

impl<'a> Extend<&'a ClassifiedEvent> for AggregateAccumulator {
    fn extend<I: IntoIterator<Item = &'a ClassifiedEvent>>(&mut self, iter: I) {
        for classified in iter {
            self.add(classified);
        }
    }
}

pub fn aggregate<'a>(events: impl IntoIterator<Item = &'a ClassifiedEvent>) -> Vec<AggregateRow> {
    let mut acc = AggregateAccumulator::new();
    acc.extend(events);
    acc.finish()
}
