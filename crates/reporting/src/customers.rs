//! Customer-level spend summaries ranked within tenure groups.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lifecycle_core::types::{AnalysisWindow, Period};
use lifecycle_engine::classify::ClassifiedEvent;
use lifecycle_engine::index::ActivityHistory;
use serde::{Deserialize, Serialize};

use crate::rank::{rank_within_partitions, Rankable, RankedRow};

/// Declaration order is output priority: All, then New, then Existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TenureGroup {
    All,
    New,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub identity: String,
    pub tenure: TenureGroup,
    pub first_period: Period,
    pub total_value: f64,
    pub order_count: u64,
    pub total_units: i64,
    pub active_periods: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRankRow {
    pub group: TenureGroup,
    #[serde(flatten)]
    pub customer: CustomerSummary,
}

impl Rankable for CustomerRankRow {
    type Partition = TenureGroup;

    fn partition(&self) -> TenureGroup {
        self.group
    }

    fn metric(&self) -> f64 {
        self.customer.total_value
    }

    fn tie_key(&self) -> String {
        self.customer.identity.clone()
    }
}

#[derive(Default)]
struct CustomerTotals {
    total_value: f64,
    orders: HashSet<String>,
    total_units: i64,
    periods: BTreeSet<Period>,
}

/// One summary per identified customer with activity in the window.
/// Tenure is New when the customer's first purchase in any segment falls
/// inside the window.
pub fn summarize_customers(
    classified: &[ClassifiedEvent],
    history: &ActivityHistory,
    window: &AnalysisWindow,
) -> Vec<CustomerSummary> {
    let mut totals: BTreeMap<&str, CustomerTotals> = BTreeMap::new();
    for c in classified {
        let Some(identity) = c.event.identity.as_deref() else {
            continue;
        };
        let entry = totals.entry(identity).or_default();
        entry.total_value += c.event.amount;
        entry.total_units += c.event.quantity;
        entry.orders.insert(c.event.order_id.clone());
        entry.periods.insert(c.event.period);
    }

    totals
        .into_iter()
        .map(|(identity, t)| {
            let window_first = t.periods.first().copied().unwrap_or(window.start);
            let first_period = history.first_seen(identity).unwrap_or(window_first);
            let tenure = if window.contains(first_period) {
                TenureGroup::New
            } else {
                TenureGroup::Existing
            };
            CustomerSummary {
                identity: identity.to_string(),
                tenure,
                first_period,
                total_value: t.total_value,
                order_count: t.orders.len() as u64,
                total_units: t.total_units,
                active_periods: t.periods.len() as u32,
            }
        })
        .collect()
}

/// Ranks every customer twice: once under `All` and once under their tenure.
pub fn rank_customers(summaries: Vec<CustomerSummary>) -> Vec<RankedRow<CustomerRankRow>> {
    let mut rows = Vec::with_capacity(summaries.len() * 2);
    for customer in summaries {
        rows.push(CustomerRankRow {
            group: TenureGroup::All,
            customer: customer.clone(),
        });
        rows.push(CustomerRankRow {
            group: customer.tenure,
            customer,
        });
    }
    rank_within_partitions(rows)
}
