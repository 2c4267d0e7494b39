//! High-value customer selection against per-period spend and order
//! thresholds.

use std::collections::{BTreeMap, HashSet};

use lifecycle_core::config::{QualificationRule, RequiredPeriods};
use lifecycle_core::types::{AnalysisWindow, Period};
use lifecycle_engine::classify::ClassifiedEvent;
use serde::Serialize;
use tracing::debug;

use crate::rank::{rank_by, RankedRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifiedCustomer {
    pub identity: String,
    pub qualifying_periods: u32,
    pub active_periods: u32,
    pub total_spend: f64,
    pub order_count: u64,
}

#[derive(Default)]
struct PeriodActivity {
    spend: f64,
    orders: HashSet<String>,
}

/// Identities whose qualifying periods satisfy `rule.required_periods`.
///
/// A period qualifies when the identity was active in it and its spend and
/// order count pass the rule's thresholds. Anonymous activity is ignored.
pub fn qualify(
    classified: &[ClassifiedEvent],
    rule: &QualificationRule,
    window: &AnalysisWindow,
) -> Vec<QualifiedCustomer> {
    let mut activity: BTreeMap<&str, BTreeMap<Period, PeriodActivity>> = BTreeMap::new();
    for c in classified {
        let Some(identity) = c.event.identity.as_deref() else {
            continue;
        };
        if !window.contains(c.event.period) {
            continue;
        }
        let period = activity
            .entry(identity)
            .or_default()
            .entry(c.event.period)
            .or_default();
        period.spend += c.event.amount;
        period.orders.insert(c.event.order_id.clone());
    }

    let window_periods = window.periods().count() as u32;
    let required = match rule.required_periods {
        RequiredPeriods::EveryPeriod => window_periods,
        RequiredPeriods::AtLeast(n) => n,
    };

    let mut qualified = Vec::new();
    for (identity, periods) in activity {
        let qualifying_periods = periods
            .values()
            .filter(|p| rule.period_passes(p.spend, p.orders.len() as u32))
            .count() as u32;
        if qualifying_periods < required {
            debug!(
                identity = identity,
                qualifying_periods = qualifying_periods,
                required = required,
                "Identity not qualified"
            );
            continue;
        }
        qualified.push(QualifiedCustomer {
            identity: identity.to_string(),
            qualifying_periods,
            active_periods: periods.len() as u32,
            total_spend: periods.values().map(|p| p.spend).sum(),
            order_count: periods.values().map(|p| p.orders.len() as u64).sum(),
        });
    }
    qualified
}

pub fn rank_qualified(customers: Vec<QualifiedCustomer>) -> Vec<RankedRow<QualifiedCustomer>> {
    rank_by(
        customers,
        |_| (),
        |c| c.total_spend,
        |c| c.identity.clone(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use lifecycle_core::types::{LifecycleLabel, PurchaseEvent};

    use super::*;

    fn purchase(identity: Option<&str>, order: &str, period: i32, amount: f64) -> ClassifiedEvent {
        ClassifiedEvent {
            event: PurchaseEvent {
                identity: identity.map(String::from),
                order_id: order.into(),
                line_id: "1".into(),
                period: Period(period),
                order_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                segment: None,
                department: None,
                class_name: None,
                amount,
                quantity: 1,
                backordered: false,
            },
            label: LifecycleLabel::Retained,
        }
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(Period(1), Period(3)).unwrap()
    }

    fn sample() -> Vec<ClassifiedEvent> {
        vec![
            // Big spender in every period.
            purchase(Some("vip@x.com"), "v-1", 1, 500.0),
            purchase(Some("vip@x.com"), "v-2", 2, 400.0),
            purchase(Some("vip@x.com"), "v-3", 3, 300.0),
            // Active in two periods, one under the spend floor.
            purchase(Some("mid@x.com"), "m-1", 1, 250.0),
            purchase(Some("mid@x.com"), "m-2", 3, 20.0),
            // Many small orders in one period: a reseller.
            purchase(Some("bulk@x.com"), "b-1", 2, 200.0),
            purchase(Some("bulk@x.com"), "b-2", 2, 200.0),
            purchase(Some("bulk@x.com"), "b-3", 2, 200.0),
            purchase(None, "z-1", 2, 9_999.0),
        ]
    }

    fn rule(required_periods: RequiredPeriods) -> QualificationRule {
        QualificationRule {
            min_spend_per_period: Some(100.0),
            max_orders_per_period: Some(2),
            required_periods,
        }
    }

    #[test]
    fn test_at_least_counts_qualifying_periods() {
        let qualified = qualify(&sample(), &rule(RequiredPeriods::AtLeast(1)), &window());
        let ids: Vec<_> = qualified.iter().map(|q| q.identity.as_str()).collect();
        assert_eq!(ids, vec!["mid@x.com", "vip@x.com"]);

        let mid = &qualified[0];
        assert_eq!(mid.qualifying_periods, 1);
        assert_eq!(mid.active_periods, 2);
        assert_eq!(mid.total_spend, 270.0);
    }

    #[test]
    fn test_every_period_requires_full_window() {
        let qualified = qualify(&sample(), &rule(RequiredPeriods::EveryPeriod), &window());
        assert_eq!(qualified.len(), 1);
        assert_eq!(qualified[0].identity, "vip@x.com");
        assert_eq!(qualified[0].order_count, 3);
    }

    #[test]
    fn test_no_thresholds_only_requires_activity() {
        let rule = QualificationRule::default();
        let qualified = qualify(&sample(), &rule, &window());
        assert_eq!(qualified.len(), 3);
    }

    #[test]
    fn test_rank_qualified_by_spend() {
        let qualified = qualify(&sample(), &rule(RequiredPeriods::AtLeast(1)), &window());
        let ranked = rank_qualified(qualified);
        assert_eq!(ranked[0].row.identity, "vip@x.com");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].cumulative_share, 1.0);
    }
}
