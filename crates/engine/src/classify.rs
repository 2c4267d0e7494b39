//! Lifecycle classification.
//!
//! Each (identity, segment, period) with activity gets exactly one label,
//! checked in this order:
//!
//! 1. no identity → `Anonymous`
//! 2. period is the identity's first active period → `New`
//! 3. active in the immediately preceding period → `Retained`
//! 4. inactive in the preceding period, with activity strictly before the
//!    period two back → `Reactivated`
//! 5. otherwise → `Unclassified`
//!
//! Rule 4 leaves a single-period lapse right after the first purchase
//! (active in P-2 only) as `Unclassified`; sparse calendars surface the
//! same way.

use std::collections::BTreeSet;

use lifecycle_core::types::{AnalysisWindow, LifecycleLabel, Period, PurchaseEvent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::ActivityHistory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    #[serde(flatten)]
    pub event: PurchaseEvent,
    pub label: LifecycleLabel,
}

/// Label for activity in `period` given the identity's active periods.
pub fn label_for(periods: &BTreeSet<Period>, period: Period) -> LifecycleLabel {
    let Some(first) = periods.first() else {
        return LifecycleLabel::Unclassified;
    };
    if period == *first {
        LifecycleLabel::New
    } else if periods.contains(&period.prev()) {
        LifecycleLabel::Retained
    } else if periods.range(..period.offset(-2)).next().is_some() {
        LifecycleLabel::Reactivated
    } else {
        LifecycleLabel::Unclassified
    }
}

pub struct LifecycleClassifier<'h> {
    history: &'h ActivityHistory,
}

impl<'h> LifecycleClassifier<'h> {
    pub fn new(history: &'h ActivityHistory) -> Self {
        Self { history }
    }

    pub fn label(&self, event: &PurchaseEvent) -> LifecycleLabel {
        let Some(identity) = event.identity.as_deref() else {
            return LifecycleLabel::Anonymous;
        };
        match self.history.periods_for(identity, event.segment.as_deref()) {
            Some(periods) => label_for(periods, event.period),
            None => LifecycleLabel::Unclassified,
        }
    }

    pub fn classify(&self, event: PurchaseEvent) -> ClassifiedEvent {
        let label = self.label(&event);
        ClassifiedEvent { event, label }
    }

    /// Classifies the events inside `window`; events outside it are dropped.
    pub fn classify_window(
        &self,
        events: impl IntoIterator<Item = PurchaseEvent>,
        window: &AnalysisWindow,
    ) -> Vec<ClassifiedEvent> {
        let classified: Vec<ClassifiedEvent> = events
            .into_iter()
            .filter(|e| window.contains(e.period))
            .map(|e| self.classify(e))
            .collect();

        let unclassified = classified
            .iter()
            .filter(|c| c.label == LifecycleLabel::Unclassified)
            .count();
        debug!(
            events = classified.len(),
            unclassified = unclassified,
            "Events classified"
        );
        metrics::counter!("lifecycle.events_classified").increment(classified.len() as u64);
        classified
    }
}
