//! Time bucketing and per-identity activity history.

use std::collections::{BTreeSet, HashMap};

use lifecycle_core::calendar::FiscalCalendar;
use lifecycle_core::types::{Granularity, HistoryScope, Period, PurchaseEvent};
use tracing::warn;

use crate::extract::ExtractedLine;

/// Events stamped with their fiscal period.
#[derive(Debug, Clone, Default)]
pub struct IndexedEvents {
    pub events: Vec<PurchaseEvent>,
    /// Lines whose order date has no calendar entry.
    pub unmapped_dates: u64,
}

pub struct TimeBucketIndexer<'c> {
    calendar: &'c FiscalCalendar,
    granularity: Granularity,
}

impl<'c> TimeBucketIndexer<'c> {
    pub fn new(calendar: &'c FiscalCalendar, granularity: Granularity) -> Self {
        Self {
            calendar,
            granularity,
        }
    }

    pub fn assign(&self, line: ExtractedLine) -> Option<PurchaseEvent> {
        let period = self.calendar.period_of(line.order_date, self.granularity)?;
        Some(line.into_event(period))
    }

    pub fn index(&self, lines: impl IntoIterator<Item = ExtractedLine>) -> IndexedEvents {
        let mut indexed = IndexedEvents::default();
        for line in lines {
            match self.assign(line) {
                Some(event) => indexed.events.push(event),
                None => indexed.unmapped_dates += 1,
            }
        }
        if indexed.unmapped_dates > 0 {
            warn!(
                lines = indexed.unmapped_dates,
                granularity = ?self.granularity,
                "Order dates missing from fiscal calendar"
            );
        }
        indexed
    }
}

/// Periods with at least one purchase, per identity and history segment.
///
/// Under [`HistoryScope::Global`] every segment shares one history, so an
/// identity's first purchase anywhere is its only New.
#[derive(Debug, Clone, Default)]
pub struct ActivityHistory {
    scope: HistoryScope,
    periods: HashMap<String, HashMap<Option<String>, BTreeSet<Period>>>,
}

impl ActivityHistory {
    pub fn new(scope: HistoryScope) -> Self {
        Self {
            scope,
            periods: HashMap::new(),
        }
    }

    /// History from every identified event up to and including `horizon`.
    pub fn build<'e>(
        events: impl IntoIterator<Item = &'e PurchaseEvent>,
        scope: HistoryScope,
        horizon: Option<Period>,
    ) -> Self {
        let mut history = Self::new(scope);
        for event in events {
            if horizon.is_some_and(|h| event.period > h) {
                continue;
            }
            if let Some(identity) = event.identity.as_deref() {
                history.record(identity, event.segment.as_deref(), event.period);
            }
        }
        history
    }

    pub fn scope(&self) -> HistoryScope {
        self.scope
    }

    pub fn record(&mut self, identity: &str, segment: Option<&str>, period: Period) {
        let key = self.segment_key(segment);
        self.periods
            .entry(identity.to_string())
            .or_default()
            .entry(key)
            .or_default()
            .insert(period);
    }

    pub fn periods_for(&self, identity: &str, segment: Option<&str>) -> Option<&BTreeSet<Period>> {
        self.periods.get(identity)?.get(&self.segment_key(segment))
    }

    pub fn first_period(&self, identity: &str, segment: Option<&str>) -> Option<Period> {
        self.periods_for(identity, segment)?.first().copied()
    }

    /// Earliest activity across every segment.
    pub fn first_seen(&self, identity: &str) -> Option<Period> {
        self.periods
            .get(identity)?
            .values()
            .filter_map(|set| set.first().copied())
            .min()
    }

    pub fn identity_count(&self) -> usize {
        self.periods.len()
    }

    fn segment_key(&self, segment: Option<&str>) -> Option<String> {
        match self.scope {
            HistoryScope::PerSegment => segment.map(str::to_string),
            HistoryScope::Global => None,
        }
    }
}
