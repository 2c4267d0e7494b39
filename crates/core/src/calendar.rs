//! Fiscal calendar lookups: date → period ordinal, same-period-last-year,
//! density checks, and as-of rolling windows.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{AnalysisWindow, CalendarDay, Granularity, Period};

/// Retail calendars repeat on a 52-week cycle, so "last year" is 364 days back.
const RETAIL_YEAR_DAYS: i64 = 364;

const GRANULARITIES: [Granularity; 3] = [Granularity::Week, Granularity::Month, Granularity::Year];

#[derive(Debug, Clone, Default)]
pub struct FiscalCalendar {
    days: BTreeMap<NaiveDate, CalendarDay>,
    first_days: HashMap<(Granularity, Period), NaiveDate>,
}

impl FiscalCalendar {
    pub fn new(days: impl IntoIterator<Item = CalendarDay>) -> Self {
        let days: BTreeMap<NaiveDate, CalendarDay> =
            days.into_iter().map(|d| (d.date, d)).collect();

        let mut first_days = HashMap::new();
        // BTreeMap iteration is date-ascending, so the first insert wins.
        for day in days.values() {
            for g in GRANULARITIES {
                first_days.entry((g, day.period(g))).or_insert(day.date);
            }
        }

        Self { days, first_days }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn period_of(&self, date: NaiveDate, granularity: Granularity) -> Option<Period> {
        self.days.get(&date).map(|d| d.period(granularity))
    }

    pub fn first_day_of(&self, period: Period, granularity: Granularity) -> Option<NaiveDate> {
        self.first_days.get(&(granularity, period)).copied()
    }

    /// The period one fiscal cycle before `period`.
    pub fn same_period_last_year(&self, period: Period, granularity: Granularity) -> Option<Period> {
        match granularity {
            Granularity::Year => Some(period.prev()),
            Granularity::Week | Granularity::Month => {
                let first = self.first_day_of(period, granularity)?;
                self.period_of(first - Duration::days(RETAIL_YEAR_DAYS), granularity)
            }
        }
    }

    /// Distinct period ordinals present in the calendar.
    pub fn periods(&self, granularity: Granularity) -> BTreeSet<Period> {
        self.days.values().map(|d| d.period(granularity)).collect()
    }

    /// Ordinals missing between the first and last known period. Any gap
    /// breaks the "exactly one prior period" reading used by Retained.
    pub fn gaps(&self, granularity: Granularity) -> Vec<Period> {
        let periods = self.periods(granularity);
        let (Some(first), Some(last)) = (periods.first(), periods.last()) else {
            return Vec::new();
        };
        (first.0..=last.0)
            .map(Period)
            .filter(|p| !periods.contains(p))
            .collect()
    }

    pub fn is_dense(&self, granularity: Granularity) -> bool {
        self.gaps(granularity).is_empty()
    }

    /// Window covering every period the calendar knows about.
    pub fn full_window(&self, granularity: Granularity) -> LifecycleResult<AnalysisWindow> {
        let periods = self.periods(granularity);
        match (periods.first(), periods.last()) {
            (Some(first), Some(last)) => AnalysisWindow::new(*first, *last),
            _ => Err(LifecycleError::Calendar("calendar is empty".into())),
        }
    }

    /// The `span` periods ending with the period that contains `as_of`
    /// (e.g. rolling 52 weeks).
    pub fn rolling_window(
        &self,
        as_of: NaiveDate,
        granularity: Granularity,
        span: u32,
    ) -> LifecycleResult<AnalysisWindow> {
        if span == 0 {
            return Err(LifecycleError::InvalidWindow("rolling span must be at least 1".into()));
        }
        let end = self.period_of(as_of, granularity).ok_or_else(|| {
            LifecycleError::Calendar(format!("as-of date {as_of} is not in the fiscal calendar"))
        })?;
        let span = i32::try_from(span)
            .map_err(|_| LifecycleError::InvalidWindow(format!("rolling span {span} too large")))?;
        AnalysisWindow::new(end.offset(1 - span), end)
    }
}
