use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, LifecycleResult};

// ─── Periods ────────────────────────────────────────────────────────────────

/// Fiscal period ordinal (week id, month id, or year). Ordinals are plain
/// integers so `prev`/`next` are arithmetic, not calendar lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(pub i32);

impl Period {
    pub fn prev(self) -> Self {
        Period(self.0 - 1)
    }

    pub fn next(self) -> Self {
        Period(self.0 + 1)
    }

    pub fn offset(self, n: i32) -> Self {
        Period(self.0 + n)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Week,
    #[default]
    Month,
    Year,
}

impl FromStr for Granularity {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            other => Err(LifecycleError::Config(format!("unknown granularity '{other}'"))),
        }
    }
}

/// Inclusive range of periods a report covers. History before `start` is
/// still consulted when labelling events inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: Period,
    pub end: Period,
}

impl AnalysisWindow {
    pub fn new(start: Period, end: Period) -> LifecycleResult<Self> {
        if start > end {
            return Err(LifecycleError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    pub fn periods(&self) -> impl Iterator<Item = Period> {
        (self.start.0..=self.end.0).map(Period)
    }
}

// ─── Classification settings ────────────────────────────────────────────────

/// How the secondary dimension of an event is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentMode {
    /// Total-business view: every event has no segment.
    #[default]
    Total,
    /// Segment by sales channel (line channel, falling back to the header).
    Channel,
}

/// Whether activity history is tracked per segment or shared across them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    #[default]
    PerSegment,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleLabel {
    New,
    Retained,
    Reactivated,
    Anonymous,
    Unclassified,
}

impl LifecycleLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleLabel::New => "New",
            LifecycleLabel::Retained => "Retained",
            LifecycleLabel::Reactivated => "Reactivated",
            LifecycleLabel::Anonymous => "Anonymous",
            LifecycleLabel::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for LifecycleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Warehouse records ──────────────────────────────────────────────────────

/// Order header as exported by one of the source order systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHeader {
    pub order_id: String,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub source_system: String,
    pub channel: String,
    #[serde(default)]
    pub order_type: Option<String>,
    pub order_date: NaiveDate,
    /// The order this one mirrors in another source system (e.g. a store
    /// pickup order re-keyed by the online order system).
    #[serde(default)]
    pub linked_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: String,
    pub line_id: String,
    pub product_id: String,
    #[serde(default)]
    pub channel: Option<String>,
    pub quantity: i64,
    pub amount: f64,
    #[serde(default)]
    pub returned: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub backordered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub product_id: String,
    pub department: String,
    pub class_name: String,
}

/// One gregorian day mapped onto the fiscal calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub fiscal_week: i32,
    pub fiscal_month: i32,
    pub fiscal_year: i32,
}

impl CalendarDay {
    pub fn period(&self, granularity: Granularity) -> Period {
        match granularity {
            Granularity::Week => Period(self.fiscal_week),
            Granularity::Month => Period(self.fiscal_month),
            Granularity::Year => Period(self.fiscal_year),
        }
    }
}

/// Point-in-time copy of the warehouse tables a report reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseSnapshot {
    #[serde(default)]
    pub orders: Vec<OrderHeader>,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub taxonomy: Vec<TaxonomyEntry>,
    #[serde(default)]
    pub calendar: Vec<CalendarDay>,
}

impl WarehouseSnapshot {
    pub fn from_json_str(raw: &str) -> LifecycleResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> LifecycleResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::Snapshot(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// One order line after filtering, bucketed into a fiscal period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub identity: Option<String>,
    pub order_id: String,
    pub line_id: String,
    pub period: Period,
    pub order_date: NaiveDate,
    pub segment: Option<String>,
    pub department: Option<String>,
    pub class_name: Option<String>,
    pub amount: f64,
    pub quantity: i64,
    pub backordered: bool,
}

impl PurchaseEvent {
    pub fn is_anonymous(&self) -> bool {
        self.identity.is_none()
    }
}
