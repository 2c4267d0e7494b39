use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::calendar::FiscalCalendar;
use crate::error::LifecycleResult;
use crate::types::{AnalysisWindow, Granularity, HistoryScope, Period, SegmentMode};

/// Root configuration for a report invocation. Loaded from an optional TOML
/// file and environment variables with the prefix `LIFECYCLE__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub exclusions: ExclusionPolicy,
    #[serde(default)]
    pub segments: SegmentConfig,
    #[serde(default)]
    pub qualification: QualificationRule,
}

// ─── Analysis Config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub history_scope: HistoryScope,
    /// Explicit window bounds (period ordinals). Both must be set to apply.
    #[serde(default)]
    pub window_start: Option<i32>,
    #[serde(default)]
    pub window_end: Option<i32>,
    /// As-of date for a rolling window; used when explicit bounds are absent.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default = "default_rolling_periods")]
    pub rolling_periods: u32,
}

fn default_rolling_periods() -> u32 {
    52
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            history_scope: HistoryScope::default(),
            window_start: None,
            window_end: None,
            as_of: None,
            rolling_periods: default_rolling_periods(),
        }
    }
}

impl AnalysisConfig {
    /// Explicit bounds win, then the as-of rolling window, then every
    /// period the calendar covers.
    pub fn resolve_window(&self, calendar: &FiscalCalendar) -> LifecycleResult<AnalysisWindow> {
        let (window, source) = match (self.window_start, self.window_end, self.as_of) {
            (Some(start), Some(end), _) => {
                (AnalysisWindow::new(Period(start), Period(end))?, "explicit")
            }
            (_, _, Some(as_of)) => (
                calendar.rolling_window(as_of, self.granularity, self.rolling_periods)?,
                "rolling",
            ),
            _ => (calendar.full_window(self.granularity)?, "calendar"),
        };
        debug!(
            start = %window.start,
            end = %window.end,
            source = source,
            "Analysis window resolved"
        );
        Ok(window)
    }
}

// ─── Exclusion Policy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionPolicy {
    /// Case-insensitive substrings; any order whose channel contains one is dropped.
    #[serde(default = "default_excluded_channels")]
    pub excluded_channels: Vec<String>,
    /// Case-insensitive substrings matched against department and class.
    #[serde(default = "default_excluded_categories")]
    pub excluded_categories: Vec<String>,
    /// Identities (exact, case-insensitive) whose orders are dropped entirely.
    #[serde(default)]
    pub excluded_identities: Vec<String>,
    #[serde(default = "default_require_valid_email")]
    pub require_valid_email: bool,
    /// Local parts treated as "no email given" (e.g. `noemail@store.com`).
    #[serde(default = "default_placeholder_local_parts")]
    pub placeholder_local_parts: Vec<String>,
    #[serde(default)]
    pub include_cancelled: bool,
    /// Flip returned lines to negative amount and quantity when the source
    /// records them as positive values.
    #[serde(default)]
    pub negate_returns: bool,
}

fn default_excluded_channels() -> Vec<String> {
    vec!["amazon".to_string()]
}
fn default_excluded_categories() -> Vec<String> {
    vec!["gift card".to_string(), "warranty".to_string()]
}
fn default_require_valid_email() -> bool {
    true
}
fn default_placeholder_local_parts() -> Vec<String> {
    ["noemail", "none", "na", "n/a", "unknown", "declined", "test"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            excluded_channels: default_excluded_channels(),
            excluded_categories: default_excluded_categories(),
            excluded_identities: Vec::new(),
            require_valid_email: default_require_valid_email(),
            placeholder_local_parts: default_placeholder_local_parts(),
            include_cancelled: false,
            negate_returns: false,
        }
    }
}

// ─── Segment Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentConfig {
    #[serde(default)]
    pub mode: SegmentMode,
    /// Raw channel name (case-insensitive) → reported segment, e.g.
    /// `web = "Direct"`, `store = "Retail"`. Unmapped channels pass through.
    #[serde(default)]
    pub channel_map: HashMap<String, String>,
}

// ─── Qualification Rule ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredPeriods {
    EveryPeriod,
    AtLeast(u32),
}

impl Default for RequiredPeriods {
    fn default() -> Self {
        RequiredPeriods::AtLeast(1)
    }
}

/// Per-period thresholds an identity must meet to count as high-value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualificationRule {
    #[serde(default)]
    pub min_spend_per_period: Option<f64>,
    #[serde(default)]
    pub max_orders_per_period: Option<u32>,
    #[serde(default)]
    pub required_periods: RequiredPeriods,
}

impl QualificationRule {
    pub fn period_passes(&self, spend: f64, orders: u32) -> bool {
        self.min_spend_per_period.is_none_or(|min| spend >= min)
            && self.max_orders_per_period.is_none_or(|max| orders <= max)
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file overlaid with
    /// `LIFECYCLE__`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("LIFECYCLE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("exclusions.excluded_channels")
                    .with_list_parse_key("exclusions.excluded_categories")
                    .with_list_parse_key("exclusions.excluded_identities")
                    .with_list_parse_key("exclusions.placeholder_local_parts"),
            )
            .build()?;
        config.try_deserialize()
    }
}
