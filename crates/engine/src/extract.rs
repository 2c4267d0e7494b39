//! Purchase event extraction: exclusion filters, email quality checks,
//! cross-system order de-duplication, and segment derivation.
//!
//! Extraction is lazy and restartable: every call to
//! [`PurchaseEventExtractor::events`] re-derives the stream from the
//! snapshot, nothing is cached between runs.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use lifecycle_core::config::{ExclusionPolicy, SegmentConfig};
use lifecycle_core::types::{
    OrderHeader, OrderLine, Period, PurchaseEvent, SegmentMode, TaxonomyEntry, WarehouseSnapshot,
};
use serde::Serialize;
use tracing::{debug, warn};

/// A kept order line, not yet assigned to a fiscal period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedLine {
    pub identity: Option<String>,
    pub order_id: String,
    pub line_id: String,
    pub order_date: NaiveDate,
    pub segment: Option<String>,
    pub department: Option<String>,
    pub class_name: Option<String>,
    pub amount: f64,
    pub quantity: i64,
    pub backordered: bool,
}

impl ExtractedLine {
    pub fn into_event(self, period: Period) -> PurchaseEvent {
        PurchaseEvent {
            identity: self.identity,
            order_id: self.order_id,
            line_id: self.line_id,
            period,
            order_date: self.order_date,
            segment: self.segment,
            department: self.department,
            class_name: self.class_name,
            amount: self.amount,
            quantity: self.quantity,
            backordered: self.backordered,
        }
    }
}

/// What happened to one source line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineDisposition {
    Keep(ExtractedLine),
    /// No header exists for the line's order.
    Orphaned,
    /// Same (order, line) pair seen earlier in the snapshot.
    Duplicate,
    /// The order is a mirror of another order already counted.
    Mirrored,
    ExcludedChannel,
    ExcludedIdentity,
    ExcludedCategory,
    Cancelled,
    /// Product has no taxonomy entry, so category exclusions cannot be
    /// checked. Kept out of classification but reported as uncategorized
    /// revenue.
    Uncategorized(ExtractedLine),
}

/// Per-reason tallies of lines that did not become purchase events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionGaps {
    pub lines_kept: u64,
    pub orphaned: u64,
    pub duplicates: u64,
    pub mirrored: u64,
    pub excluded_channel: u64,
    pub excluded_identity: u64,
    pub excluded_category: u64,
    pub cancelled: u64,
    pub uncategorized_lines: u64,
    pub uncategorized_amount: f64,
}

impl ExtractionGaps {
    fn record(&mut self, disposition: &LineDisposition) {
        match disposition {
            LineDisposition::Keep(_) => self.lines_kept += 1,
            LineDisposition::Orphaned => self.orphaned += 1,
            LineDisposition::Duplicate => self.duplicates += 1,
            LineDisposition::Mirrored => self.mirrored += 1,
            LineDisposition::ExcludedChannel => self.excluded_channel += 1,
            LineDisposition::ExcludedIdentity => self.excluded_identity += 1,
            LineDisposition::ExcludedCategory => self.excluded_category += 1,
            LineDisposition::Cancelled => self.cancelled += 1,
            LineDisposition::Uncategorized(line) => {
                self.uncategorized_lines += 1;
                self.uncategorized_amount += line.amount;
            }
        }
    }

    pub fn lines_dropped(&self) -> u64 {
        self.orphaned
            + self.duplicates
            + self.mirrored
            + self.excluded_channel
            + self.excluded_identity
            + self.excluded_category
            + self.cancelled
            + self.uncategorized_lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderStatus {
    Active,
    Mirror,
    ExcludedChannel,
    ExcludedIdentity,
}

/// One header after mirror collapsing. Every member of a mirror group
/// shares the primary header and the coalesced identity; only the member
/// chosen as the line source is emitted.
#[derive(Debug, Clone)]
struct ResolvedOrder<'s> {
    primary: &'s OrderHeader,
    identity: Option<String>,
    status: OrderStatus,
}

pub struct PurchaseEventExtractor {
    policy: ExclusionPolicy,
    segment_mode: SegmentMode,
    channel_map: HashMap<String, String>,
}

impl PurchaseEventExtractor {
    pub fn new(policy: &ExclusionPolicy, segments: &SegmentConfig) -> Self {
        let policy = ExclusionPolicy {
            excluded_channels: lowercase_all(&policy.excluded_channels),
            excluded_categories: lowercase_all(&policy.excluded_categories),
            excluded_identities: lowercase_all(&policy.excluded_identities),
            placeholder_local_parts: lowercase_all(&policy.placeholder_local_parts),
            ..policy.clone()
        };
        let channel_map = segments
            .channel_map
            .iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.clone()))
            .collect();

        Self {
            policy,
            segment_mode: segments.mode,
            channel_map,
        }
    }

    /// Kept lines, in snapshot order.
    pub fn events<'s>(
        &'s self,
        snapshot: &'s WarehouseSnapshot,
    ) -> impl Iterator<Item = ExtractedLine> + 's {
        self.dispositions(snapshot).filter_map(|d| match d {
            LineDisposition::Keep(line) => Some(line),
            _ => None,
        })
    }

    /// Lines held back from classification because their product has no
    /// taxonomy entry.
    pub fn uncategorized<'s>(
        &'s self,
        snapshot: &'s WarehouseSnapshot,
    ) -> impl Iterator<Item = ExtractedLine> + 's {
        self.dispositions(snapshot).filter_map(|d| match d {
            LineDisposition::Uncategorized(line) => Some(line),
            _ => None,
        })
    }

    /// Tallies every dropped line by reason.
    pub fn gaps(&self, snapshot: &WarehouseSnapshot) -> ExtractionGaps {
        let gaps = self
            .dispositions(snapshot)
            .fold(ExtractionGaps::default(), |mut acc, d| {
                acc.record(&d);
                acc
            });

        metrics::counter!("lifecycle.lines_excluded", "reason" => "channel")
            .increment(gaps.excluded_channel);
        metrics::counter!("lifecycle.lines_excluded", "reason" => "category")
            .increment(gaps.excluded_category);
        metrics::counter!("lifecycle.lines_excluded", "reason" => "identity")
            .increment(gaps.excluded_identity);
        metrics::counter!("lifecycle.lines_uncategorized").increment(gaps.uncategorized_lines);

        if gaps.uncategorized_lines > 0 {
            warn!(
                lines = gaps.uncategorized_lines,
                amount = gaps.uncategorized_amount,
                "Lines without taxonomy excluded from classification"
            );
        }
        if gaps.orphaned > 0 {
            warn!(lines = gaps.orphaned, "Lines reference unknown orders");
        }
        gaps
    }

    /// Disposition of every source line, in snapshot order.
    pub fn dispositions<'s>(
        &'s self,
        snapshot: &'s WarehouseSnapshot,
    ) -> impl Iterator<Item = LineDisposition> + 's {
        let orders = self.resolve_orders(&snapshot.orders, &snapshot.lines);
        let taxonomy: HashMap<&str, &TaxonomyEntry> = snapshot
            .taxonomy
            .iter()
            .map(|t| (t.product_id.as_str(), t))
            .collect();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        snapshot.lines.iter().map(move |line| {
            if !seen.insert((line.order_id.as_str(), line.line_id.as_str())) {
                return LineDisposition::Duplicate;
            }
            self.dispose(line, &orders, &taxonomy)
        })
    }

    fn dispose(
        &self,
        line: &OrderLine,
        orders: &HashMap<&str, ResolvedOrder<'_>>,
        taxonomy: &HashMap<&str, &TaxonomyEntry>,
    ) -> LineDisposition {
        let Some(order) = orders.get(line.order_id.as_str()) else {
            return LineDisposition::Orphaned;
        };
        match order.status {
            OrderStatus::Active => {}
            OrderStatus::Mirror => return LineDisposition::Mirrored,
            OrderStatus::ExcludedChannel => return LineDisposition::ExcludedChannel,
            OrderStatus::ExcludedIdentity => return LineDisposition::ExcludedIdentity,
        }
        if line.channel.as_deref().is_some_and(|c| self.channel_excluded(c)) {
            return LineDisposition::ExcludedChannel;
        }
        if line.cancelled && !self.policy.include_cancelled {
            return LineDisposition::Cancelled;
        }

        let (amount, quantity) = if line.returned && self.policy.negate_returns {
            (-line.amount.abs(), -line.quantity.abs())
        } else {
            (line.amount, line.quantity)
        };

        let entry = taxonomy.get(line.product_id.as_str());
        if entry.is_some_and(|e| self.category_excluded(e)) {
            return LineDisposition::ExcludedCategory;
        }

        let channel = line.channel.as_deref().unwrap_or(&order.primary.channel);
        let extracted = ExtractedLine {
            identity: order.identity.clone(),
            order_id: order.primary.order_id.clone(),
            line_id: line.line_id.clone(),
            order_date: order.primary.order_date,
            segment: self.segment_for(channel),
            department: entry.map(|e| e.department.clone()),
            class_name: entry.map(|e| e.class_name.clone()),
            amount,
            quantity,
            backordered: line.backordered,
        };

        if entry.is_none() && !self.policy.excluded_categories.is_empty() {
            return LineDisposition::Uncategorized(extracted);
        }
        LineDisposition::Keep(extracted)
    }

    /// Collapses mirrored orders onto their primary and applies the
    /// order-level exclusions.
    ///
    /// Lines come from one member per group: the primary when it has lines
    /// of its own, otherwise the first mirror that does. Lines from that
    /// member are emitted under the primary's order id.
    fn resolve_orders<'s>(
        &self,
        headers: &'s [OrderHeader],
        lines: &[OrderLine],
    ) -> HashMap<&'s str, ResolvedOrder<'s>> {
        let with_lines: HashSet<&str> = lines.iter().map(|l| l.order_id.as_str()).collect();

        let mut by_id: HashMap<&str, &OrderHeader> = HashMap::new();
        for header in headers {
            by_id.entry(header.order_id.as_str()).or_insert(header);
        }

        let mut groups: HashMap<&str, Vec<&OrderHeader>> = HashMap::new();
        for &header in by_id.values() {
            groups
                .entry(mirror_root(header, &by_id))
                .or_default()
                .push(header);
        }

        let mut resolved = HashMap::with_capacity(by_id.len());
        for (root_id, mut members) in groups {
            // Primary first, then mirrors in id order.
            members.sort_by(|a, b| {
                (a.order_id != root_id)
                    .cmp(&(b.order_id != root_id))
                    .then_with(|| a.order_id.cmp(&b.order_id))
            });
            let primary = members[0];

            let identity = members
                .iter()
                .find_map(|h| self.normalize_identity(h.identity.as_deref()));

            let status = if self.channel_excluded(&primary.channel) {
                OrderStatus::ExcludedChannel
            } else if identity
                .as_deref()
                .is_some_and(|id| self.policy.excluded_identities.iter().any(|x| x == id))
            {
                OrderStatus::ExcludedIdentity
            } else {
                OrderStatus::Active
            };

            let source = members
                .iter()
                .copied()
                .find(|h| with_lines.contains(h.order_id.as_str()))
                .map_or(primary.order_id.as_str(), |h| h.order_id.as_str());

            if members.len() > 1 {
                debug!(
                    primary = %primary.order_id,
                    source = %source,
                    mirrors = members.len() - 1,
                    "Collapsed mirrored orders"
                );
            }

            for header in members {
                let order_id = header.order_id.as_str();
                resolved.insert(
                    order_id,
                    ResolvedOrder {
                        primary,
                        identity: identity.clone(),
                        status: if order_id == source { status } else { OrderStatus::Mirror },
                    },
                );
            }
        }
        resolved
    }

    fn normalize_identity(&self, raw: Option<&str>) -> Option<String> {
        let identity = raw?.trim().to_lowercase();
        if identity.is_empty() {
            return None;
        }
        if self.policy.require_valid_email && !self.is_valid_email(&identity) {
            return None;
        }
        Some(identity)
    }

    fn is_valid_email(&self, identity: &str) -> bool {
        let Some((local, domain)) = identity.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !self.policy.placeholder_local_parts.iter().any(|p| p == local)
    }

    fn channel_excluded(&self, channel: &str) -> bool {
        let channel = channel.to_lowercase();
        self.policy
            .excluded_channels
            .iter()
            .any(|pattern| channel.contains(pattern.as_str()))
    }

    fn category_excluded(&self, entry: &TaxonomyEntry) -> bool {
        let department = entry.department.to_lowercase();
        let class_name = entry.class_name.to_lowercase();
        self.policy
            .excluded_categories
            .iter()
            .any(|p| department.contains(p.as_str()) || class_name.contains(p.as_str()))
    }

    fn segment_for(&self, channel: &str) -> Option<String> {
        match self.segment_mode {
            SegmentMode::Total => None,
            SegmentMode::Channel => {
                let raw = channel.trim();
                if raw.is_empty() {
                    return None;
                }
                Some(
                    self.channel_map
                        .get(&raw.to_lowercase())
                        .cloned()
                        .unwrap_or_else(|| raw.to_string()),
                )
            }
        }
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Follows `linked_order_id` to the order that owns a mirror chain. Links
/// to orders outside the snapshot end the chain; a cycle resolves to its
/// smallest order id so every member agrees on the same root.
fn mirror_root<'s>(start: &'s OrderHeader, by_id: &HashMap<&str, &'s OrderHeader>) -> &'s str {
    let mut path: Vec<&'s str> = vec![start.order_id.as_str()];
    let mut current = start;
    while let Some(next) = current
        .linked_order_id
        .as_deref()
        .and_then(|id| by_id.get(id).copied())
    {
        let next_id = next.order_id.as_str();
        if let Some(pos) = path.iter().position(|id| *id == next_id) {
            return path[pos..].iter().min().copied().unwrap_or(next_id);
        }
        path.push(next_id);
        current = next;
    }
    current.order_id.as_str()
}
