//! Department and class sales, units and backorders, ranked.

use std::collections::BTreeMap;

use lifecycle_core::types::PurchaseEvent;
use lifecycle_engine::classify::ClassifiedEvent;
use serde::{Deserialize, Serialize};

use crate::rank::{rank_by, RankedRow};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMetric {
    #[default]
    Sales,
    Units,
    Backorder,
}

impl CategoryMetric {
    fn value(&self, totals: &CategoryTotals) -> f64 {
        match self {
            Self::Sales => totals.sales_value,
            Self::Units => totals.units as f64,
            Self::Backorder => totals.backorder_value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub sales_value: f64,
    pub units: i64,
    /// Amount on lines flagged backordered.
    pub backorder_value: f64,
    pub line_count: u64,
}

impl CategoryTotals {
    fn add(&mut self, e: &PurchaseEvent) {
        self.sales_value += e.amount;
        self.units += e.quantity;
        if e.backordered {
            self.backorder_value += e.amount;
        }
        self.line_count += 1;
    }

    fn absorb(&mut self, other: &CategoryTotals) {
        self.sales_value += other.sales_value;
        self.units += other.units;
        self.backorder_value += other.backorder_value;
        self.line_count += other.line_count;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub department: String,
    pub class_name: String,
    #[serde(flatten)]
    pub totals: CategoryTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentSummary {
    pub department: String,
    pub class_count: u32,
    #[serde(flatten)]
    pub totals: CategoryTotals,
}

/// Totals per (department, class). Lines without taxonomy roll into
/// [`UNCATEGORIZED`] for both keys.
pub fn summarize_classes(classified: &[ClassifiedEvent]) -> Vec<CategorySummary> {
    let mut by_class: BTreeMap<(&str, &str), CategoryTotals> = BTreeMap::new();
    for c in classified {
        let department = c.event.department.as_deref().unwrap_or(UNCATEGORIZED);
        let class_name = c.event.class_name.as_deref().unwrap_or(UNCATEGORIZED);
        by_class.entry((department, class_name)).or_default().add(&c.event);
    }
    by_class
        .into_iter()
        .map(|((department, class_name), totals)| CategorySummary {
            department: department.to_string(),
            class_name: class_name.to_string(),
            totals,
        })
        .collect()
}

/// Folds lines held out of classification for lack of taxonomy into the
/// [`UNCATEGORIZED`] row, creating it if needed.
pub fn add_uncategorized(classes: &mut Vec<CategorySummary>, uncategorized: &[PurchaseEvent]) {
    if uncategorized.is_empty() {
        return;
    }
    let index = match classes
        .iter()
        .position(|c| c.department == UNCATEGORIZED && c.class_name == UNCATEGORIZED)
    {
        Some(index) => index,
        None => {
            classes.push(CategorySummary {
                department: UNCATEGORIZED.to_string(),
                class_name: UNCATEGORIZED.to_string(),
                totals: CategoryTotals::default(),
            });
            classes.len() - 1
        }
    };
    for event in uncategorized {
        classes[index].totals.add(event);
    }
}

pub fn summarize_departments(classes: &[CategorySummary]) -> Vec<DepartmentSummary> {
    let mut by_department: BTreeMap<&str, DepartmentSummary> = BTreeMap::new();
    for class in classes {
        let entry = by_department
            .entry(class.department.as_str())
            .or_insert_with(|| DepartmentSummary {
                department: class.department.clone(),
                class_count: 0,
                totals: CategoryTotals::default(),
            });
        entry.class_count += 1;
        entry.totals.absorb(&class.totals);
    }
    by_department.into_values().collect()
}

/// Classes ranked within their department.
pub fn rank_classes(
    classes: Vec<CategorySummary>,
    metric: CategoryMetric,
) -> Vec<RankedRow<CategorySummary>> {
    rank_by(
        classes,
        |c| c.department.clone(),
        |c| metric.value(&c.totals),
        |c| c.class_name.clone(),
    )
}

/// Departments ranked against each other.
pub fn rank_departments(
    departments: Vec<DepartmentSummary>,
    metric: CategoryMetric,
) -> Vec<RankedRow<DepartmentSummary>> {
    rank_by(
        departments,
        |_| (),
        |d| metric.value(&d.totals),
        |d| d.department.clone(),
    )
}
