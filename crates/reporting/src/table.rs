//! Tabular report output with CSV and JSON export.

use lifecycle_core::error::LifecycleResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// Column names plus row cells in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ReportTable {
    /// Builds a table from serializable rows. Columns follow the field
    /// order of the first row; a field missing from a later row is null.
    pub fn from_rows<T: Serialize>(rows: &[T]) -> LifecycleResult<Self> {
        let mut table = ReportTable::default();
        for row in rows {
            let record = match serde_json::to_value(row)? {
                Value::Object(map) => map,
                other => Map::from_iter([("value".to_string(), other)]),
            };
            if table.columns.is_empty() {
                table.columns = record.keys().cloned().collect();
            }
            let cells = table
                .columns
                .iter()
                .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                .collect();
            table.rows.push(cells);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header line then one line per row. Strings are always quoted with
    /// embedded quotes doubled; nulls are empty cells.
    pub fn to_csv(&self) -> String {
        let mut csv = self.columns.join(",");
        csv.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::String(s) => format!("\"{}\"", s.replace('"', "\"\"")),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            csv.push_str(&cells.join(","));
            csv.push('\n');
        }
        csv
    }

    /// Pretty-printed array of objects keyed by column name.
    pub fn to_json(&self) -> LifecycleResult<String> {
        let records: Vec<Map<String, Value>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

pub trait IntoReportTable {
    fn into_report_table(self) -> LifecycleResult<ReportTable>;
}

impl<T: Serialize> IntoReportTable for Vec<T> {
    fn into_report_table(self) -> LifecycleResult<ReportTable> {
        ReportTable::from_rows(&self)
    }
}
