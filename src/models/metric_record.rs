//! Metric rows submitted for ingest

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::reporting::filter::{Dialect, DATE_COLUMN, ORGANISATION_COLUMN, SHIFT_COLUMN};
use crate::reporting::{MetricTable, ReportError, ReportResult};

/// One day's (and optionally one shift's) figures for a metric table.
///
/// Values are stored verbatim as text, so sentinel strings such as `"N/A"`
/// survive ingest and are treated as missing at report time.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricRecord {
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub shift: Option<i64>,
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

/// A record whose columns were checked against the allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRecord {
    pub entry_date: NaiveDate,
    pub shift: Option<i64>,
    pub values: Vec<(&'static str, Option<String>)>,
}

impl MetricRecord {
    pub fn prepare(&self, table: &MetricTable) -> ReportResult<PreparedRecord> {
        if let Some(shift) = self.shift {
            if !(1..=3).contains(&shift) {
                return Err(ReportError::validation(format!(
                    "shift must be between 1 and 3, got {shift}"
                )));
            }
        }

        let mut values = Vec::with_capacity(self.values.len());
        for (name, value) in &self.values {
            let column = table.column(name)?;
            let text = match value {
                Value::Null => None,
                Value::Number(number) => Some(number.to_string()),
                Value::String(text) => Some(text.clone()),
                _ => {
                    return Err(ReportError::validation(format!(
                        "value for '{name}' must be a number, string or null"
                    )))
                }
            };
            values.push((column, text));
        }

        Ok(PreparedRecord {
            entry_date: self.entry_date,
            shift: self.shift,
            values,
        })
    }
}

impl PreparedRecord {
    /// `INSERT` for this record's column set; binds follow the column order
    /// (organisation, date, shift, then each value).
    pub fn insert_sql(&self, table: &MetricTable, dialect: Dialect) -> String {
        let mut columns = vec![ORGANISATION_COLUMN, DATE_COLUMN, SHIFT_COLUMN];
        columns.extend(self.values.iter().map(|(column, _)| *column));
        let placeholders: Vec<String> = (1..=columns.len())
            .map(|index| dialect.placeholder(index))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}
