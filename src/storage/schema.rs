//! DDL for the allow-listed metric tables

use crate::reporting::catalog::METRIC_TABLES;
use crate::reporting::filter::{DATE_COLUMN, ORGANISATION_COLUMN, SHIFT_COLUMN};
use crate::reporting::{Dialect, MetricTable};

/// `CREATE TABLE` plus index statements for every metric table
pub fn metric_table_statements(dialect: Dialect) -> Vec<String> {
    METRIC_TABLES
        .iter()
        .flat_map(|table| table_statements(table, dialect))
        .collect()
}

fn table_statements(table: &MetricTable, dialect: Dialect) -> [String; 2] {
    let (id, date, shift) = match dialect {
        Dialect::Sqlite => ("id INTEGER PRIMARY KEY AUTOINCREMENT", "TEXT", "INTEGER"),
        Dialect::Postgres => ("id BIGSERIAL PRIMARY KEY", "DATE", "BIGINT"),
    };
    // Metric columns are TEXT: uploads carry sentinel strings alongside numbers.
    let metric_columns: String = table
        .columns
        .iter()
        .map(|column| format!(",\n    {column} TEXT"))
        .collect();

    [
        format!(
            "CREATE TABLE IF NOT EXISTS {name} (\n    {id},\n    {ORGANISATION_COLUMN} TEXT NOT NULL,\n    {DATE_COLUMN} {date} NOT NULL,\n    {SHIFT_COLUMN} {shift}{metric_columns}\n)",
            name = table.name,
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{name}_org_date ON {name}({ORGANISATION_COLUMN}, {DATE_COLUMN})",
            name = table.name,
        ),
    ]
}
