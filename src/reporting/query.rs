use chrono::NaiveDate;

use super::catalog::{self, MetricTable};
use super::error::ReportResult;
use super::filter::{BindValue, CompiledFilter, Dialect, DATE_COLUMN, SHIFT_COLUMN};

/// A validated read against one metric table
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub table: &'static MetricTable,
    pub columns: Vec<&'static str>,
    pub filter: CompiledFilter,
}

impl MetricQuery {
    /// Resolve `table_name` and `columns` against the allow-list.
    pub fn new(table_name: &str, columns: &[&str], filter: CompiledFilter) -> ReportResult<Self> {
        let table = catalog::table(table_name)?;
        let mut resolved: Vec<&'static str> = Vec::with_capacity(columns.len());
        for column in columns {
            let column = table.column(column)?;
            if !resolved.contains(&column) {
                resolved.push(column);
            }
        }
        Ok(Self {
            table,
            columns: resolved,
            filter,
        })
    }

    /// Query over every metric column of the table
    pub fn all_columns(table_name: &str, filter: CompiledFilter) -> ReportResult<Self> {
        let table = catalog::table(table_name)?;
        Ok(Self {
            table,
            columns: table.columns.to_vec(),
            filter,
        })
    }

    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<BindValue>) {
        let (clause, binds) = self.filter.where_clause(dialect);
        let mut select = vec![DATE_COLUMN, SHIFT_COLUMN];
        select.extend(self.columns.iter().copied());
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {DATE_COLUMN} ASC, id ASC",
            select.join(", "),
            self.table.name,
            clause
        );
        (sql, binds)
    }
}

/// One fetched row; `values` line up with [`MetricQuery::columns`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRow {
    pub entry_date: NaiveDate,
    pub shift: Option<i64>,
    pub values: Vec<Option<String>>,
}
