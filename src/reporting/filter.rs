//! Filter compilation for reporting queries
//!
//! A [`FilterRequest`] describes what the dashboard asked for: an organisation,
//! one primary time filter (exact day, date range or year list) and optional
//! month, quarter, week-of-month and shift filters layered on top. The
//! [`FilterCompiler`] turns it into an ordered list of [`Predicate`]s that a
//! store renders into placeholder SQL for its own dialect. Caller-supplied
//! values only ever travel as bound parameters.

use chrono::{Datelike, Months, NaiveDate};

use super::clock::Clock;
use super::error::{ReportError, ReportResult};

pub const ORGANISATION_COLUMN: &str = "organisation_id";
pub const DATE_COLUMN: &str = "entry_date";
pub const SHIFT_COLUMN: &str = "shift";

/// Inclusive day range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRequest {
    pub organisation_id: String,
    pub exact_date: Option<NaiveDate>,
    pub date_range: Option<DateRange>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub weeks_of_month: Vec<u32>,
    pub quarters: Vec<u32>,
    pub shift: Option<i64>,
}

impl FilterRequest {
    pub fn new(organisation_id: impl Into<String>) -> Self {
        Self {
            organisation_id: organisation_id.into(),
            ..Self::default()
        }
    }

    /// Week-of-month values with anything outside 1..=5 dropped
    pub fn effective_weeks(&self) -> Vec<u32> {
        dedup_in_order(
            self.weeks_of_month
                .iter()
                .copied()
                .filter(|week| (1..=5).contains(week)),
        )
    }

    /// Whether any time-based filter was supplied at all
    pub fn has_temporal_filter(&self) -> bool {
        self.exact_date.is_some()
            || self.date_range.is_some()
            || !self.years.is_empty()
            || !self.months.is_empty()
            || !self.quarters.is_empty()
            || !self.effective_weeks().is_empty()
    }
}

/// Quarter-to-month lookup. Reports pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterCalendar {
    /// Q1 starts in March
    Fiscal,
    /// Q1 starts in January
    Calendar,
}

impl QuarterCalendar {
    pub fn months(self, quarter: u32) -> Option<[u32; 3]> {
        let months = match (self, quarter) {
            (Self::Fiscal, 1) => [3, 4, 5],
            (Self::Fiscal, 2) => [6, 7, 8],
            (Self::Fiscal, 3) => [9, 10, 11],
            (Self::Fiscal, 4) => [12, 1, 2],
            (Self::Calendar, 1) => [1, 2, 3],
            (Self::Calendar, 2) => [4, 5, 6],
            (Self::Calendar, 3) => [7, 8, 9],
            (Self::Calendar, 4) => [10, 11, 12],
            _ => return None,
        };
        Some(months)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePart {
    Year,
    Month,
    Day,
}

impl Dialect {
    /// Placeholder for the `index`-th bound value (1-based)
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${index}"),
        }
    }

    fn date_part(self, part: DatePart, column: &str) -> String {
        match self {
            Self::Sqlite => {
                let pattern = match part {
                    DatePart::Year => "%Y",
                    DatePart::Month => "%m",
                    DatePart::Day => "%d",
                };
                format!("CAST(strftime('{pattern}', {column}) AS INTEGER)")
            }
            Self::Postgres => {
                let field = match part {
                    DatePart::Year => "YEAR",
                    DatePart::Month => "MONTH",
                    DatePart::Day => "DAY",
                };
                format!("CAST(EXTRACT({field} FROM {column}) AS BIGINT)")
            }
        }
    }

    fn week_of_month(self, column: &str) -> String {
        format!("(({} - 1) / 7 + 1)", self.date_part(DatePart::Day, column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Date(NaiveDate),
}

/// One AND-ed condition of a reporting query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Organisation(String),
    ExactDate(NaiveDate),
    DateBetween(NaiveDate, NaiveDate),
    YearIn(Vec<i32>),
    MonthIn(Vec<u32>),
    WeekOfMonthIn(Vec<u32>),
    Shift(i64),
}

impl Predicate {
    /// Render as a placeholder fragment, appending its values to `binds`.
    pub fn render(&self, dialect: Dialect, binds: &mut Vec<BindValue>) -> String {
        let mut bind = |value: BindValue| {
            binds.push(value);
            dialect.placeholder(binds.len())
        };

        match self {
            Predicate::Organisation(id) => {
                format!("{ORGANISATION_COLUMN} = {}", bind(BindValue::Text(id.clone())))
            }
            Predicate::ExactDate(day) => {
                format!("{DATE_COLUMN} = {}", bind(BindValue::Date(*day)))
            }
            Predicate::DateBetween(start, end) => {
                let start = bind(BindValue::Date(*start));
                let end = bind(BindValue::Date(*end));
                format!("{DATE_COLUMN} BETWEEN {start} AND {end}")
            }
            Predicate::YearIn(years) => {
                let placeholders: Vec<String> = years
                    .iter()
                    .map(|year| bind(BindValue::Int(i64::from(*year))))
                    .collect();
                format!(
                    "{} IN ({})",
                    dialect.date_part(DatePart::Year, DATE_COLUMN),
                    placeholders.join(", ")
                )
            }
            Predicate::MonthIn(months) => {
                let placeholders: Vec<String> = months
                    .iter()
                    .map(|month| bind(BindValue::Int(i64::from(*month))))
                    .collect();
                format!(
                    "{} IN ({})",
                    dialect.date_part(DatePart::Month, DATE_COLUMN),
                    placeholders.join(", ")
                )
            }
            Predicate::WeekOfMonthIn(weeks) => {
                let placeholders: Vec<String> = weeks
                    .iter()
                    .map(|week| bind(BindValue::Int(i64::from(*week))))
                    .collect();
                format!(
                    "{} IN ({})",
                    dialect.week_of_month(DATE_COLUMN),
                    placeholders.join(", ")
                )
            }
            Predicate::Shift(shift) => {
                format!("{SHIFT_COLUMN} = {}", bind(BindValue::Int(*shift)))
            }
        }
    }
}

/// Predicates produced for one request, in evaluation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub predicates: Vec<Predicate>,
}

impl CompiledFilter {
    /// Rendered fragments plus their bound values, in placeholder order
    pub fn render(&self, dialect: Dialect) -> (Vec<String>, Vec<BindValue>) {
        let mut binds = Vec::new();
        let fragments = self
            .predicates
            .iter()
            .map(|predicate| predicate.render(dialect, &mut binds))
            .collect();
        (fragments, binds)
    }

    /// `WHERE`-ready clause (without the keyword)
    pub fn where_clause(&self, dialect: Dialect) -> (String, Vec<BindValue>) {
        let (fragments, binds) = self.render(dialect);
        let clause = if fragments.is_empty() {
            "1 = 1".to_string()
        } else {
            fragments.join(" AND ")
        };
        (clause, binds)
    }
}

pub struct FilterCompiler<'a> {
    clock: &'a dyn Clock,
    quarters: QuarterCalendar,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(clock: &'a dyn Clock, quarters: QuarterCalendar) -> Self {
        Self { clock, quarters }
    }

    pub fn compile(&self, request: &FilterRequest) -> ReportResult<CompiledFilter> {
        let organisation_id = request.organisation_id.trim();
        if organisation_id.is_empty() {
            return Err(ReportError::validation("organisation_id is required"));
        }

        if let Some(month) = request.months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(ReportError::validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if let Some(shift) = request.shift {
            if !(1..=3).contains(&shift) {
                return Err(ReportError::validation(format!(
                    "shift must be between 1 and 3, got {shift}"
                )));
            }
        }

        let mut predicates = vec![Predicate::Organisation(organisation_id.to_string())];

        if let Some(day) = request.exact_date {
            predicates.push(Predicate::ExactDate(day));
        } else if let Some(range) = request.date_range {
            if range.start > range.end {
                return Err(ReportError::validation(
                    "start_date must not be after end_date",
                ));
            }
            predicates.push(Predicate::DateBetween(range.start, range.end));
        } else if !request.years.is_empty() {
            predicates.push(Predicate::YearIn(dedup_in_order(
                request.years.iter().copied(),
            )));
        } else if !request.has_temporal_filter() {
            let (start, end) = trailing_year_window(self.clock.today()).ok_or_else(|| {
                ReportError::validation("current date is outside the supported range")
            })?;
            predicates.push(Predicate::DateBetween(start, end));
        }

        if !request.months.is_empty() {
            predicates.push(Predicate::MonthIn(dedup_in_order(
                request.months.iter().copied(),
            )));
        }

        if !request.quarters.is_empty() {
            let mut quarter_months = Vec::with_capacity(request.quarters.len() * 3);
            for quarter in &request.quarters {
                let months = self.quarters.months(*quarter).ok_or_else(|| {
                    ReportError::validation(format!(
                        "quarter must be between 1 and 4, got {quarter}"
                    ))
                })?;
                quarter_months.extend(months);
            }
            // Kept separate from the month predicate so both apply (intersection).
            predicates.push(Predicate::MonthIn(dedup_in_order(quarter_months)));
        }

        let weeks = request.effective_weeks();
        if !weeks.is_empty() {
            predicates.push(Predicate::WeekOfMonthIn(weeks));
        }

        if let Some(shift) = request.shift {
            predicates.push(Predicate::Shift(shift));
        }

        Ok(CompiledFilter { predicates })
    }
}

/// First day eleven months back through the last day of the current month
pub fn trailing_year_window(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let month_start = today.with_day(1)?;
    let start = month_start.checked_sub_months(Months::new(11))?;
    let end = month_start.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((start, end))
}

fn dedup_in_order<T: PartialEq + Copy>(values: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
