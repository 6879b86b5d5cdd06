//! Time bucketing for chart-style reports

use chrono::{Datelike, NaiveDate};

use super::filter::FilterRequest;

/// How rows are grouped into chart points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketingStrategy {
    Daily,
    WeeklyWithinMonth,
    Monthly,
}

/// Group key of a single bucket. Week and month keys carry the first day of
/// their month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Day(NaiveDate),
    Week { month_start: NaiveDate, week: u32 },
    Month(NaiveDate),
}

/// Week of the month as `floor((day - 1) / 7) + 1`, always 1..=5
pub fn week_of_month(day_of_month: u32) -> u32 {
    (day_of_month.saturating_sub(1)) / 7 + 1
}

pub struct BucketSelector;

impl BucketSelector {
    pub fn select(request: &FilterRequest) -> BucketingStrategy {
        if request.date_range.is_some()
            || request.exact_date.is_some()
            || !request.effective_weeks().is_empty()
        {
            BucketingStrategy::Daily
        } else if !request.months.is_empty() {
            BucketingStrategy::WeeklyWithinMonth
        } else {
            BucketingStrategy::Monthly
        }
    }
}

impl BucketingStrategy {
    pub fn key_for(self, date: NaiveDate) -> BucketKey {
        // Day 1 exists in every month.
        let month_start = date.with_day(1).unwrap_or(date);
        match self {
            Self::Daily => BucketKey::Day(date),
            Self::WeeklyWithinMonth => BucketKey::Week {
                month_start,
                week: week_of_month(date.day()),
            },
            Self::Monthly => BucketKey::Month(month_start),
        }
    }
}

impl BucketKey {
    /// Dashboard label: `2024-01-05`, `Week 2 - Mar 2024` or `Mar 2024`
    pub fn label(&self) -> String {
        match *self {
            BucketKey::Day(date) => date.format("%Y-%m-%d").to_string(),
            BucketKey::Week { month_start, week } => {
                format!("Week {week} - {}", month_start.format("%b %Y"))
            }
            BucketKey::Month(month_start) => month_start.format("%b %Y").to_string(),
        }
    }
}
