//! Time-bucketed production reports
//!
//! Every reporting endpoint goes through the same pipeline:
//!
//! 1. [`FilterCompiler`] turns the dashboard's filter parameters into
//!    parameterized predicates.
//! 2. [`BucketSelector`] picks daily, weekly-within-month or monthly buckets.
//! 3. [`AggregationExecutor`] fetches matching rows from storage and folds
//!    them into decimal sums and averages per bucket.
//! 4. [`PercentageDeriver`] expresses summary totals as percentages of a base.
//!
//! Which table and columns a report reads is data in [`catalog`].

pub mod bucket;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod executor;
pub mod filter;
pub mod numeric;
pub mod percentage;
pub mod query;

pub use bucket::{week_of_month, BucketKey, BucketSelector, BucketingStrategy};
pub use catalog::{AggregationKind, MetricColumn, MetricSpec, MetricTable};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ReportError, ReportResult};
pub use executor::{AggregationBucket, AggregationExecutor, AggregationResult, SummaryResult};
pub use filter::{
    BindValue, CompiledFilter, DateRange, Dialect, FilterCompiler, FilterRequest, Predicate,
    QuarterCalendar,
};
pub use percentage::PercentageDeriver;
pub use query::{MetricQuery, MetricRow};
