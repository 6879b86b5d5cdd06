//! Runs compiled report plans against storage and folds rows into buckets

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use super::bucket::{BucketKey, BucketSelector, BucketingStrategy};
use super::catalog::{
    AggregationKind, MetricSpec, MetricTable, ReportDefinition, SummaryDefinition,
};
use super::clock::Clock;
use super::error::{ReportError, ReportResult};
use super::filter::{CompiledFilter, FilterCompiler, FilterRequest, QuarterCalendar};
use super::numeric::{display_value, parse_metric_value};
use super::percentage::PercentageDeriver;
use super::query::{MetricQuery, MetricRow};
use crate::storage::Storage;

const SHIFTS: [i64; 3] = [1, 2, 3];

/// One chart point
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationBucket {
    pub label: String,
    pub metrics: Vec<(String, Option<Decimal>)>,
}

impl AggregationBucket {
    pub fn metric(&self, name: &str) -> Option<Decimal> {
        self.metrics
            .iter()
            .find(|(metric, _)| metric == name)
            .and_then(|(_, value)| *value)
    }
}

impl Serialize for AggregationBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len() + 1))?;
        map.serialize_entry("label", &self.label)?;
        for (name, value) in &self.metrics {
            map.serialize_entry(name, &display_value(*value))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub strategy: BucketingStrategy,
    pub buckets: Vec<AggregationBucket>,
}

/// Totals over every matching row plus percentages of the base total
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryResult {
    pub base: &'static str,
    pub totals: Vec<(String, Decimal)>,
    pub percentages: BTreeMap<String, String>,
    pub row_count: usize,
}

impl SummaryResult {
    pub fn total(&self, name: &str) -> Option<Decimal> {
        self.totals
            .iter()
            .find(|(total, _)| total == name)
            .map(|(_, value)| *value)
    }
}

impl Serialize for SummaryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.totals.len() + 3))?;
        map.serialize_entry("base", self.base)?;
        for (name, value) in &self.totals {
            map.serialize_entry(name, &display_value(Some(*value)))?;
        }
        map.serialize_entry("percentages", &self.percentages)?;
        map.serialize_entry("row_count", &self.row_count)?;
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: Decimal,
    count: u64,
    overflowed: bool,
}

impl Accumulator {
    fn add(&mut self, value: Decimal) {
        if self.overflowed {
            return;
        }
        match self.sum.checked_add(value) {
            Some(sum) => {
                self.sum = sum;
                self.count += 1;
            }
            None => {
                warn!(sum = %self.sum, %value, "metric sum overflowed decimal range");
                self.overflowed = true;
            }
        }
    }

    /// `None` when nothing parsed or the sum overflowed
    fn finish(&self, kind: AggregationKind) -> Option<Decimal> {
        if self.count == 0 || self.overflowed {
            return None;
        }
        match kind {
            AggregationKind::Sum => Some(self.sum),
            AggregationKind::Average => Some(self.sum / Decimal::from(self.count)),
        }
    }
}

struct BucketState {
    first_date: NaiveDate,
    overall: Vec<Accumulator>,
    by_shift: [Vec<Accumulator>; 3],
}

impl BucketState {
    fn new(first_date: NaiveDate, metrics: usize) -> Self {
        Self {
            first_date,
            overall: vec![Accumulator::default(); metrics],
            by_shift: [
                vec![Accumulator::default(); metrics],
                vec![Accumulator::default(); metrics],
                vec![Accumulator::default(); metrics],
            ],
        }
    }
}

/// Group rows into buckets and aggregate each metric.
///
/// Values that do not parse as decimals are skipped, so they count toward
/// neither a sum nor an average's denominator.
pub fn aggregate_rows(
    rows: &[MetricRow],
    columns: &[&str],
    spec: &MetricSpec,
    strategy: BucketingStrategy,
) -> AggregationResult {
    let positions: Vec<Option<usize>> = spec
        .metrics
        .iter()
        .map(|metric| columns.iter().position(|c| *c == metric.source_column))
        .collect();

    let mut buckets: HashMap<BucketKey, BucketState> = HashMap::new();
    for row in rows {
        let key = strategy.key_for(row.entry_date);
        let state = buckets
            .entry(key)
            .or_insert_with(|| BucketState::new(row.entry_date, spec.metrics.len()));
        state.first_date = state.first_date.min(row.entry_date);

        let shift_slot = row
            .shift
            .and_then(|shift| SHIFTS.iter().position(|s| *s == shift));

        for (index, position) in positions.iter().enumerate() {
            let Some(value) = position
                .and_then(|p| row.values.get(p))
                .and_then(|raw| raw.as_deref())
                .and_then(parse_metric_value)
            else {
                continue;
            };
            state.overall[index].add(value);
            if let Some(slot) = shift_slot {
                state.by_shift[slot][index].add(value);
            }
        }
    }

    let mut ordered: Vec<(BucketKey, BucketState)> = buckets.into_iter().collect();
    ordered.sort_by(|(key_a, a), (key_b, b)| {
        a.first_date.cmp(&b.first_date).then_with(|| key_a.cmp(key_b))
    });

    let buckets = ordered
        .into_iter()
        .map(|(key, state)| {
            let mut metrics = Vec::new();
            for (index, metric) in spec.metrics.iter().enumerate() {
                metrics.push((
                    metric.output_name.to_string(),
                    state.overall[index].finish(metric.kind),
                ));
                if spec.shift_split {
                    for (slot, shift) in SHIFTS.iter().enumerate() {
                        metrics.push((
                            format!("{}_shift{shift}", metric.output_name),
                            state.by_shift[slot][index].finish(metric.kind),
                        ));
                    }
                }
            }
            AggregationBucket {
                label: key.label(),
                metrics,
            }
        })
        .collect();

    AggregationResult { strategy, buckets }
}

fn checked_total<'a>(
    name: &str,
    values: impl IntoIterator<Item = &'a Decimal>,
) -> ReportResult<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, value| {
        acc.checked_add(*value)
            .ok_or_else(|| ReportError::Overflow(name.to_string()))
    })
}

/// Total the base and component columns over all rows.
///
/// A total that leaves the decimal range fails the whole summary.
pub fn summarize_rows(
    rows: &[MetricRow],
    columns: &[&str],
    summary: &SummaryDefinition,
) -> ReportResult<SummaryResult> {
    let column_total = |column: &str| -> ReportResult<Decimal> {
        let Some(position) = columns.iter().position(|c| *c == column) else {
            return Ok(Decimal::ZERO);
        };
        let values: Vec<Decimal> = rows
            .iter()
            .filter_map(|row| row.values.get(position))
            .filter_map(|raw| raw.as_deref())
            .filter_map(parse_metric_value)
            .collect();
        checked_total(column, &values)
    };

    let base_total = column_total(summary.base)?;
    let mut totals = vec![(summary.base.to_string(), base_total)];
    let mut components = BTreeMap::new();
    for column in summary.components.iter().copied() {
        let total = column_total(column)?;
        totals.push((column.to_string(), total));
        components.insert(column.to_string(), total);
    }

    if let Some(derived) = &summary.derived {
        let total = checked_total(
            derived.name,
            derived.parts.iter().filter_map(|part| components.get(*part)),
        )?;
        totals.push((derived.name.to_string(), total));
        components.insert(derived.name.to_string(), total);
    }

    Ok(SummaryResult {
        base: summary.base,
        totals,
        percentages: PercentageDeriver::derive(base_total, &components),
        row_count: rows.len(),
    })
}

pub struct AggregationExecutor<'a> {
    storage: &'a dyn Storage,
    clock: &'a dyn Clock,
}

impl<'a> AggregationExecutor<'a> {
    pub fn new(storage: &'a dyn Storage, clock: &'a dyn Clock) -> Self {
        Self { storage, clock }
    }

    pub async fn run_report(
        &self,
        report: &ReportDefinition,
        request: &FilterRequest,
    ) -> ReportResult<AggregationResult> {
        let filter = FilterCompiler::new(self.clock, report.quarters).compile(request)?;
        let strategy = BucketSelector::select(request);
        debug!(
            report = report.slug,
            organisation_id = %request.organisation_id,
            ?strategy,
            "running chart report"
        );
        self.execute(report.table, &report.spec, filter, strategy).await
    }

    pub async fn execute(
        &self,
        table: &MetricTable,
        spec: &MetricSpec,
        filter: CompiledFilter,
        strategy: BucketingStrategy,
    ) -> ReportResult<AggregationResult> {
        let columns: Vec<&str> = spec.metrics.iter().map(|m| m.source_column).collect();
        let query = MetricQuery::new(table.name, &columns, filter)?;
        let rows = self.storage.fetch_metric_rows(&query).await?;
        debug!(table = table.name, rows = rows.len(), "fetched metric rows");
        Ok(aggregate_rows(&rows, &query.columns, spec, strategy))
    }

    pub async fn run_summary(
        &self,
        summary: &SummaryDefinition,
        request: &FilterRequest,
    ) -> ReportResult<SummaryResult> {
        let filter = FilterCompiler::new(self.clock, summary.quarters).compile(request)?;
        let mut columns = vec![summary.base];
        columns.extend(summary.components.iter().copied());
        let query = MetricQuery::new(summary.table.name, &columns, filter)?;
        let rows = self.storage.fetch_metric_rows(&query).await?;
        debug!(
            summary = summary.slug,
            rows = rows.len(),
            "fetched summary rows"
        );
        summarize_rows(&rows, &query.columns, summary)
    }

    /// Raw filtered rows of an allow-listed table
    pub async fn table_rows(
        &self,
        table_name: &str,
        request: &FilterRequest,
    ) -> ReportResult<(MetricQuery, Vec<MetricRow>)> {
        let filter = FilterCompiler::new(self.clock, QuarterCalendar::Fiscal)
            .compile(request)?;
        let query = MetricQuery::all_columns(table_name, filter)?;
        let rows = self.storage.fetch_metric_rows(&query).await?;
        Ok((query, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::catalog::{self, MetricColumn};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(day: NaiveDate, shift: Option<i64>, values: &[Option<&str>]) -> MetricRow {
        MetricRow {
            entry_date: day,
            shift,
            values: values.iter().map(|v| v.map(str::to_string)).collect(),
        }
    }

    const EFFICIENCY: MetricSpec = MetricSpec {
        metrics: &[MetricColumn {
            output_name: "efficiency",
            source_column: "efficiency_pct",
            kind: AggregationKind::Average,
        }],
        shift_split: false,
    };

    #[test]
    fn test_unparseable_values_are_excluded_from_average() {
        let rows = vec![
            row(date(2024, 1, 1), Some(1), &[Some("80")]),
            row(date(2024, 1, 2), Some(1), &[Some("N/A")]),
            row(date(2024, 1, 3), Some(1), &[None]),
            row(date(2024, 1, 4), Some(1), &[Some("90")]),
        ];
        let result = aggregate_rows(
            &rows,
            &["efficiency_pct"],
            &EFFICIENCY,
            BucketingStrategy::Monthly,
        );
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].label, "Jan 2024");
        assert_eq!(result.buckets[0].metric("efficiency"), Some(Decimal::from(85)));
    }

    #[test]
    fn test_all_null_bucket_is_null() {
        let rows = vec![row(date(2024, 1, 1), None, &[Some("-")])];
        let result = aggregate_rows(
            &rows,
            &["efficiency_pct"],
            &EFFICIENCY,
            BucketingStrategy::Daily,
        );
        assert_eq!(result.buckets[0].metrics, vec![("efficiency".to_string(), None)]);
    }

    #[test]
    fn test_buckets_are_ordered_by_earliest_date() {
        let rows = vec![
            row(date(2024, 3, 20), None, &[Some("1")]),
            row(date(2023, 12, 5), None, &[Some("2")]),
            row(date(2024, 1, 9), None, &[Some("3")]),
        ];
        let result = aggregate_rows(
            &rows,
            &["efficiency_pct"],
            &EFFICIENCY,
            BucketingStrategy::Monthly,
        );
        let labels: Vec<&str> = result.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Dec 2023", "Jan 2024", "Mar 2024"]);
    }

    #[test]
    fn test_weekly_buckets() {
        let rows = vec![
            row(date(2024, 3, 1), None, &[Some("10")]),
            row(date(2024, 3, 7), None, &[Some("20")]),
            row(date(2024, 3, 8), None, &[Some("30")]),
            row(date(2024, 3, 31), None, &[Some("40")]),
        ];
        let result = aggregate_rows(
            &rows,
            &["efficiency_pct"],
            &EFFICIENCY,
            BucketingStrategy::WeeklyWithinMonth,
        );
        let labels: Vec<&str> = result.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Week 1 - Mar 2024", "Week 2 - Mar 2024", "Week 5 - Mar 2024"]
        );
        assert_eq!(result.buckets[0].metric("efficiency"), Some(Decimal::from(15)));
    }

    #[test]
    fn test_shift_split() {
        let spec = catalog::report("production-efficiency").unwrap().spec;
        let rows = vec![
            row(date(2024, 1, 1), Some(1), &[Some("80"), Some("100")]),
            row(date(2024, 1, 1), Some(2), &[Some("70"), Some("50.5")]),
            row(date(2024, 1, 1), Some(2), &[Some("90"), Some("49.5")]),
        ];
        let result = aggregate_rows(
            &rows,
            &["efficiency_pct", "actual_kg"],
            &spec,
            BucketingStrategy::Daily,
        );
        let bucket = &result.buckets[0];
        assert_eq!(bucket.metric("efficiency"), Some(Decimal::from(80)));
        assert_eq!(bucket.metric("efficiency_shift1"), Some(Decimal::from(80)));
        assert_eq!(bucket.metric("efficiency_shift2"), Some(Decimal::from(80)));
        assert_eq!(bucket.metric("efficiency_shift3"), None);
        assert_eq!(bucket.metric("actual_kg"), Some(Decimal::from(200)));
        assert_eq!(bucket.metric("actual_kg_shift2"), Some(Decimal::from(100)));
    }

    #[test]
    fn test_bucket_serializes_flat_and_rounded() {
        let bucket = AggregationBucket {
            label: "Jan 2024".to_string(),
            metrics: vec![
                ("efficiency".to_string(), Some(Decimal::new(866667, 4))),
                ("actual_kg".to_string(), None),
            ],
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"label": "Jan 2024", "efficiency": 86.67, "actual_kg": null})
        );
    }

    #[test]
    fn test_summary_waste_output_is_additive() {
        let summary = catalog::summary("yarn-realisation").unwrap();
        let columns: Vec<&str> = std::iter::once(summary.base)
            .chain(summary.components.iter().copied())
            .collect();
        let rows = vec![
            row(
                date(2024, 1, 1),
                Some(1),
                &[
                    Some("1000"),
                    Some("850.25"),
                    Some("40.10"),
                    Some("12.05"),
                    Some("8.3"),
                    Some("N/A"),
                ],
            ),
            row(
                date(2024, 1, 2),
                Some(2),
                &[
                    Some("500"),
                    Some("420"),
                    Some("20"),
                    Some("6.45"),
                    Some("4"),
                    Some("2.2"),
                ],
            ),
        ];
        let result = summarize_rows(&rows, &columns, summary).unwrap();
        let parts: Decimal = ["blowroom_waste", "filter_waste", "roving_waste", "other_waste"]
            .iter()
            .map(|name| result.total(name).unwrap())
            .sum();
        assert_eq!(result.total("waste_output"), Some(parts));
        assert_eq!(result.total("waste_output"), Some(Decimal::new(9310, 2)));
        assert_eq!(result.total("cotton_issued_kg"), Some(Decimal::from(1500)));
        assert_eq!(result.percentages["yarn_produced_kg"], "84.68");
        assert_eq!(result.row_count, 2);
    }

    #[test]
    fn test_summary_without_rows_is_zero() {
        let summary = catalog::summary("ring-frame-utilisation").unwrap();
        let result = summarize_rows(&[], &[], summary).unwrap();
        assert_eq!(result.total("allocated_spindle_hours"), Some(Decimal::ZERO));
        assert_eq!(result.total("total_downtime"), Some(Decimal::ZERO));
        assert!(result.percentages.values().all(|pct| pct == "0.00"));
        assert_eq!(result.row_count, 0);
    }

    const MAX: &str = "79228162514264337593543950335";

    #[test]
    fn test_overflowing_bucket_sum_is_null() {
        let spec = MetricSpec {
            metrics: &[MetricColumn {
                output_name: "actual_kg",
                source_column: "actual_kg",
                kind: AggregationKind::Sum,
            }],
            shift_split: false,
        };
        let rows = vec![
            row(date(2024, 1, 1), None, &[Some(MAX)]),
            row(date(2024, 1, 2), None, &[Some(MAX)]),
            row(date(2024, 2, 1), None, &[Some("5")]),
        ];
        let result = aggregate_rows(&rows, &["actual_kg"], &spec, BucketingStrategy::Monthly);
        assert_eq!(result.buckets[0].metric("actual_kg"), None);
        assert_eq!(result.buckets[1].metric("actual_kg"), Some(Decimal::from(5)));
    }

    #[test]
    fn test_overflowing_summary_total_is_an_error() {
        let summary = catalog::summary("yarn-realisation").unwrap();
        let rows = vec![
            row(date(2024, 1, 1), None, &[Some(MAX)]),
            row(date(2024, 1, 2), None, &[Some(MAX)]),
        ];
        let err = summarize_rows(&rows, &["cotton_issued_kg"], summary).unwrap_err();
        assert!(matches!(err, ReportError::Overflow(ref name) if name == "cotton_issued_kg"));
    }
}
