//! Allow-listed metric tables and the reports built on them
//!
//! Table and column names are the only identifiers ever spliced into SQL
//! text, and they always come from here.

use super::error::{ReportError, ReportResult};
use super::filter::QuarterCalendar;

#[derive(Debug)]
pub struct MetricTable {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl MetricTable {
    pub fn column(&self, name: &str) -> ReportResult<&'static str> {
        self.columns
            .iter()
            .copied()
            .find(|column| *column == name)
            .ok_or_else(|| {
                ReportError::validation(format!(
                    "unknown column '{name}' for table '{}'",
                    self.name
                ))
            })
    }
}

pub const YARN_REALISATION: MetricTable = MetricTable {
    name: "yarn_realisation",
    columns: &[
        "cotton_issued_kg",
        "yarn_produced_kg",
        "blowroom_waste",
        "filter_waste",
        "roving_waste",
        "other_waste",
        "realisation_pct",
    ],
};

pub const RING_FRAME_UTILISATION: MetricTable = MetricTable {
    name: "ring_frame_utilisation",
    columns: &[
        "allocated_spindle_hours",
        "running_spindle_hours",
        "downtime_doffing",
        "downtime_maintenance",
        "downtime_power",
        "downtime_labour",
        "downtime_other",
        "utilisation_pct",
    ],
};

pub const PRODUCTION_EFFICIENCY: MetricTable = MetricTable {
    name: "production_efficiency",
    columns: &["target_kg", "actual_kg", "efficiency_pct"],
};

pub const UNIT_PER_KG: MetricTable = MetricTable {
    name: "unit_per_kg",
    columns: &["units_consumed", "production_kg", "ukg"],
};

pub const METRIC_TABLES: &[&MetricTable] = &[
    &YARN_REALISATION,
    &RING_FRAME_UTILISATION,
    &PRODUCTION_EFFICIENCY,
    &UNIT_PER_KG,
];

/// Look up an allow-listed table by name
pub fn table(name: &str) -> ReportResult<&'static MetricTable> {
    METRIC_TABLES
        .iter()
        .copied()
        .find(|table| table.name == name)
        .ok_or_else(|| ReportError::validation(format!("unknown table '{name}'")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Sum,
    Average,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricColumn {
    pub output_name: &'static str,
    pub source_column: &'static str,
    pub kind: AggregationKind,
}

const fn sum(output_name: &'static str, source_column: &'static str) -> MetricColumn {
    MetricColumn {
        output_name,
        source_column,
        kind: AggregationKind::Sum,
    }
}

const fn average(output_name: &'static str, source_column: &'static str) -> MetricColumn {
    MetricColumn {
        output_name,
        source_column,
        kind: AggregationKind::Average,
    }
}

/// Which columns to aggregate and whether to split by shift
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub metrics: &'static [MetricColumn],
    pub shift_split: bool,
}

/// A chart-style report: one row per time bucket
#[derive(Debug)]
pub struct ReportDefinition {
    pub slug: &'static str,
    pub title: &'static str,
    pub table: &'static MetricTable,
    pub spec: MetricSpec,
    pub quarters: QuarterCalendar,
}

pub const REPORTS: &[ReportDefinition] = &[
    ReportDefinition {
        slug: "yarn-realisation",
        title: "yarn realisation",
        table: &YARN_REALISATION,
        spec: MetricSpec {
            metrics: &[
                average("realisation", "realisation_pct"),
                sum("cotton_issued_kg", "cotton_issued_kg"),
                sum("yarn_produced_kg", "yarn_produced_kg"),
            ],
            shift_split: false,
        },
        quarters: QuarterCalendar::Fiscal,
    },
    ReportDefinition {
        slug: "waste-breakdown",
        title: "waste breakdown",
        table: &YARN_REALISATION,
        spec: MetricSpec {
            metrics: &[
                sum("blowroom_waste", "blowroom_waste"),
                sum("filter_waste", "filter_waste"),
                sum("roving_waste", "roving_waste"),
                sum("other_waste", "other_waste"),
            ],
            shift_split: false,
        },
        quarters: QuarterCalendar::Fiscal,
    },
    ReportDefinition {
        slug: "ring-frame-utilisation",
        title: "ring frame utilisation",
        table: &RING_FRAME_UTILISATION,
        spec: MetricSpec {
            metrics: &[
                average("utilisation", "utilisation_pct"),
                sum("running_spindle_hours", "running_spindle_hours"),
            ],
            shift_split: false,
        },
        quarters: QuarterCalendar::Fiscal,
    },
    ReportDefinition {
        slug: "production-efficiency",
        title: "production efficiency",
        table: &PRODUCTION_EFFICIENCY,
        spec: MetricSpec {
            metrics: &[
                average("efficiency", "efficiency_pct"),
                sum("actual_kg", "actual_kg"),
            ],
            shift_split: true,
        },
        // This dashboard has always used January-start quarters.
        quarters: QuarterCalendar::Calendar,
    },
    ReportDefinition {
        slug: "unit-per-kg",
        title: "unit per kg",
        table: &UNIT_PER_KG,
        spec: MetricSpec {
            metrics: &[
                average("ukg", "ukg"),
                sum("units_consumed", "units_consumed"),
                sum("production_kg", "production_kg"),
            ],
            shift_split: false,
        },
        quarters: QuarterCalendar::Fiscal,
    },
];

pub fn report(slug: &str) -> ReportResult<&'static ReportDefinition> {
    REPORTS
        .iter()
        .find(|report| report.slug == slug)
        .ok_or_else(|| ReportError::UnknownReport(slug.to_string()))
}

/// Sum of several component columns, reported under its own name
#[derive(Debug)]
pub struct DerivedTotal {
    pub name: &'static str,
    pub parts: &'static [&'static str],
}

/// A summary-style report: totals plus percentages of a base column
#[derive(Debug)]
pub struct SummaryDefinition {
    pub slug: &'static str,
    pub title: &'static str,
    pub table: &'static MetricTable,
    pub base: &'static str,
    pub components: &'static [&'static str],
    pub derived: Option<DerivedTotal>,
    pub quarters: QuarterCalendar,
}

pub const SUMMARIES: &[SummaryDefinition] = &[
    SummaryDefinition {
        slug: "yarn-realisation",
        title: "yarn realisation summary",
        table: &YARN_REALISATION,
        base: "cotton_issued_kg",
        components: &[
            "yarn_produced_kg",
            "blowroom_waste",
            "filter_waste",
            "roving_waste",
            "other_waste",
        ],
        derived: Some(DerivedTotal {
            name: "waste_output",
            parts: &["blowroom_waste", "filter_waste", "roving_waste", "other_waste"],
        }),
        quarters: QuarterCalendar::Fiscal,
    },
    SummaryDefinition {
        slug: "ring-frame-utilisation",
        title: "ring frame utilisation summary",
        table: &RING_FRAME_UTILISATION,
        base: "allocated_spindle_hours",
        components: &[
            "running_spindle_hours",
            "downtime_doffing",
            "downtime_maintenance",
            "downtime_power",
            "downtime_labour",
            "downtime_other",
        ],
        derived: Some(DerivedTotal {
            name: "total_downtime",
            parts: &[
                "downtime_doffing",
                "downtime_maintenance",
                "downtime_power",
                "downtime_labour",
                "downtime_other",
            ],
        }),
        quarters: QuarterCalendar::Fiscal,
    },
];

pub fn summary(slug: &str) -> ReportResult<&'static SummaryDefinition> {
    SUMMARIES
        .iter()
        .find(|summary| summary.slug == slug)
        .ok_or_else(|| ReportError::UnknownReport(slug.to_string()))
}
