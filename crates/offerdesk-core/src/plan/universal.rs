//! The general query plan: filters, a time window, grouping, metrics,
//! ordering and presentation hints.

use std::{fmt, str::FromStr};

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;

use crate::time_window::CIVIL_TIMEZONE;

/// Field a time range applies to when the plan names none.
pub const DEFAULT_TIME_FIELD: &str = "offerDate";

/// Largest row count a plan may request.
pub const MAX_PLAN_LIMIT: u32 = 200;

/// Implements `as_str`, `Display`, `FromStr` and string serialization for a
/// fieldless enum with a fixed wire spelling per variant.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every accepted wire spelling, in declaration order.
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        "Invalid {} '{}', expected one of: {}",
                        stringify!($name),
                        other,
                        Self::NAMES.join(", ")
                    )),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

pub(crate) use wire_enum;

/// What kind of answer the plan asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanKind {
    /// A single number
    #[default]
    Count,
    /// Matching documents
    List,
    /// Grouped metrics
    Aggregate,
    /// Grouped metrics shaped for a chart
    Chart,
}

wire_enum!(PlanKind {
    Count => "count",
    List => "list",
    Aggregate => "aggregate",
    Chart => "chart",
});

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
    Between,
    Exists,
}

wire_enum!(FilterOp {
    Eq => "=",
    Ne => "!=",
    Gt => ">",
    Gte => ">=",
    Lt => "<",
    Lte => "<=",
    Contains => "contains",
    In => "in",
    Between => "between",
    Exists => "exists",
});

/// One predicate over a document field. Conditions in a plan are conjoined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
}

impl Condition {
    /// A condition with no operands (e.g. `exists`).
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
            value: None,
            start: None,
            end: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_bounds(mut self, start: Option<Value>, end: Option<Value>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// Calendar window the plan is restricted to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub timezone: String,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            field: DEFAULT_TIME_FIELD.to_string(),
            year: None,
            month: None,
            start: None,
            end: None,
            timezone: CIVIL_TIMEZONE.to_string(),
        }
    }
}

impl TimeRange {
    /// Whole calendar year on the default time field.
    pub fn for_year(year: i16) -> Self {
        Self {
            year: Some(year),
            ..Default::default()
        }
    }

    /// One calendar month on the default time field.
    pub fn for_month(year: i16, month: u8) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            ..Default::default()
        }
    }
}

/// Truncation granularity of a time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

wire_enum!(TimeUnit {
    Day => "day",
    Week => "week",
    Month => "month",
    Quarter => "quarter",
    Year => "year",
});

/// Date field truncated to a unit, used as a grouping dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    pub field: String,
    pub unit: TimeUnit,
}

/// A grouping dimension: a raw field, or a truncated date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    Field(String),
    TimeBucket(TimeBucket),
}

impl GroupKey {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn time_bucket(field: impl Into<String>, unit: TimeUnit) -> Self {
        Self::TimeBucket(TimeBucket {
            field: field.into(),
            unit,
        })
    }

    /// Name this dimension carries in aggregate output rows.
    ///
    /// Time buckets are named `<field>_<unit>` so that two buckets over the
    /// same field at different units never collide.
    pub fn output_name(&self) -> String {
        match self {
            Self::Field(name) => name.clone(),
            Self::TimeBucket(bucket) => format!("{}_{}", bucket.field, bucket.unit),
        }
    }

    /// The document field the dimension reads.
    pub fn source_field(&self) -> &str {
        match self {
            Self::Field(name) => name,
            Self::TimeBucket(bucket) => &bucket.field,
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Field(name) => serializer.serialize_str(name),
            Self::TimeBucket(bucket) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("timeBucket", bucket)?;
                map.end()
            }
        }
    }
}

/// Aggregate function of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

wire_enum!(MetricOp {
    Count => "count",
    Sum => "sum",
    Avg => "avg",
    Min => "min",
    Max => "max",
});

/// A computed value per group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub op: MetricOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Metric {
    /// Document count, published under `alias`.
    pub fn count_as(alias: impl Into<String>) -> Self {
        Self {
            op: MetricOp::Count,
            field: None,
            alias: Some(alias.into()),
        }
    }

    /// Name of the output column: the alias, else `<op>` or `<op>_<field>`.
    pub fn output_name(&self) -> String {
        match (&self.alias, &self.field) {
            (Some(alias), _) => alias.clone(),
            (None, Some(field)) => format!("{}_{}", self.op, field),
            (None, None) => self.op.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

wire_enum!(SortDirection {
    Asc => "asc",
    Desc => "desc",
});

impl SortDirection {
    /// `1` for ascending, `-1` otherwise.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub by: String,
    pub dir: SortDirection,
}

impl SortKey {
    pub fn new(by: impl Into<String>, dir: SortDirection) -> Self {
        Self { by: by.into(), dir }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

wire_enum!(ChartKind {
    Bar => "bar",
    Line => "line",
    Pie => "pie",
});

/// Presentation hint for chart plans.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChartSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChartKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<String>>,
}

/// Validated general plan. Built fresh per question and never stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalPlan {
    pub kind: PlanKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<GroupKey>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_template: Option<String>,
}

impl UniversalPlan {
    pub fn new(kind: PlanKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// True when some condition targets `field` with `op`, whatever its value.
    pub fn has_condition(&self, field: &str, op: FilterOp) -> bool {
        self.filters
            .iter()
            .any(|condition| condition.field == field && condition.op == op)
    }

    /// Output name of the first count metric, if any.
    pub fn count_metric_name(&self) -> Option<String> {
        self.metrics
            .iter()
            .find(|metric| metric.op == MetricOp::Count)
            .map(Metric::output_name)
    }

    /// Renders the plan back into its JSON wire form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
