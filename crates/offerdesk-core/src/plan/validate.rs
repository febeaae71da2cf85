//! Structural validation of untrusted plan documents.
//!
//! Model output arrives as arbitrary JSON. Each reader below either yields a
//! typed value or records an [`Issue`] at the offending path and yields
//! `None`; validation keeps going so that one pass reports every problem.
//! Unknown keys are ignored, `null` is never accepted in place of a value.

use std::{ops::RangeInclusive, str::FromStr};

use serde_json::{Map, Value};

use super::{
    legacy::{Plan, PlanChart, PlanFilters, PlanTime},
    universal::{
        ChartSpec, Condition, GroupKey, Metric, MetricOp, PlanKind, SortDirection, SortKey,
        TimeBucket, TimeRange, UniversalPlan, DEFAULT_TIME_FIELD, MAX_PLAN_LIMIT,
    },
    Intent,
};
use crate::{
    error::{DeskError, Issue, PlanValidationError, Result},
    time_window::{parse_instant, resolve_zone, CIVIL_TIMEZONE},
};

/// Years the calendar arithmetic supports (the following year must exist).
pub const YEAR_RANGE: RangeInclusive<i64> = 1..=9998;

const MONTH_RANGE: RangeInclusive<i64> = 1..=12;
const LIMIT_RANGE: RangeInclusive<i64> = 1..=MAX_PLAN_LIMIT as i64;

/// Parses model text into a [`UniversalPlan`], mapping both JSON and grammar
/// failures to [`DeskError::UpstreamPlanInvalid`] with the raw text attached.
pub fn parse_universal(raw: &str) -> Result<UniversalPlan> {
    let value = parse_json(raw)?;
    validate_universal(&value)
        .map_err(|e| DeskError::upstream(raw, "Plan JSON invalid", e.issues))
}

/// Parses model text into an intent [`Plan`].
pub fn parse_legacy(raw: &str) -> Result<Plan> {
    let value = parse_json(raw)?;
    validate_legacy(&value)
        .map_err(|e| DeskError::upstream(raw, "Model did not return a valid plan", e.issues))
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        DeskError::upstream(
            raw,
            "Plan JSON invalid",
            vec![Issue::new("", format!("not valid JSON: {e}"))],
        )
    })
}

/// Checks a parsed JSON value against the general plan grammar and applies
/// its defaults.
pub fn validate_universal(
    value: &Value,
) -> std::result::Result<UniversalPlan, PlanValidationError> {
    let mut v = Validator::default();
    let Some(obj) = v.object(value, "") else {
        return Err(v.into_error());
    };

    let kind = match obj.get("kind") {
        Some(kind) => v.enumeration::<PlanKind>(kind, "kind"),
        None => Some(PlanKind::default()),
    };
    let filters = v.list(obj.get("filters"), "filters", |v, item, path| {
        v.condition(item, path)
    });
    let time_range = obj
        .get("timeRange")
        .and_then(|value| v.time_range(value, "timeRange"));
    let group_by = v.list(obj.get("groupBy"), "groupBy", |v, item, path| {
        v.group_key(item, path)
    });
    let metrics = v.list(obj.get("metrics"), "metrics", |v, item, path| {
        v.metric(item, path)
    });
    let sort = v.list(obj.get("sort"), "sort", |v, item, path| v.sort_key(item, path));
    let limit = obj
        .get("limit")
        .and_then(|value| v.integer(value, "limit", Some(LIMIT_RANGE)))
        .map(|n| n as u32);
    let projection = obj
        .get("projection")
        .and_then(|value| v.string_list(value, "projection"));
    let chart = obj.get("chart").and_then(|value| v.chart(value, "chart"));
    let answer_template = obj
        .get("answerTemplate")
        .and_then(|value| v.string(value, "answerTemplate"));

    let plan = UniversalPlan {
        kind: kind.unwrap_or_default(),
        filters,
        time_range,
        group_by,
        metrics,
        sort,
        limit,
        projection,
        chart,
        answer_template,
    };
    v.finish(plan)
}

/// Checks a parsed JSON value against the intent plan grammar.
pub fn validate_legacy(value: &Value) -> std::result::Result<Plan, PlanValidationError> {
    let mut v = Validator::default();
    let Some(obj) = v.object(value, "") else {
        return Err(v.into_error());
    };

    let intent = match obj.get("intent") {
        Some(intent) => v.enumeration::<Intent>(intent, "intent"),
        None => {
            v.issue("intent", "Required");
            None
        }
    };

    let time = obj.get("time").and_then(|value| {
        let obj = v.object(value, "time")?;
        Some(PlanTime {
            year: obj
                .get("year")
                .and_then(|year| v.integer(year, "time.year", Some(YEAR_RANGE)))
                .map(|n| n as i16),
            month: obj
                .get("month")
                .and_then(|month| v.integer(month, "time.month", Some(MONTH_RANGE)))
                .map(|n| n as u8),
        })
    });

    let filters = obj.get("filters").and_then(|value| {
        let obj = v.object(value, "filters")?;
        Some(PlanFilters {
            company: obj
                .get("company")
                .and_then(|s| v.string(s, "filters.company")),
            location: obj
                .get("location")
                .and_then(|s| v.string(s, "filters.location")),
        })
    });

    let chart = obj.get("chart").and_then(|value| {
        let obj = v.object(value, "chart")?;
        Some(PlanChart {
            kind: obj.get("kind").and_then(|k| v.enumeration(k, "chart.kind")),
            x_key: obj.get("xKey").and_then(|s| v.string(s, "chart.xKey")),
            y_keys: obj
                .get("yKeys")
                .and_then(|list| v.string_list(list, "chart.yKeys")),
        })
    });

    match intent {
        Some(intent) => v.finish(Plan {
            intent,
            time,
            filters,
            chart,
        }),
        None => Err(v.into_error()),
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{path}[{i}]")
}

/// Name of a JSON value's type for error messages.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integral JSON number, accepting `2025.0` the way JSON producers emit it.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

#[derive(Default)]
struct Validator {
    issues: Vec<Issue>,
}

impl Validator {
    fn issue(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue::new(path, message));
    }

    fn mismatch(&mut self, path: &str, expected: &str, value: &Value) {
        self.issue(
            path,
            format!("Expected {expected}, received {}", type_name(value)),
        );
    }

    fn into_error(self) -> PlanValidationError {
        PlanValidationError {
            issues: self.issues,
        }
    }

    fn finish<T>(self, value: T) -> std::result::Result<T, PlanValidationError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(self.into_error())
        }
    }

    fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        match value {
            Value::Object(obj) => Some(obj),
            other => {
                self.mismatch(path, "object", other);
                None
            }
        }
    }

    fn string(&mut self, value: &Value, path: &str) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            other => {
                self.mismatch(path, "string", other);
                None
            }
        }
    }

    fn integer(
        &mut self,
        value: &Value,
        path: &str,
        range: Option<RangeInclusive<i64>>,
    ) -> Option<i64> {
        let Some(n) = as_integer(value) else {
            if value.is_number() {
                self.issue(path, "Expected integer, received float");
            } else {
                self.mismatch(path, "number", value);
            }
            return None;
        };
        match range {
            Some(range) if !range.contains(&n) => {
                self.issue(
                    path,
                    format!(
                        "Number must be between {} and {}",
                        range.start(),
                        range.end()
                    ),
                );
                None
            }
            _ => Some(n),
        }
    }

    fn enumeration<T>(&mut self, value: &Value, path: &str) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let text = self.string(value, path)?;
        match text.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.issue(path, message);
                None
            }
        }
    }

    fn string_list(&mut self, value: &Value, path: &str) -> Option<Vec<String>> {
        let Value::Array(items) = value else {
            self.mismatch(path, "array", value);
            return None;
        };
        let before = self.issues.len();
        let strings: Vec<String> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.string(item, &index(path, i)))
            .collect();
        (self.issues.len() == before).then_some(strings)
    }

    /// Reads an optional array, validating each item with `read`.
    fn list<T>(
        &mut self,
        value: Option<&Value>,
        path: &str,
        mut read: impl FnMut(&mut Self, &Value, &str) -> Option<T>,
    ) -> Vec<T> {
        match value {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| read(self, item, &index(path, i)))
                .collect(),
            Some(other) => {
                self.mismatch(path, "array", other);
                Vec::new()
            }
        }
    }

    fn condition(&mut self, value: &Value, path: &str) -> Option<Condition> {
        let obj = self.object(value, path)?;
        let field = match obj.get("field") {
            Some(field) => self.string(field, &child(path, "field")),
            None => {
                self.issue(child(path, "field"), "Required");
                None
            }
        };
        let op = match obj.get("op") {
            Some(op) => self.enumeration(op, &child(path, "op")),
            None => {
                self.issue(child(path, "op"), "Required");
                None
            }
        };
        Some(Condition {
            field: field?,
            op: op?,
            value: obj.get("value").cloned(),
            start: obj.get("start").cloned(),
            end: obj.get("end").cloned(),
        })
    }

    fn time_range(&mut self, value: &Value, path: &str) -> Option<TimeRange> {
        let obj = self.object(value, path)?;
        let before = self.issues.len();

        let field = obj
            .get("field")
            .and_then(|f| self.string(f, &child(path, "field")))
            .unwrap_or_else(|| DEFAULT_TIME_FIELD.to_string());
        let year = obj
            .get("year")
            .and_then(|y| self.integer(y, &child(path, "year"), Some(YEAR_RANGE)))
            .map(|n| n as i16);
        let month = obj
            .get("month")
            .and_then(|m| self.integer(m, &child(path, "month"), Some(MONTH_RANGE)))
            .map(|n| n as u8);
        let start = obj
            .get("start")
            .and_then(|s| self.instant_text(s, &child(path, "start")));
        let end = obj
            .get("end")
            .and_then(|s| self.instant_text(s, &child(path, "end")));
        let timezone = obj
            .get("timezone")
            .and_then(|tz| self.string(tz, &child(path, "timezone")))
            .unwrap_or_else(|| CIVIL_TIMEZONE.to_string());
        if resolve_zone(&timezone).is_err() {
            self.issue(
                child(path, "timezone"),
                format!("Unknown time zone '{timezone}'"),
            );
        }

        (self.issues.len() == before).then_some(TimeRange {
            field,
            year,
            month,
            start,
            end,
            timezone,
        })
    }

    /// A date string that must parse, so the compiler never sees garbage.
    fn instant_text(&mut self, value: &Value, path: &str) -> Option<String> {
        let text = self.string(value, path)?;
        match parse_instant(&text) {
            Ok(_) => Some(text),
            Err(_) => {
                self.issue(path, format!("Invalid date '{text}'"));
                None
            }
        }
    }

    fn group_key(&mut self, value: &Value, path: &str) -> Option<GroupKey> {
        match value {
            Value::String(field) => Some(GroupKey::Field(field.clone())),
            Value::Object(obj) => {
                let bucket_path = child(path, "timeBucket");
                let Some(bucket) = obj.get("timeBucket") else {
                    self.issue(bucket_path, "Required");
                    return None;
                };
                let bucket = self.object(bucket, &bucket_path)?;
                let field = match bucket.get("field") {
                    Some(field) => self.string(field, &child(&bucket_path, "field")),
                    None => {
                        self.issue(child(&bucket_path, "field"), "Required");
                        None
                    }
                };
                let unit = match bucket.get("unit") {
                    Some(unit) => self.enumeration(unit, &child(&bucket_path, "unit")),
                    None => {
                        self.issue(child(&bucket_path, "unit"), "Required");
                        None
                    }
                };
                Some(GroupKey::TimeBucket(TimeBucket {
                    field: field?,
                    unit: unit?,
                }))
            }
            other => {
                self.mismatch(path, "string or time bucket", other);
                None
            }
        }
    }

    fn metric(&mut self, value: &Value, path: &str) -> Option<Metric> {
        let obj = self.object(value, path)?;
        let op = match obj.get("op") {
            Some(op) => self.enumeration::<MetricOp>(op, &child(path, "op")),
            None => {
                self.issue(child(path, "op"), "Required");
                None
            }
        };
        let field = obj
            .get("field")
            .and_then(|f| self.string(f, &child(path, "field")));
        let alias = obj.get("as").and_then(|a| self.string(a, &child(path, "as")));

        let op = op?;
        if op != MetricOp::Count && field.is_none() {
            self.issue(
                child(path, "field"),
                format!("Required for metric op '{op}'"),
            );
            return None;
        }
        Some(Metric { op, field, alias })
    }

    fn sort_key(&mut self, value: &Value, path: &str) -> Option<SortKey> {
        let obj = self.object(value, path)?;
        let by = match obj.get("by") {
            Some(by) => self.string(by, &child(path, "by")),
            None => {
                self.issue(child(path, "by"), "Required");
                None
            }
        };
        let dir = match obj.get("dir") {
            Some(dir) => self.enumeration(dir, &child(path, "dir")),
            None => Some(SortDirection::default()),
        };
        Some(SortKey { by: by?, dir: dir? })
    }

    fn chart(&mut self, value: &Value, path: &str) -> Option<ChartSpec> {
        let obj = self.object(value, path)?;
        Some(ChartSpec {
            kind: obj
                .get("kind")
                .and_then(|k| self.enumeration(k, &child(path, "kind"))),
            x: obj.get("x").and_then(|x| self.string(x, &child(path, "x"))),
            y: obj
                .get("y")
                .and_then(|y| self.string_list(y, &child(path, "y"))),
        })
    }
}
