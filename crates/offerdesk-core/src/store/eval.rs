//! In-process evaluation of filters and pipelines over JSON documents.
//!
//! Semantics follow the document-store conventions the compiler targets:
//! a missing field reads as null, range operators only compare values of
//! the same kind (numbers with numbers, strings with strings, instants with
//! instants) and sorting orders values by type before value.

use std::{
    cmp::Ordering,
    collections::HashMap,
    time::{Duration, Instant},
};

use jiff::Timestamp;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Number, Value};

use crate::{
    error::{DeskError, Result},
    plan::SortDirection,
    query::{
        Accumulator, DerivedField, Filter, GroupId, GroupStage, Operand, Operators, Pipeline,
        Predicate, Projection, Stage,
    },
    time_window::{resolve_zone, truncate},
};

/// Wall-clock budget for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
        }
    }

    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn check(&self) -> Result<()> {
        match self.at {
            Some(at) if Instant::now() >= at => {
                Err(DeskError::execution("operation exceeded time limit"))
            }
            _ => Ok(()),
        }
    }
}

/// Limits applied while running a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub deadline: Deadline,
    /// Largest input a blocking stage (group, sort) may hold in memory, or
    /// `None` when spilling to disk is allowed
    pub row_budget: Option<usize>,
}

/// Value at a dotted path, if present.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, key| value.as_object()?.get(key))
}

/// Interprets a stored value as an instant: an RFC 3339 string or a
/// `{"$date": ...}` wrapper.
fn as_instant(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(text) => text.parse().ok(),
        Value::Object(obj) if obj.len() == 1 => obj.get("$date").and_then(as_instant),
        _ => None,
    }
}

/// Ordering rank of a value's type when sorting mixed values.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 1,
        Value::Number(_) => 2,
        Value::String(text) if text.parse::<Timestamp>().is_ok() => 9,
        Value::String(_) => 3,
        Value::Object(_) => 4,
        Value::Array(_) => 5,
        Value::Bool(_) => 8,
    }
}

/// Total order used by sort, min and max.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => match (as_instant(a), as_instant(b)) {
            (Some(ta), Some(tb)) => ta.cmp(&tb),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((kl, vl), (kr, vr))| kl.cmp(kr).then_with(|| compare_values(vl, vr)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => Ordering::Equal,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (x.as_i64(), y.as_i64()) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => {
            let a = x.as_f64().unwrap_or(f64::NAN);
            let b = y.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

/// Ordering of a stored value against an operand, when both are the same
/// kind of value.
fn compare_operand(value: &Value, operand: &Operand) -> Option<Ordering> {
    match operand {
        Operand::Instant(instant) => as_instant(value).map(|t| t.cmp(instant)),
        Operand::Json(Value::Number(n)) => match value {
            Value::Number(v) => Some(compare_numbers(v, n)),
            _ => None,
        },
        Operand::Json(Value::String(s)) => match value {
            Value::String(v) => Some(match (as_instant(value), s.parse::<Timestamp>().ok()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => v.as_str().cmp(s.as_str()),
            }),
            _ => None,
        },
        Operand::Json(Value::Bool(b)) => value.as_bool().map(|v| v.cmp(b)),
        Operand::Json(_) => None,
    }
}

fn values_equal(value: &Value, operand: &Operand) -> bool {
    match operand {
        Operand::Instant(instant) => as_instant(value) == Some(*instant),
        Operand::Json(Value::Number(n)) => {
            matches!(value, Value::Number(v) if compare_numbers(v, n) == Ordering::Equal)
        }
        Operand::Json(expected) => value == expected,
    }
}

/// Equality with array fan-out: an array field matches if any element does.
fn field_equals(value: Option<&Value>, operand: &Operand) -> bool {
    match value {
        None => matches!(operand, Operand::Json(Value::Null)),
        Some(Value::Array(items)) if !matches!(operand, Operand::Json(Value::Array(_))) => {
            items.iter().any(|item| values_equal(item, operand))
        }
        Some(value) => values_equal(value, operand),
    }
}

struct CompiledOperators {
    ops: Operators,
    regex: Option<Regex>,
}

enum CompiledPredicate {
    Equals(Operand),
    Operators(Box<CompiledOperators>),
}

/// A filter with its regular expressions compiled once.
pub struct Matcher {
    predicates: Vec<(String, CompiledPredicate)>,
}

impl Matcher {
    pub fn new(filter: &Filter) -> Result<Self> {
        let predicates = filter
            .iter()
            .map(|(field, predicate)| {
                let compiled = match predicate {
                    Predicate::Equals(operand) => CompiledPredicate::Equals(operand.clone()),
                    Predicate::Operators(ops) => {
                        let regex = ops
                            .regex
                            .as_ref()
                            .map(|pattern| {
                                RegexBuilder::new(&pattern.source)
                                    .case_insensitive(pattern.case_insensitive)
                                    .build()
                                    .map_err(|e| {
                                        DeskError::invalid_input(field)
                                            .with_reason(format!("invalid pattern: {e}"))
                                    })
                            })
                            .transpose()?;
                        CompiledPredicate::Operators(Box::new(CompiledOperators {
                            ops: ops.clone(),
                            regex,
                        }))
                    }
                };
                Ok((field.to_string(), compiled))
            })
            .collect::<Result<_>>()?;
        Ok(Self { predicates })
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.predicates.iter().all(|(field, predicate)| {
            let value = lookup(document, field);
            match predicate {
                CompiledPredicate::Equals(operand) => field_equals(value, operand),
                CompiledPredicate::Operators(compiled) => operators_match(value, compiled),
            }
        })
    }
}

fn operators_match(value: Option<&Value>, compiled: &CompiledOperators) -> bool {
    let ops = &compiled.ops;
    if let Some(operand) = &ops.ne {
        if field_equals(value, operand) {
            return false;
        }
    }
    let ranges = [
        (&ops.gt, [Ordering::Greater].as_slice()),
        (&ops.gte, [Ordering::Greater, Ordering::Equal].as_slice()),
        (&ops.lt, [Ordering::Less].as_slice()),
        (&ops.lte, [Ordering::Less, Ordering::Equal].as_slice()),
    ];
    for (operand, accepted) in ranges {
        if let Some(operand) = operand {
            let ordering = value.and_then(|v| compare_operand(v, operand));
            if !ordering.is_some_and(|o| accepted.contains(&o)) {
                return false;
            }
        }
    }
    if let Some(list) = &ops.in_list {
        let hit = list
            .iter()
            .any(|item| field_equals(value, &Operand::Json(item.clone())));
        if !hit {
            return false;
        }
    }
    if let Some(regex) = &compiled.regex {
        let hit = match value {
            Some(Value::String(text)) => regex.is_match(text),
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| item.as_str().is_some_and(|t| regex.is_match(t))),
            _ => false,
        };
        if !hit {
            return false;
        }
    }
    true
}

/// Applies a filter to documents.
pub fn filter_documents(
    documents: Vec<Value>,
    filter: &Filter,
    deadline: &Deadline,
) -> Result<Vec<Value>> {
    let matcher = Matcher::new(filter)?;
    let mut kept = Vec::new();
    for document in documents {
        deadline.check()?;
        if matcher.matches(&document) {
            kept.push(document);
        }
    }
    Ok(kept)
}

/// Stable sort by the given keys; missing fields sort as null.
pub fn sort_documents(documents: &mut [Value], keys: &[(String, SortDirection)]) {
    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(path, dir)| {
                let left = lookup(a, path).unwrap_or(&Value::Null);
                let right = lookup(b, path).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                match dir {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Inclusion projection of top-level fields; `_id` is kept.
pub fn project_fields(document: &Value, fields: &[String]) -> Value {
    let mut out = Map::new();
    if let Some(id) = lookup(document, "_id") {
        out.insert("_id".to_string(), id.clone());
    }
    for field in fields {
        if let Some(value) = lookup(document, field) {
            out.insert(field.clone(), value.clone());
        }
    }
    Value::Object(out)
}

/// Runs a pipeline over `documents`.
pub fn run_pipeline(
    mut documents: Vec<Value>,
    pipeline: &Pipeline,
    limits: &Limits,
) -> Result<Vec<Value>> {
    for stage in &pipeline.stages {
        limits.deadline.check()?;
        documents = match stage {
            Stage::Match(filter) => filter_documents(documents, filter, &limits.deadline)?,
            Stage::AddFields(fields) => add_fields(documents, fields, &limits.deadline)?,
            Stage::Group(group) => {
                check_budget(stage, documents.len(), limits)?;
                group_documents(documents, group, &limits.deadline)?
            }
            Stage::Project(fields) => documents
                .iter()
                .map(|document| project(document, fields))
                .collect(),
            Stage::Sort(keys) => {
                check_budget(stage, documents.len(), limits)?;
                sort_documents(&mut documents, keys);
                documents
            }
            Stage::Limit(n) => {
                documents.truncate(*n as usize);
                documents
            }
            Stage::Out(_) | Stage::Merge(_) => {
                return Err(DeskError::execution(format!(
                    "{} is not permitted on a read-only store",
                    stage.operator()
                )));
            }
        };
    }
    Ok(documents)
}

fn check_budget(stage: &Stage, rows: usize, limits: &Limits) -> Result<()> {
    match limits.row_budget {
        Some(budget) if rows > budget => Err(DeskError::execution(format!(
            "{} exceeded the in-memory limit of {budget} documents and disk use is not allowed",
            stage.operator()
        ))),
        _ => Ok(()),
    }
}

fn add_fields(
    mut documents: Vec<Value>,
    fields: &[DerivedField],
    deadline: &Deadline,
) -> Result<Vec<Value>> {
    let zones = fields
        .iter()
        .map(|field| resolve_zone(&field.timezone))
        .collect::<Result<Vec<_>>>()?;
    for document in &mut documents {
        deadline.check()?;
        for (field, zone) in fields.iter().zip(&zones) {
            let truncated = match lookup(document, &field.source).and_then(as_instant) {
                Some(instant) => Value::String(truncate(instant, field.unit, zone)?.to_string()),
                None => Value::Null,
            };
            if let Value::Object(map) = document {
                map.insert(field.name.clone(), truncated);
            }
        }
    }
    Ok(documents)
}

enum AccumulatorState {
    Count(u64),
    Sum { total: f64, integral: Option<i64> },
    Avg { total: f64, n: u64 },
    Extreme { best: Option<Value>, want: Ordering },
}

impl AccumulatorState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Count => Self::Count(0),
            Accumulator::Sum(_) => Self::Sum {
                total: 0.0,
                integral: Some(0),
            },
            Accumulator::Avg(_) => Self::Avg { total: 0.0, n: 0 },
            Accumulator::Min(_) => Self::Extreme {
                best: None,
                want: Ordering::Less,
            },
            Accumulator::Max(_) => Self::Extreme {
                best: None,
                want: Ordering::Greater,
            },
        }
    }

    fn push(&mut self, acc: &Accumulator, document: &Value) {
        let value = match acc {
            Accumulator::Count => None,
            Accumulator::Sum(f)
            | Accumulator::Avg(f)
            | Accumulator::Min(f)
            | Accumulator::Max(f) => lookup(document, f),
        };
        match self {
            Self::Count(n) => *n += 1,
            Self::Sum { total, integral } => {
                if let Some(Value::Number(number)) = value {
                    *total += number.as_f64().unwrap_or(0.0);
                    *integral = match (*integral, number.as_i64()) {
                        (Some(sum), Some(add)) => sum.checked_add(add),
                        _ => None,
                    };
                }
            }
            Self::Avg { total, n } => {
                if let Some(Value::Number(number)) = value {
                    *total += number.as_f64().unwrap_or(0.0);
                    *n += 1;
                }
            }
            Self::Extreme { best, want } => {
                if let Some(value) = value.filter(|v| !v.is_null()) {
                    let replace = best
                        .as_ref()
                        .map_or(true, |current| compare_values(value, current) == *want);
                    if replace {
                        *best = Some(value.clone());
                    }
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Count(n) => Value::from(n),
            Self::Sum {
                integral: Some(sum),
                ..
            } => Value::from(sum),
            Self::Sum { total, .. } => Value::from(total),
            Self::Avg { n: 0, .. } => Value::Null,
            Self::Avg { total, n } => Value::from(total / n as f64),
            Self::Extreme { best, .. } => best.unwrap_or(Value::Null),
        }
    }
}

fn group_key(document: &Value, id: &GroupId) -> Value {
    let read = |path: &str| lookup(document, path).cloned().unwrap_or(Value::Null);
    match id {
        GroupId::Null => Value::Null,
        GroupId::Path(path) => read(path),
        GroupId::Fields(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, path)| (name.clone(), read(path)))
                .collect(),
        ),
    }
}

fn group_documents(
    documents: Vec<Value>,
    group: &GroupStage,
    deadline: &Deadline,
) -> Result<Vec<Value>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<AccumulatorState>)> = Vec::new();

    for document in &documents {
        deadline.check()?;
        let key = group_key(document, &group.id);
        let signature = serde_json::to_string(&key)?;
        let slot = *index.entry(signature).or_insert_with(|| {
            let states = group
                .accumulators
                .iter()
                .map(|(_, acc)| AccumulatorState::new(acc))
                .collect();
            groups.push((key, states));
            groups.len() - 1
        });
        for ((_, acc), state) in group.accumulators.iter().zip(&mut groups[slot].1) {
            state.push(acc, document);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = Map::new();
            out.insert("_id".to_string(), key);
            for ((name, _), state) in group.accumulators.iter().zip(states) {
                out.insert(name.clone(), state.finish());
            }
            Value::Object(out)
        })
        .collect())
}

fn project(document: &Value, fields: &[(String, Projection)]) -> Value {
    let inclusion = fields
        .iter()
        .any(|(_, p)| !matches!(p, Projection::Exclude));

    if !inclusion {
        let mut out = document.as_object().cloned().unwrap_or_default();
        for (name, _) in fields {
            out.remove(name);
        }
        return Value::Object(out);
    }

    let mut out = Map::new();
    let excludes_id = fields
        .iter()
        .any(|(name, p)| name == "_id" && matches!(p, Projection::Exclude));
    if !excludes_id {
        if let Some(id) = lookup(document, "_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }
    for (name, projection) in fields {
        let value = match projection {
            Projection::Exclude => continue,
            Projection::Include => lookup(document, name),
            Projection::Path(path) => lookup(document, path),
        };
        if let Some(value) = value {
            out.insert(name.clone(), value.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn unlimited() -> Limits {
        Limits {
            deadline: Deadline::none(),
            row_budget: None,
        }
    }

    fn docs() -> Vec<Value> {
        vec![
            json!({"_id": "a", "studentName": "Asha", "companyName": "Acme", "packageLPA": 6, "offerDate": "2025-07-01T04:30:00Z"}),
            json!({"_id": "b", "studentName": "Ravi", "companyName": "Globex", "packageLPA": 9.5, "offerDate": "2025-07-20T10:00:00Z"}),
            json!({"_id": "c", "studentName": "Meena", "companyName": "acme labs", "packageLPA": 4, "offerDate": "2025-08-02T10:00:00Z"}),
            json!({"_id": "d", "studentName": "Tom", "companyName": "Initech", "offerDate": null}),
        ]
    }

    fn run(pipeline: Value) -> Vec<Value> {
        run_pipeline(docs(), &Pipeline::parse(&pipeline).unwrap(), &unlimited()).unwrap()
    }

    #[test]
    fn test_match_operators() {
        let rows = run(json!([
            {"$match": {"companyName": {"$regex": "acme", "$options": "i"}, "packageLPA": {"$gt": 5}}}
        ]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["_id"], "a");

        let rows = run(json!([{"$match": {"offerDate": {"$ne": null}}}]));
        assert_eq!(rows.len(), 3);

        let rows = run(json!([{"$match": {"studentName": {"$in": ["Tom", "Ravi"]}}}]));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_instant_window_match() {
        let rows = run(json!([{"$match": {"offerDate": {
            "$gte": {"$date": "2025-06-30T18:30:00Z"},
            "$lt": {"$date": "2025-07-31T18:30:00Z"}
        }}}]));
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["_id"].as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_group_by_month_bucket() {
        let rows = run(json!([
            {"$match": {"offerDate": {"$ne": null}}},
            {"$addFields": {"__tb0": {"$dateTrunc": {"date": "$offerDate", "unit": "month", "timezone": "Asia/Kolkata"}}}},
            {"$group": {"_id": {"offerDate_month": "$__tb0"}, "count": {"$sum": 1}, "best": {"$max": "$packageLPA"}}},
            {"$project": {"_id": 0, "offerDate_month": "$_id.offerDate_month", "count": 1, "best": 1}},
            {"$sort": {"count": -1}}
        ]));
        assert_eq!(
            rows,
            vec![
                json!({"offerDate_month": "2025-06-30T18:30:00Z", "count": 2, "best": 9.5}),
                json!({"offerDate_month": "2025-07-31T18:30:00Z", "count": 1, "best": 4}),
            ]
        );
    }

    #[test]
    fn test_null_group_accumulators() {
        let rows = run(json!([
            {"$group": {"_id": null, "n": {"$sum": 1}, "total": {"$sum": "$packageLPA"}, "avg": {"$avg": "$packageLPA"}, "low": {"$min": "$packageLPA"}}}
        ]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["n"], 4);
        assert_eq!(rows[0]["total"], 19.5);
        assert_eq!(rows[0]["avg"], 6.5);
        assert_eq!(rows[0]["low"], 4);
    }

    #[test]
    fn test_sort_orders_missing_first_and_limit() {
        let rows = run(json!([{"$sort": {"packageLPA": 1}}, {"$limit": 2}]));
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["_id"].as_str()).collect();
        assert_eq!(ids, vec!["d", "c"]);
    }

    #[test]
    fn test_row_budget_without_disk_use() {
        let limits = Limits {
            deadline: Deadline::none(),
            row_budget: Some(2),
        };
        let pipeline = Pipeline::parse(&json!([{"$sort": {"studentName": 1}}])).unwrap();
        let err = run_pipeline(docs(), &pipeline, &limits).unwrap_err();
        assert!(err.to_string().contains("disk use is not allowed"));
    }

    #[test]
    fn test_expired_deadline_fails() {
        let limits = Limits {
            deadline: Deadline::after(Duration::ZERO),
            row_budget: None,
        };
        let pipeline = Pipeline::parse(&json!([{"$limit": 1}])).unwrap();
        let err = run_pipeline(docs(), &pipeline, &limits).unwrap_err();
        assert_eq!(err.to_string(), "operation exceeded time limit");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_write_stage_is_refused() {
        let pipeline = Pipeline::parse(&json!([{"$out": "copy"}])).unwrap();
        assert!(run_pipeline(docs(), &pipeline, &unlimited()).is_err());
    }

    #[test]
    fn test_project_fields_keeps_id() {
        let projected = project_fields(&docs()[0], &["studentName".to_string()]);
        assert_eq!(projected, json!({"_id": "a", "studentName": "Asha"}));
    }
}
