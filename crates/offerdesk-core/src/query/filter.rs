//! Match filters: the conjunction of per-field predicates a count, a find
//! or a `$match` stage applies.

use jiff::Timestamp;
use serde_json::{json, Map, Value};

use crate::{
    error::{DeskError, Result},
    plan::{Condition, FilterOp, Plan, UniversalPlan, DEFAULT_TIME_FIELD},
    time_window::{month_range, parse_instant, year_range, TimeWindow},
};

/// Operators that run code inside the store. Rejected wherever they appear.
pub const FORBIDDEN_OPERATORS: &[&str] = &["$function", "$where", "$accumulator"];

/// A comparison operand: plain JSON from the plan, or a resolved instant.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Json(Value),
    Instant(Timestamp),
}

impl Operand {
    pub fn to_document(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Instant(instant) => json!({ "$date": instant.to_string() }),
        }
    }

    fn from_document(value: &Value) -> Result<Self> {
        if let Some(text) = value
            .as_object()
            .filter(|obj| obj.len() == 1)
            .and_then(|obj| obj.get("$date"))
            .and_then(Value::as_str)
        {
            return Ok(Self::Instant(parse_instant(text)?));
        }
        Ok(Self::Json(value.clone()))
    }
}

/// Case-insensitive substring pattern, stored as a regular expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub source: String,
    pub case_insensitive: bool,
}

impl Pattern {
    /// Matches `needle` literally anywhere, ignoring case.
    pub fn contains(needle: &str) -> Self {
        Self {
            source: regex::escape(needle),
            case_insensitive: true,
        }
    }
}

/// Operator predicates on one field. Range bounds from several conditions
/// accumulate here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operators {
    pub ne: Option<Operand>,
    pub gt: Option<Operand>,
    pub gte: Option<Operand>,
    pub lt: Option<Operand>,
    pub lte: Option<Operand>,
    pub in_list: Option<Vec<Value>>,
    pub regex: Option<Pattern>,
}

impl Operators {
    /// Half-open range over a window.
    pub fn window(window: TimeWindow) -> Self {
        Self {
            gte: Some(Operand::Instant(window.start)),
            lt: Some(Operand::Instant(window.end)),
            ..Default::default()
        }
    }

    /// Present and non-null.
    pub fn not_null() -> Self {
        Self {
            ne: Some(Operand::Json(Value::Null)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn to_document(&self) -> Value {
        let mut map = Map::new();
        let bounds = [
            ("$ne", &self.ne),
            ("$gt", &self.gt),
            ("$gte", &self.gte),
            ("$lt", &self.lt),
            ("$lte", &self.lte),
        ];
        for (name, operand) in bounds {
            if let Some(operand) = operand {
                map.insert(name.to_string(), operand.to_document());
            }
        }
        if let Some(list) = &self.in_list {
            map.insert("$in".to_string(), Value::Array(list.clone()));
        }
        if let Some(pattern) = &self.regex {
            map.insert("$regex".to_string(), Value::String(pattern.source.clone()));
            if pattern.case_insensitive {
                map.insert("$options".to_string(), json!("i"));
            }
        }
        Value::Object(map)
    }

    fn from_document(field: &str, obj: &Map<String, Value>) -> Result<Self> {
        let mut ops = Self::default();
        let mut options = None;
        for (name, value) in obj {
            match name.as_str() {
                "$ne" => ops.ne = Some(Operand::from_document(value)?),
                "$gt" => ops.gt = Some(Operand::from_document(value)?),
                "$gte" => ops.gte = Some(Operand::from_document(value)?),
                "$lt" => ops.lt = Some(Operand::from_document(value)?),
                "$lte" => ops.lte = Some(Operand::from_document(value)?),
                "$eq" => return Err(unsupported(field, "$eq; use a plain value")),
                "$in" => match value {
                    Value::Array(list) => ops.in_list = Some(list.clone()),
                    _ => return Err(unsupported(field, "$in without an array")),
                },
                "$regex" => match value {
                    Value::String(source) => {
                        ops.regex = Some(Pattern {
                            source: source.clone(),
                            case_insensitive: false,
                        })
                    }
                    _ => return Err(unsupported(field, "$regex without a string")),
                },
                "$options" => options = value.as_str().map(str::to_string),
                other => return Err(unsupported(field, other)),
            }
        }
        if let (Some(pattern), Some(options)) = (ops.regex.as_mut(), options) {
            pattern.case_insensitive = options.contains('i');
        }
        Ok(ops)
    }
}

/// Predicate on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(Operand),
    Operators(Operators),
}

impl Predicate {
    pub fn to_document(&self) -> Value {
        match self {
            Self::Equals(operand) => operand.to_document(),
            Self::Operators(ops) => ops.to_document(),
        }
    }
}

/// Field predicates in insertion order, conjoined.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    entries: Vec<(String, Predicate)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.entries.iter().map(|(field, pred)| (field.as_str(), pred))
    }

    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, pred)| pred)
    }

    /// Replaces the predicate on `field`, keeping its original position.
    pub fn set(&mut self, field: &str, predicate: Predicate) {
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some(entry) => entry.1 = predicate,
            None => self.entries.push((field.to_string(), predicate)),
        }
    }

    /// Updates the operator set on `field`, starting from an empty one if
    /// the field has none. An equality predicate is discarded.
    pub fn merge_operators(&mut self, field: &str, update: impl FnOnce(&mut Operators)) {
        let mut ops = match self.get(field) {
            Some(Predicate::Operators(ops)) => ops.clone(),
            _ => Operators::default(),
        };
        update(&mut ops);
        self.set(field, Predicate::Operators(ops));
    }

    /// Store-native match document.
    pub fn to_document(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(field, pred)| (field.clone(), pred.to_document()))
            .collect();
        Value::Object(map)
    }

    /// Parses a match document. Only the operator vocabulary the compiler
    /// emits is understood.
    pub fn from_document(value: &Value) -> Result<Self> {
        let Value::Object(obj) = value else {
            return Err(DeskError::invalid_input("$match").with_reason("expected an object"));
        };
        let mut filter = Self::new();
        for (field, value) in obj {
            if field.starts_with('$') {
                if FORBIDDEN_OPERATORS.contains(&field.as_str()) {
                    return Err(DeskError::UnsafePipeline {
                        stage: field.clone(),
                    });
                }
                return Err(unsupported("$match", field));
            }
            let predicate = match value {
                Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => {
                    match Operand::from_document(value)? {
                        Operand::Instant(instant) => Predicate::Equals(Operand::Instant(instant)),
                        Operand::Json(_) => {
                            Predicate::Operators(Operators::from_document(field, ops)?)
                        }
                    }
                }
                other => Predicate::Equals(Operand::Json(other.clone())),
            };
            filter.set(field, predicate);
        }
        Ok(filter)
    }
}

fn unsupported(field: &str, operator: &str) -> DeskError {
    DeskError::invalid_input(field).with_reason(format!("unsupported operator {operator}"))
}

fn operand(condition: &Condition) -> Operand {
    Operand::Json(condition.value.clone().unwrap_or(Value::Null))
}

fn apply_condition(filter: &mut Filter, condition: &Condition) {
    let field = condition.field.as_str();
    match condition.op {
        FilterOp::Eq => filter.set(field, Predicate::Equals(operand(condition))),
        FilterOp::Ne => filter.set(
            field,
            Predicate::Operators(Operators {
                ne: Some(operand(condition)),
                ..Default::default()
            }),
        ),
        FilterOp::Gt => filter.merge_operators(field, |ops| ops.gt = Some(operand(condition))),
        FilterOp::Gte => filter.merge_operators(field, |ops| ops.gte = Some(operand(condition))),
        FilterOp::Lt => filter.merge_operators(field, |ops| ops.lt = Some(operand(condition))),
        FilterOp::Lte => filter.merge_operators(field, |ops| ops.lte = Some(operand(condition))),
        FilterOp::Contains => {
            let needle = match &condition.value {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            filter.set(
                field,
                Predicate::Operators(Operators {
                    regex: Some(Pattern::contains(&needle)),
                    ..Default::default()
                }),
            );
        }
        FilterOp::In => {
            let list = match &condition.value {
                Some(Value::Array(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                None => vec![Value::Null],
            };
            filter.set(
                field,
                Predicate::Operators(Operators {
                    in_list: Some(list),
                    ..Default::default()
                }),
            );
        }
        FilterOp::Between => {
            let bound = |value: &Option<Value>| {
                value
                    .as_ref()
                    .filter(|v| !v.is_null())
                    .map(|v| Operand::Json(v.clone()))
            };
            filter.set(
                field,
                Predicate::Operators(Operators {
                    gte: bound(&condition.start),
                    lt: bound(&condition.end),
                    ..Default::default()
                }),
            );
        }
        FilterOp::Exists => filter.set(field, Predicate::Operators(Operators::not_null())),
    }
}

/// Lowers a plan's conditions and time range into a match filter.
///
/// Range operators on one field merge into a single range; every other
/// operator replaces what the field had. The time range is installed last
/// and overrides any predicate on its field.
pub fn compile_filter(plan: &UniversalPlan) -> Result<Filter> {
    let mut filter = Filter::new();
    for condition in &plan.filters {
        apply_condition(&mut filter, condition);
    }

    if let Some(time_range) = &plan.time_range {
        let field = time_range.field.as_str();
        let range = match (time_range.year, time_range.month) {
            (Some(year), Some(month)) => Some(Operators::window(month_range(year, month)?)),
            (Some(year), None) => Some(Operators::window(year_range(year)?)),
            _ if time_range.start.is_some() || time_range.end.is_some() => {
                let bound = |text: &Option<String>| -> Result<Option<Operand>> {
                    text.as_deref()
                        .map(|t| parse_instant(t).map(Operand::Instant))
                        .transpose()
                };
                Some(Operators {
                    gte: bound(&time_range.start)?,
                    lt: bound(&time_range.end)?,
                    ..Default::default()
                })
            }
            _ => None,
        };
        if let Some(range) = range {
            filter.set(field, Predicate::Operators(range));
        }
    }
    Ok(filter)
}

/// Match filter for an intent plan: company and location substrings, and a
/// month or year window on the offer date (any offer date when neither).
pub fn build_legacy_filter(plan: &Plan) -> Result<Filter> {
    let mut filter = Filter::new();
    if let Some(filters) = &plan.filters {
        let substrings = [
            ("companyName", &filters.company),
            ("location", &filters.location),
        ];
        for (field, needle) in substrings {
            if let Some(needle) = needle.as_deref().filter(|n| !n.is_empty()) {
                filter.set(
                    field,
                    Predicate::Operators(Operators {
                        regex: Some(Pattern::contains(needle)),
                        ..Default::default()
                    }),
                );
            }
        }
    }

    let time = plan.time.unwrap_or_default();
    let range = match (time.year, time.month) {
        (Some(year), Some(month)) => Operators::window(month_range(year, month)?),
        (Some(year), None) => Operators::window(year_range(year)?),
        _ => Operators::not_null(),
    };
    filter.set(DEFAULT_TIME_FIELD, Predicate::Operators(range));
    Ok(filter)
}
