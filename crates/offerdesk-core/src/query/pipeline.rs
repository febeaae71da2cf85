//! Aggregation pipelines: a typed stage list, its compiler from a plan and
//! the read-only gate every pipeline passes before it reaches a store.

use serde_json::{json, Map, Value};

use super::filter::{compile_filter, Filter, FORBIDDEN_OPERATORS};
use crate::{
    error::{DeskError, Result},
    plan::{GroupKey, MetricOp, SortDirection, TimeUnit, UniversalPlan, MAX_PLAN_LIMIT},
    time_window::CIVIL_TIMEZONE,
};

/// Upper bound on the limit stage, whatever the plan asks for.
pub const MAX_LIMIT: u32 = MAX_PLAN_LIMIT;

/// Date field truncated to a unit, computed before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedField {
    pub name: String,
    pub source: String,
    pub unit: TimeUnit,
    pub timezone: String,
}

/// What a group is keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupId {
    /// One group over every input document
    Null,
    /// The value of one field path
    Path(String),
    /// Named sub-keys, each reading a field path
    Fields(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulator {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
}

impl Accumulator {
    fn for_metric(op: MetricOp, field: Option<&str>) -> Self {
        let field = field.unwrap_or_default().to_string();
        match op {
            MetricOp::Count => Self::Count,
            MetricOp::Sum => Self::Sum(field),
            MetricOp::Avg => Self::Avg(field),
            MetricOp::Min => Self::Min(field),
            MetricOp::Max => Self::Max(field),
        }
    }

    fn to_document(&self) -> Value {
        match self {
            Self::Count => json!({ "$sum": 1 }),
            Self::Sum(field) => json!({ "$sum": format!("${field}") }),
            Self::Avg(field) => json!({ "$avg": format!("${field}") }),
            Self::Min(field) => json!({ "$min": format!("${field}") }),
            Self::Max(field) => json!({ "$max": format!("${field}") }),
        }
    }

    fn from_document(name: &str, value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .filter(|obj| obj.len() == 1)
            .ok_or_else(|| {
                malformed("$group", format!("accumulator '{name}' must have one operator"))
            })?;
        let (op, arg) = obj
            .iter()
            .next()
            .ok_or_else(|| malformed("$group", format!("accumulator '{name}' is empty")))?;
        if op == "$sum" && arg.as_i64() == Some(1) {
            return Ok(Self::Count);
        }
        let field = field_ref(arg).ok_or_else(|| {
            malformed("$group", format!("accumulator '{name}' needs a field path"))
        })?;
        match op.as_str() {
            "$sum" => Ok(Self::Sum(field)),
            "$avg" => Ok(Self::Avg(field)),
            "$min" => Ok(Self::Min(field)),
            "$max" => Ok(Self::Max(field)),
            other => Err(malformed("$group", format!("unsupported accumulator {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStage {
    pub id: GroupId,
    pub accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include,
    Exclude,
    /// Copy the value at a field path
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    AddFields(Vec<DerivedField>),
    Group(GroupStage),
    Project(Vec<(String, Projection)>),
    Sort(Vec<(String, SortDirection)>),
    Limit(u32),
    Out(Value),
    Merge(Value),
}

impl Stage {
    /// Store-native stage operator name.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::AddFields(_) => "$addFields",
            Self::Group(_) => "$group",
            Self::Project(_) => "$project",
            Self::Sort(_) => "$sort",
            Self::Limit(_) => "$limit",
            Self::Out(_) => "$out",
            Self::Merge(_) => "$merge",
        }
    }

    /// True for stages that write to the store.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Out(_) | Self::Merge(_))
    }

    pub fn to_document(&self) -> Value {
        let body = match self {
            Self::Match(filter) => filter.to_document(),
            Self::AddFields(fields) => {
                let map: Map<String, Value> = fields
                    .iter()
                    .map(|field| {
                        let trunc = json!({
                            "$dateTrunc": {
                                "date": format!("${}", field.source),
                                "unit": field.unit.as_str(),
                                "timezone": field.timezone,
                            }
                        });
                        (field.name.clone(), trunc)
                    })
                    .collect();
                Value::Object(map)
            }
            Self::Group(group) => {
                let mut map = Map::new();
                let id = match &group.id {
                    GroupId::Null => Value::Null,
                    GroupId::Path(path) => Value::String(format!("${path}")),
                    GroupId::Fields(fields) => Value::Object(
                        fields
                            .iter()
                            .map(|(name, path)| (name.clone(), Value::String(format!("${path}"))))
                            .collect(),
                    ),
                };
                map.insert("_id".to_string(), id);
                for (name, acc) in &group.accumulators {
                    map.insert(name.clone(), acc.to_document());
                }
                Value::Object(map)
            }
            Self::Project(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, projection)| {
                        let value = match projection {
                            Projection::Include => json!(1),
                            Projection::Exclude => json!(0),
                            Projection::Path(path) => Value::String(format!("${path}")),
                        };
                        (name.clone(), value)
                    })
                    .collect(),
            ),
            Self::Sort(keys) => Value::Object(
                keys.iter()
                    .map(|(name, dir)| (name.clone(), json!(dir.sign())))
                    .collect(),
            ),
            Self::Limit(n) => json!(n),
            Self::Out(target) | Self::Merge(target) => target.clone(),
        };
        let mut stage = Map::new();
        stage.insert(self.operator().to_string(), body);
        Value::Object(stage)
    }

    /// Parses one stage document. Code-executing operators are rejected
    /// wherever they appear in the stage.
    pub fn from_document(value: &Value) -> Result<Self> {
        if let Some(operator) = find_forbidden(value) {
            return Err(DeskError::UnsafePipeline { stage: operator });
        }
        let (operator, body) = value
            .as_object()
            .filter(|obj| obj.len() == 1)
            .and_then(|obj| obj.iter().next())
            .ok_or_else(|| malformed("stage", "each stage must have exactly one operator"))?;

        match operator.as_str() {
            "$match" => Ok(Self::Match(Filter::from_document(body)?)),
            "$addFields" => parse_add_fields(body),
            "$group" => parse_group(body),
            "$project" => parse_project(body),
            "$sort" => parse_sort(body),
            "$limit" => body
                .as_u64()
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::Limit)
                .ok_or_else(|| malformed("$limit", "expected a positive integer")),
            "$out" => Ok(Self::Out(body.clone())),
            "$merge" => Ok(Self::Merge(body.clone())),
            other => Err(malformed("stage", format!("unsupported stage {other}"))),
        }
    }
}

/// An ordered stage list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Fails with [`DeskError::UnsafePipeline`] if any stage writes.
    pub fn ensure_read_only(&self) -> Result<()> {
        match self.stages.iter().find(|stage| stage.is_mutating()) {
            Some(stage) => Err(DeskError::UnsafePipeline {
                stage: stage.operator().to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(Stage::to_document).collect()
    }

    /// Parses a JSON array of stage documents.
    pub fn parse(value: &Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(malformed("pipeline", "expected an array of stages"));
        };
        let stages = items.iter().map(Stage::from_document).collect::<Result<_>>()?;
        Ok(Self { stages })
    }
}

/// Lowers a plan into an aggregation pipeline.
///
/// Stage order is fixed: match, derived time buckets, group, project,
/// sort, limit. Each stage is omitted when it would be empty.
///
/// Time buckets are truncated in the civil zone, the same zone the
/// `timeRange` window is computed in, whatever `timeRange.timezone` says.
pub fn compile_aggregation(plan: &UniversalPlan) -> Result<Pipeline> {
    let mut stages = Vec::new();

    let filter = compile_filter(plan)?;
    if !filter.is_empty() {
        stages.push(Stage::Match(filter));
    }

    if !plan.group_by.is_empty() || !plan.metrics.is_empty() {
        let mut derived = Vec::new();
        let mut keys = Vec::new();
        for (idx, key) in plan.group_by.iter().enumerate() {
            match key {
                GroupKey::Field(name) => keys.push((key.output_name(), name.clone())),
                GroupKey::TimeBucket(bucket) => {
                    let name = format!("__tb{idx}");
                    derived.push(DerivedField {
                        name: name.clone(),
                        source: bucket.field.clone(),
                        unit: bucket.unit,
                        timezone: CIVIL_TIMEZONE.to_string(),
                    });
                    keys.push((key.output_name(), name));
                }
            }
        }
        if !derived.is_empty() {
            stages.push(Stage::AddFields(derived));
        }

        let accumulators: Vec<(String, Accumulator)> = plan
            .metrics
            .iter()
            .map(|metric| {
                (
                    metric.output_name(),
                    Accumulator::for_metric(metric.op, metric.field.as_deref()),
                )
            })
            .collect();

        let mut projection = vec![("_id".to_string(), Projection::Exclude)];
        projection.extend(
            keys.iter()
                .map(|(name, _)| (name.clone(), Projection::Path(format!("_id.{name}")))),
        );
        projection.extend(
            accumulators
                .iter()
                .map(|(name, _)| (name.clone(), Projection::Include)),
        );

        let id = if keys.is_empty() {
            GroupId::Null
        } else {
            GroupId::Fields(keys)
        };
        stages.push(Stage::Group(GroupStage { id, accumulators }));
        stages.push(Stage::Project(projection));
    }

    if !plan.sort.is_empty() {
        stages.push(Stage::Sort(
            plan.sort
                .iter()
                .map(|key| (key.by.clone(), key.dir))
                .collect(),
        ));
    }

    if let Some(limit) = plan.limit.filter(|n| *n > 0) {
        stages.push(Stage::Limit(limit.min(MAX_LIMIT)));
    }

    Ok(Pipeline::new(stages))
}

fn malformed(stage: &str, reason: impl Into<String>) -> DeskError {
    DeskError::invalid_input(stage).with_reason(reason)
}

/// `"$path"` to `path`.
fn field_ref(value: &Value) -> Option<String> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix('$'))
        .filter(|s| !s.is_empty() && !s.starts_with('$'))
        .map(str::to_string)
}

fn find_forbidden(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => obj.iter().find_map(|(key, child)| {
            if FORBIDDEN_OPERATORS.contains(&key.as_str()) {
                Some(key.clone())
            } else {
                find_forbidden(child)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_forbidden),
        _ => None,
    }
}

fn parse_add_fields(body: &Value) -> Result<Stage> {
    let obj = body
        .as_object()
        .ok_or_else(|| malformed("$addFields", "expected an object"))?;
    let mut fields = Vec::new();
    for (name, spec) in obj {
        let trunc = spec
            .get("$dateTrunc")
            .ok_or_else(|| malformed("$addFields", "only $dateTrunc fields are supported"))?;
        let source = trunc
            .get("date")
            .and_then(field_ref)
            .ok_or_else(|| malformed("$addFields", "$dateTrunc needs a date field path"))?;
        let unit = trunc
            .get("unit")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("$addFields", "$dateTrunc needs a unit"))?
            .parse::<TimeUnit>()
            .map_err(|reason| malformed("$addFields", reason))?;
        let timezone = trunc
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC")
            .to_string();
        fields.push(DerivedField {
            name: name.clone(),
            source,
            unit,
            timezone,
        });
    }
    Ok(Stage::AddFields(fields))
}

fn parse_group(body: &Value) -> Result<Stage> {
    let obj = body
        .as_object()
        .ok_or_else(|| malformed("$group", "expected an object"))?;
    let id = match obj.get("_id") {
        None | Some(Value::Null) => GroupId::Null,
        Some(Value::Object(fields)) => GroupId::Fields(
            fields
                .iter()
                .map(|(name, path)| {
                    field_ref(path)
                        .map(|path| (name.clone(), path))
                        .ok_or_else(|| {
                            malformed("$group", format!("_id.{name} needs a field path"))
                        })
                })
                .collect::<Result<_>>()?,
        ),
        Some(other) => GroupId::Path(
            field_ref(other).ok_or_else(|| malformed("$group", "_id needs a field path"))?,
        ),
    };
    let accumulators = obj
        .iter()
        .filter(|(name, _)| name.as_str() != "_id")
        .map(|(name, value)| Ok((name.clone(), Accumulator::from_document(name, value)?)))
        .collect::<Result<_>>()?;
    Ok(Stage::Group(GroupStage { id, accumulators }))
}

fn parse_project(body: &Value) -> Result<Stage> {
    let obj = body
        .as_object()
        .ok_or_else(|| malformed("$project", "expected an object"))?;
    let fields = obj
        .iter()
        .map(|(name, value)| {
            let projection = match value {
                Value::Bool(true) => Projection::Include,
                Value::Bool(false) => Projection::Exclude,
                Value::Number(n) if n.as_f64() == Some(0.0) => Projection::Exclude,
                Value::Number(_) => Projection::Include,
                other => Projection::Path(field_ref(other).ok_or_else(|| {
                    malformed("$project", format!("unsupported value for '{name}'"))
                })?),
            };
            Ok((name.clone(), projection))
        })
        .collect::<Result<_>>()?;
    Ok(Stage::Project(fields))
}

fn parse_sort(body: &Value) -> Result<Stage> {
    let obj = body
        .as_object()
        .ok_or_else(|| malformed("$sort", "expected an object"))?;
    let keys = obj
        .iter()
        .map(|(name, value)| {
            let dir = match value.as_i64() {
                Some(1) => SortDirection::Asc,
                Some(-1) => SortDirection::Desc,
                _ => return Err(malformed("$sort", format!("'{name}' must be 1 or -1"))),
            };
            Ok((name.clone(), dir))
        })
        .collect::<Result<_>>()?;
    Ok(Stage::Sort(keys))
}
