//! The general plan flow.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};

use super::{require_message, summary, Assistant};
use crate::{
    error::Result,
    infer::{apply_semantic_postprocessing, looks_like_ranking_question, ranking_plan},
    models::{Answer, DebugInfo, Reply},
    oracle::{universal_instructions, StaticOracle},
    params::{Ask, Explain},
    plan::{
        parse_universal, Metric, PlanKind, SortDirection, UniversalPlan, DEFAULT_TIME_FIELD,
    },
    query::{compile_aggregation, compile_filter, Filter, Pipeline, MAX_LIMIT},
    store::FindOptions,
};

/// Fields a list answer returns when the plan names none.
pub const DEFAULT_LIST_PROJECTION: [&str; 5] = [
    "studentName",
    "companyName",
    "location",
    "packageLPA",
    "offerDate",
];

/// A plan lowered to the store call that answers it.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    Count(Filter),
    Find { filter: Filter, options: FindOptions },
    Aggregate(Pipeline),
}

impl CompiledQuery {
    /// Store-native JSON of the query.
    pub fn to_document(&self) -> Value {
        match self {
            Self::Count(filter) => json!({ "count": filter.to_document() }),
            Self::Find { filter, options } => {
                let sort: serde_json::Map<String, Value> = options
                    .sort
                    .iter()
                    .map(|(field, dir)| (field.clone(), json!(dir.sign())))
                    .collect();
                json!({
                    "find": filter.to_document(),
                    "projection": options.projection,
                    "sort": sort,
                    "limit": options.limit,
                })
            }
            Self::Aggregate(pipeline) => json!({ "aggregate": pipeline.to_documents() }),
        }
    }

    fn debug_parts(&self) -> (Option<Value>, Option<Value>) {
        match self {
            Self::Count(filter) | Self::Find { filter, .. } => (Some(filter.to_document()), None),
            Self::Aggregate(pipeline) => (None, Some(Value::Array(pipeline.to_documents()))),
        }
    }
}

/// A repaired plan and its compiled query, not executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub plan: UniversalPlan,
    pub query: CompiledQuery,
    /// True when the ranking heuristic replaced the model's plan
    pub ranking_override: bool,
}

impl Assistant {
    /// Answers a question through the general plan grammar.
    pub async fn ask(&self, params: &Ask) -> Result<Reply> {
        let message = require_message(&params.message)?;

        let instructions = universal_instructions(self.catalog());
        let raw = self.oracle.generate(&instructions, message).await?;
        let plan = parse_universal(&raw).inspect_err(|e| warn!("Rejected model plan: {e}"))?;
        debug!("Model plan: {}", plan.to_value());

        let explanation = self.prepare(plan, message)?;
        let answer = self.execute(&explanation).await?;

        let reply = Reply::new(answer);
        if !params.debug {
            return Ok(reply);
        }
        let (filter, pipeline) = explanation.query.debug_parts();
        Ok(reply.with_debug(Some(DebugInfo {
            raw,
            plan: explanation.plan.to_value(),
            filter,
            pipeline,
        })))
    }

    /// Validates, repairs and compiles a plan without touching the store.
    pub fn explain(&self, params: &Explain) -> Result<Explanation> {
        let plan = parse_universal(&params.plan)?;
        let message = params.message.as_deref().unwrap_or_default();
        self.prepare(plan, message)
    }

    /// Replays a stored plan instead of asking the model.
    pub async fn ask_with_plan(&self, params: &Ask, plan: &str) -> Result<Reply> {
        self.with_oracle(Arc::new(StaticOracle::new(plan)))
            .ask(params)
            .await
    }

    /// Post-processing, the ranking override, the field allow-list and
    /// compilation, in that order.
    fn prepare(&self, plan: UniversalPlan, message: &str) -> Result<Explanation> {
        let mut plan = apply_semantic_postprocessing(plan, message);

        let ranking_override = plan.kind == PlanKind::Count
            && plan.group_by.is_empty()
            && looks_like_ranking_question(message);
        if ranking_override {
            info!("Replacing count plan with a top-1 ranking aggregate");
            plan = ranking_plan(message);
        }

        // A grouped count answers "how many per group".
        if plan.kind == PlanKind::Count && !plan.group_by.is_empty() && plan.metrics.is_empty() {
            plan.metrics.push(Metric::count_as("count"));
        }

        self.catalog()
            .check_plan(&plan)
            .inspect_err(|e| warn!("Rejected plan: {e}"))?;

        let query = self.compile(&plan)?;
        Ok(Explanation {
            plan,
            query,
            ranking_override,
        })
    }

    fn compile(&self, plan: &UniversalPlan) -> Result<CompiledQuery> {
        let query = match plan.kind {
            PlanKind::Count if plan.group_by.is_empty() => {
                CompiledQuery::Count(compile_filter(plan)?)
            }
            PlanKind::List => {
                let projection = plan.projection.clone().unwrap_or_else(|| {
                    DEFAULT_LIST_PROJECTION.iter().map(ToString::to_string).collect()
                });
                let sort = if plan.sort.is_empty() {
                    vec![(DEFAULT_TIME_FIELD.to_string(), SortDirection::Asc)]
                } else {
                    plan.sort.iter().map(|key| (key.by.clone(), key.dir)).collect()
                };
                let limit = plan
                    .limit
                    .unwrap_or(self.settings().default_list_limit)
                    .min(MAX_LIMIT);
                CompiledQuery::Find {
                    filter: compile_filter(plan)?,
                    options: FindOptions {
                        projection,
                        sort,
                        limit: Some(limit),
                    },
                }
            }
            PlanKind::Count | PlanKind::Aggregate | PlanKind::Chart => {
                let pipeline = compile_aggregation(plan)?;
                pipeline
                    .ensure_read_only()
                    .inspect_err(|e| warn!("Rejected pipeline: {e}"))?;
                CompiledQuery::Aggregate(pipeline)
            }
        };
        Ok(query)
    }

    async fn execute(&self, explanation: &Explanation) -> Result<Answer> {
        let plan = &explanation.plan;
        match explanation.query.clone() {
            CompiledQuery::Count(filter) => {
                info!("Counting offers");
                let count = self.on_store(move |store| store.count(&filter)).await?;
                Ok(Answer::text(count.to_string()))
            }
            CompiledQuery::Find { filter, options } => {
                info!("Listing offers (limit {:?})", options.limit);
                let rows = self
                    .on_store(move |store| store.find(&filter, &options))
                    .await?;
                Ok(Answer::list(rows))
            }
            CompiledQuery::Aggregate(pipeline) => {
                info!("Running {}-stage aggregation", pipeline.stages.len());
                let options = self.settings().aggregate_options();
                let rows = self
                    .on_store(move |store| store.aggregate(&pipeline, &options))
                    .await?;
                if plan.kind == PlanKind::Chart {
                    return Ok(summary::chart_answer(plan, rows));
                }
                if summary::is_top_one(plan) {
                    let text = summary::top_one_text(plan, &rows)?;
                    return Ok(Answer::Text {
                        text,
                        data: Some(rows),
                    });
                }
                Ok(Answer::list(rows))
            }
        }
    }

    /// Runs an operator-supplied pipeline through the read-only gate and the
    /// execution budget.
    pub async fn run_pipeline(&self, pipeline: &Value) -> Result<Vec<Value>> {
        let pipeline = Pipeline::parse(pipeline)?;
        pipeline
            .ensure_read_only()
            .inspect_err(|e| warn!("Rejected pipeline: {e}"))?;
        let options = self.settings().aggregate_options();
        self.on_store(move |store| store.aggregate(&pipeline, &options))
            .await
    }
}
