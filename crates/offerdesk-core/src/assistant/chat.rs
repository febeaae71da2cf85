//! The intent-based flow.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{json, Value};

use super::{require_message, Assistant};
use crate::{
    error::Result,
    infer::infer_time,
    models::{Answer, ChartDescriptor, Reply},
    oracle::{legacy_instructions, StaticOracle},
    params::{Chat, YearWindow},
    plan::{parse_legacy, ChartKind, Intent, Plan, PlanTime, SortDirection, DEFAULT_TIME_FIELD},
    query::{build_legacy_filter, Filter, Pipeline, Projection, Stage},
    store::FindOptions,
    time_window::{current_civil_year, month_name},
};

const LIST_FIELDS: [&str; 5] = [
    "studentName",
    "companyName",
    "location",
    "packageLPA",
    "offerDate",
];

/// "July 2025", "2025" or nothing.
fn when_text(time: PlanTime) -> Option<String> {
    match (time.year, time.month) {
        (Some(year), Some(month)) => Some(format!("{} {year}", month_name(month))),
        (Some(year), None) => Some(year.to_string()),
        _ => None,
    }
}

/// Name-sorted `studentName`/`packageLPA` rows over a match.
fn students_pipeline(filter: Filter) -> Pipeline {
    Pipeline::new(vec![
        Stage::Match(filter),
        Stage::Project(vec![
            ("_id".to_string(), Projection::Exclude),
            ("studentName".to_string(), Projection::Include),
            ("packageLPA".to_string(), Projection::Include),
        ]),
        Stage::Sort(vec![("studentName".to_string(), SortDirection::Asc)]),
    ])
}

impl Assistant {
    /// Answers a question through the intent grammar.
    pub async fn chat(&self, params: &Chat) -> Result<Reply> {
        let message = require_message(&params.message)?;

        let raw = self.oracle.generate(&legacy_instructions(), message).await?;
        let mut plan = parse_legacy(&raw).inspect_err(|e| warn!("Rejected model plan: {e}"))?;
        plan.fill_time(infer_time(message).into(), current_civil_year()?);
        debug!("Intent plan: {}", serde_json::to_string(&plan)?);

        let answer = match plan.intent {
            Intent::CountPlacements => self.count_placements(&plan).await?,
            Intent::ListPlacements => self.list_placements(&plan).await?,
            Intent::ChartPlacementsByStudent => self.chart_by_student(&plan).await?,
            Intent::ChartMonthlyTrend => {
                let year = plan.time.and_then(|time| time.year);
                self.monthly_trend(YearWindow { year }).await?
            }
        };
        Ok(Reply::new(answer))
    }

    /// Replays a stored intent plan instead of asking the model.
    pub async fn chat_with_plan(&self, params: &Chat, plan: &str) -> Result<Reply> {
        self.with_oracle(Arc::new(StaticOracle::new(plan)))
            .chat(params)
            .await
    }

    async fn count_placements(&self, plan: &Plan) -> Result<Answer> {
        let filter = build_legacy_filter(plan)?;
        info!("Counting placements");
        let count = self.on_store(move |store| store.count(&filter)).await?;
        let when = when_text(plan.time.unwrap_or_default())
            .map(|when| format!(" in {when}"))
            .unwrap_or_default();
        Ok(Answer::text(format!("Students placed{when}: {count}.")))
    }

    async fn list_placements(&self, plan: &Plan) -> Result<Answer> {
        let filter = build_legacy_filter(plan)?;
        let options = FindOptions {
            projection: LIST_FIELDS.iter().map(ToString::to_string).collect(),
            sort: vec![(DEFAULT_TIME_FIELD.to_string(), SortDirection::Asc)],
            limit: None,
        };
        info!("Listing placements");
        let rows = self
            .on_store(move |store| store.find(&filter, &options))
            .await?;
        Ok(Answer::list(rows))
    }

    async fn chart_by_student(&self, plan: &Plan) -> Result<Answer> {
        let pipeline = students_pipeline(build_legacy_filter(plan)?);
        let options = self.settings().aggregate_options();
        info!("Charting placements by student");
        let data = self
            .on_store(move |store| store.aggregate(&pipeline, &options))
            .await?;

        let time = plan.time.unwrap_or_default();
        let when = match (time.year, time.month) {
            (Some(_), Some(_)) => when_text(time).map(|when| format!(" in {when}")),
            _ => None,
        }
        .unwrap_or_default();
        let plural = if data.len() == 1 { "" } else { "s" };
        let summary = format!("{} student{plural} placed{when}.", data.len());

        let (kind, x_key, y_keys) = plan.complete_chart().unwrap_or_else(|| {
            (
                ChartKind::Bar,
                "studentName".to_string(),
                vec!["packageLPA".to_string()],
            )
        });
        Ok(Answer::Chart {
            chart: ChartDescriptor {
                kind,
                x_key,
                y_keys,
            },
            data,
            summary: Some(summary),
            unit: Some("LPA".to_string()),
        })
    }

    /// Line chart of placements per civil month of a year.
    async fn monthly_trend(&self, window: YearWindow) -> Result<Answer> {
        let report = self.year_report(&window).await?;
        let data: Vec<Value> = report
            .months
            .iter()
            .map(|row| json!({ "month": month_name(row.month), "count": row.count }))
            .collect();
        Ok(Answer::Chart {
            chart: ChartDescriptor {
                kind: ChartKind::Line,
                x_key: "month".to_string(),
                y_keys: vec!["count".to_string()],
            },
            data,
            summary: Some(format!("Monthly placement trend for {}.", report.year)),
            unit: None,
        })
    }
}
