//! Shaping aggregate rows into answers.

use jiff::Timestamp;
use serde_json::Value;

use crate::{
    error::Result,
    models::{Answer, ChartDescriptor},
    plan::{ChartKind, GroupKey, TimeUnit, UniversalPlan},
    time_window::{civil_date, civil_zone, month_name},
};

/// True for an aggregate asking for the single largest group by count.
pub fn is_top_one(plan: &UniversalPlan) -> bool {
    !plan.group_by.is_empty() && plan.count_metric_name().is_some() && plan.limit == Some(1)
}

/// One-line answer naming the top group and its count.
pub fn top_one_text(plan: &UniversalPlan, rows: &[Value]) -> Result<String> {
    let count_field = plan
        .count_metric_name()
        .unwrap_or_else(|| "count".to_string());
    let top = rows.first();
    let n = top
        .and_then(|row| row.get(&count_field))
        .map(Value::to_string)
        .unwrap_or_else(|| "0".to_string());

    if let Some(label) = top.map(|row| bucket_label(plan, row)).transpose()?.flatten() {
        return Ok(format!("Most placements in {label}: {n} students."));
    }
    let text_of = |key: &str| top.and_then(|row| row.get(key)).and_then(Value::as_str);
    if let Some(company) = text_of("companyName") {
        return Ok(format!("Most placements by {company}: {n} students."));
    }
    if let Some(location) = text_of("location") {
        return Ok(format!("Most placements in {location}: {n} students."));
    }
    Ok(format!("Top group count: {n}."))
}

/// Civil label of the first time bucket in a row: "July 2025", or "2025"
/// for yearly buckets.
fn bucket_label(plan: &UniversalPlan, row: &Value) -> Result<Option<String>> {
    for key in &plan.group_by {
        let GroupKey::TimeBucket(bucket) = key else {
            continue;
        };
        let instant = row
            .get(key.output_name())
            .and_then(Value::as_str)
            .and_then(|text| text.parse::<Timestamp>().ok());
        if let Some(instant) = instant {
            let date = civil_date(instant, &civil_zone()?);
            let label = match bucket.unit {
                TimeUnit::Year => date.year().to_string(),
                _ => format!("{} {}", month_name(date.month() as u8), date.year()),
            };
            return Ok(Some(label));
        }
    }
    Ok(None)
}

/// Chart answer over aggregate rows. Axes come from the plan's chart hint,
/// falling back to the first group key and the metric outputs.
pub fn chart_answer(plan: &UniversalPlan, data: Vec<Value>) -> Answer {
    let hint = plan.chart.clone().unwrap_or_default();
    let x_key = hint
        .x
        .or_else(|| plan.group_by.first().map(GroupKey::output_name))
        .unwrap_or_else(|| "x".to_string());
    let y_keys = hint
        .y
        .filter(|y| !y.is_empty())
        .unwrap_or_else(|| {
            let metrics: Vec<String> = plan.metrics.iter().map(|m| m.output_name()).collect();
            if metrics.is_empty() {
                vec!["y".to_string()]
            } else {
                metrics
            }
        });
    Answer::Chart {
        chart: ChartDescriptor {
            kind: hint.kind.unwrap_or(ChartKind::Bar),
            x_key,
            y_keys,
        },
        data,
        summary: None,
        unit: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{infer::ranking_plan, plan::ChartSpec};

    #[test]
    fn test_top_month_label_is_civil() {
        let plan = ranking_plan("Which month had the most placements in 2025?");
        assert!(is_top_one(&plan));
        let rows = vec![json!({"offerDate_month": "2025-06-30T18:30:00Z", "count": 4})];
        assert_eq!(
            top_one_text(&plan, &rows).unwrap(),
            "Most placements in July 2025: 4 students."
        );
    }

    #[test]
    fn test_top_company_and_location() {
        let plan = ranking_plan("which company placed the most");
        let rows = vec![json!({"companyName": "Acme", "count": 3})];
        assert_eq!(
            top_one_text(&plan, &rows).unwrap(),
            "Most placements by Acme: 3 students."
        );

        let plan = ranking_plan("which city hired the most");
        let rows = vec![json!({"location": "Pune", "count": 2})];
        assert_eq!(
            top_one_text(&plan, &rows).unwrap(),
            "Most placements in Pune: 2 students."
        );
    }

    #[test]
    fn test_top_one_without_rows() {
        let plan = ranking_plan("which company placed the most");
        assert_eq!(top_one_text(&plan, &[]).unwrap(), "Top group count: 0.");
    }

    #[test]
    fn test_chart_axes_default_from_plan() {
        let mut plan = ranking_plan("which city placed the most");
        plan.limit = None;
        let Answer::Chart { chart, .. } = chart_answer(&plan, vec![]) else {
            panic!("expected a chart");
        };
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.x_key, "location");
        assert_eq!(chart.y_keys, vec!["count".to_string()]);

        plan.chart = Some(ChartSpec {
            kind: Some(ChartKind::Pie),
            x: Some("location".to_string()),
            y: Some(vec!["count".to_string()]),
        });
        let Answer::Chart { chart, .. } = chart_answer(&plan, vec![]) else {
            panic!("expected a chart");
        };
        assert_eq!(chart.kind, ChartKind::Pie);
    }
}
