//! Window debug reports: what the store holds for one civil month or year.

use jiff::Timestamp;
use log::info;
use serde::Serialize;
use serde_json::Value;

use super::Assistant;
use crate::{
    error::{DeskError, Result},
    params::{MonthWindow, YearWindow},
    plan::{
        GroupKey, Intent, Metric, Plan, PlanKind, PlanTime, SortDirection, SortKey, TimeRange,
        TimeUnit, UniversalPlan, DEFAULT_TIME_FIELD,
    },
    query::{build_legacy_filter, compile_aggregation},
    store::FindOptions,
    time_window::{civil_date, civil_zone, current_civil_year, month_range, TimeWindow},
};

const SAMPLE_SIZE: u32 = 10;

const SAMPLE_FIELDS: [&str; 5] = [
    "studentName",
    "companyName",
    "offerDate",
    "packageLPA",
    "location",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthReport {
    pub year: i16,
    pub month: u8,
    pub window: TimeWindow,
    pub count: u64,
    /// First offers of the month by offer date
    pub sample: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: u8,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearReport {
    pub year: i16,
    /// Months with at least one offer, in calendar order
    pub months: Vec<MonthCount>,
}

impl YearReport {
    pub fn total(&self) -> u64 {
        self.months.iter().map(|m| m.count).sum()
    }
}

/// Per-month count aggregate over one civil year.
fn monthly_counts_plan(year: i16) -> UniversalPlan {
    let bucket = GroupKey::time_bucket(DEFAULT_TIME_FIELD, TimeUnit::Month);
    UniversalPlan {
        kind: PlanKind::Aggregate,
        time_range: Some(TimeRange::for_year(year)),
        sort: vec![SortKey::new(bucket.output_name(), SortDirection::Asc)],
        group_by: vec![bucket],
        metrics: vec![Metric::count_as("count")],
        ..Default::default()
    }
}

fn month_count(row: &Value, bucket_field: &str) -> Result<Option<MonthCount>> {
    let Some(instant) = row
        .get(bucket_field)
        .and_then(Value::as_str)
        .and_then(|text| text.parse::<Timestamp>().ok())
    else {
        return Ok(None);
    };
    let count = row.get("count").and_then(Value::as_u64).ok_or_else(|| {
        DeskError::execution(format!("aggregate row without a count: {row}"))
    })?;
    let month = civil_date(instant, &civil_zone()?).month() as u8;
    Ok(Some(MonthCount { month, count }))
}

impl Assistant {
    /// Count and first offers of one civil month.
    pub async fn month_report(&self, params: &MonthWindow) -> Result<MonthReport> {
        params.validate()?;
        let (year, month) = (params.year, params.month);
        let plan = Plan {
            time: Some(PlanTime {
                year: Some(year),
                month: Some(month),
            }),
            ..Plan::new(Intent::CountPlacements)
        };
        let filter = build_legacy_filter(&plan)?;
        let options = FindOptions {
            projection: SAMPLE_FIELDS.iter().map(ToString::to_string).collect(),
            sort: vec![(DEFAULT_TIME_FIELD.to_string(), SortDirection::Asc)],
            limit: Some(SAMPLE_SIZE),
        };

        info!("Month report for {year}-{month:02}");
        let (count, sample) = self
            .on_store(move |store| Ok((store.count(&filter)?, store.find(&filter, &options)?)))
            .await?;

        Ok(MonthReport {
            year,
            month,
            window: month_range(year, month)?,
            count,
            sample,
        })
    }

    /// Offers per civil month of a year, the current year by default.
    pub async fn year_report(&self, params: &YearWindow) -> Result<YearReport> {
        params.validate()?;
        let year = match params.year {
            Some(year) => year,
            None => current_civil_year()?,
        };
        let plan = monthly_counts_plan(year);
        let bucket_field = plan.group_by[0].output_name();
        let pipeline = compile_aggregation(&plan)?;
        let options = self.settings().aggregate_options();

        info!("Year report for {year}");
        let rows = self
            .on_store(move |store| store.aggregate(&pipeline, &options))
            .await?;

        let mut months = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(count) = month_count(row, &bucket_field)? {
                months.push(count);
            }
        }
        Ok(YearReport { year, months })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_monthly_counts_pipeline() {
        let pipeline = compile_aggregation(&monthly_counts_plan(2025)).unwrap();
        let docs = Value::Array(pipeline.to_documents());
        assert_eq!(docs[1]["$addFields"]["__tb0"]["$dateTrunc"]["unit"], "month");
        assert_eq!(docs[4], json!({"$sort": {"offerDate_month": 1}}));
    }

    #[test]
    fn test_month_count_uses_civil_month() {
        let row = json!({"offerDate_month": "2025-06-30T18:30:00Z", "count": 3});
        assert_eq!(
            month_count(&row, "offerDate_month").unwrap(),
            Some(MonthCount { month: 7, count: 3 })
        );
        let row = json!({"offerDate_month": null, "count": 1});
        assert_eq!(month_count(&row, "offerDate_month").unwrap(), None);
    }

    #[test]
    fn test_year_report_total() {
        let report = YearReport {
            year: 2025,
            months: vec![
                MonthCount { month: 7, count: 2 },
                MonthCount { month: 8, count: 1 },
            ],
        };
        assert_eq!(report.total(), 3);
    }
}
