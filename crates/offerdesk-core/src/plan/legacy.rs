//! The intent-based plan used by the chat assistant.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use super::{universal::wire_enum, ChartKind};

/// The four questions the chat assistant knows how to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CountPlacements,
    ListPlacements,
    ChartPlacementsByStudent,
    ChartMonthlyTrend,
}

wire_enum!(Intent {
    CountPlacements => "COUNT_PLACEMENTS",
    ListPlacements => "LIST_PLACEMENTS",
    ChartPlacementsByStudent => "CHART_PLACEMENTS_BY_STUDENT",
    ChartMonthlyTrend => "CHART_MONTHLY_TREND",
});

/// Optional month/year reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlanTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
}

/// Case-insensitive substring filters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PlanFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChartKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_keys: Option<Vec<String>>,
}

/// Validated intent plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<PlanTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<PlanFilters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<PlanChart>,
}

impl Plan {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            time: None,
            filters: None,
            chart: None,
        }
    }

    /// Fills month and year from `inferred` where the plan left them empty.
    ///
    /// A month without a year falls back to `current_year`.
    pub fn fill_time(&mut self, inferred: PlanTime, current_year: i16) {
        let time = self.time.get_or_insert_with(PlanTime::default);
        if time.month.is_none() {
            time.month = inferred.month;
        }
        if time.year.is_none() {
            time.year = inferred.year;
        }
        if time.month.is_some() && time.year.is_none() {
            time.year = Some(current_year);
        }
    }

    /// Chart descriptor if the model supplied a complete one.
    pub fn complete_chart(&self) -> Option<(ChartKind, String, Vec<String>)> {
        let chart = self.chart.as_ref()?;
        match (&chart.kind, &chart.x_key, &chart.y_keys) {
            (Some(kind), Some(x), Some(y)) if !y.is_empty() => Some((*kind, x.clone(), y.clone())),
            _ => None,
        }
    }
}
