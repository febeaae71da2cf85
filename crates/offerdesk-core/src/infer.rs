//! Lexical heuristics over the raw question.
//!
//! These never replace the model. They fill a time reference the model left
//! out, repair a plain count that should have been a ranking, and add the
//! fee filters a question about dues obviously implies. Matching is plain
//! keyword search over the lowercased text and is knowingly imprecise.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use crate::plan::{
    Condition, FilterOp, GroupKey, Metric, PlanKind, PlanTime, SortDirection, SortKey, TimeRange,
    TimeUnit, UniversalPlan, DEFAULT_TIME_FIELD,
};

/// Fee field the dues heuristics filter on.
pub const REMAINING_FEE_FIELD: &str = "remainingFee";

/// Month spellings, January first. The first month with any hit wins.
const MONTH_WORDS: [&[&str]; 12] = [
    &["january", "jan"],
    &["february", "feb"],
    &["march", "mar"],
    &["april", "apr"],
    &["may"],
    &["june", "jun"],
    &["july", "jul"],
    &["august", "aug"],
    &["september", "sep", "sept"],
    &["october", "oct"],
    &["november", "nov"],
    &["december", "dec"],
];

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());
static SUPERLATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"most|maximum|highest|top|max|peak").unwrap());
static PLACEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"plac|hired|hire|placement").unwrap());
static PLACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"plac|placement|placed|offer").unwrap());
static OUTSTANDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"remaining|outstanding|due|dues|balance|unpaid").unwrap());
static PAID_IN_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"paid in full|no due|no dues|0 due|zero due|account closed").unwrap()
});

/// Month and year mentioned in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InferredTime {
    pub month: Option<u8>,
    pub year: Option<i16>,
}

impl From<InferredTime> for PlanTime {
    fn from(inferred: InferredTime) -> Self {
        PlanTime {
            year: inferred.year,
            month: inferred.month,
        }
    }
}

pub fn infer_time(message: &str) -> InferredTime {
    let text = message.to_lowercase();
    let month = MONTH_WORDS
        .iter()
        .position(|words| words.iter().any(|word| text.contains(word)))
        .map(|i| i as u8 + 1);
    let year = YEAR
        .captures(&text)
        .and_then(|caps| caps[1].parse::<i16>().ok());
    InferredTime { month, year }
}

/// True for "which X had the most placements"-style questions.
pub fn looks_like_ranking_question(message: &str) -> bool {
    let text = message.to_lowercase();
    SUPERLATIVE.is_match(&text) && PLACEMENT.is_match(&text)
}

/// Grouping dimension a ranking question is most likely about.
pub fn guess_group_by(message: &str) -> GroupKey {
    let text = message.to_lowercase();
    if text.contains("month") {
        GroupKey::time_bucket(DEFAULT_TIME_FIELD, TimeUnit::Month)
    } else if text.contains("company") {
        GroupKey::field("companyName")
    } else if text.contains("location") || text.contains("city") {
        GroupKey::field("location")
    } else {
        GroupKey::time_bucket(DEFAULT_TIME_FIELD, TimeUnit::Month)
    }
}

/// Repairs a model plan against the wording of the question.
///
/// Drops an `offerDate exists` filter the question never asked for, and
/// adds `remainingFee > 0` / `remainingFee <= 0` for questions about open
/// or settled dues. Applying it twice yields the same plan.
pub fn apply_semantic_postprocessing(mut plan: UniversalPlan, message: &str) -> UniversalPlan {
    let text = message.to_lowercase();

    if !PLACED.is_match(&text) {
        plan.filters
            .retain(|c| !(c.field == DEFAULT_TIME_FIELD && c.op == FilterOp::Exists));
    }
    if OUTSTANDING.is_match(&text) && !plan.has_condition(REMAINING_FEE_FIELD, FilterOp::Gt) {
        plan.filters
            .push(Condition::new(REMAINING_FEE_FIELD, FilterOp::Gt).with_value(json!(0)));
    }
    if PAID_IN_FULL.is_match(&text) && !plan.has_condition(REMAINING_FEE_FIELD, FilterOp::Lte) {
        plan.filters
            .push(Condition::new(REMAINING_FEE_FIELD, FilterOp::Lte).with_value(json!(0)));
    }
    plan
}

/// The top-1 aggregate substituted for a count that was really a ranking.
pub fn ranking_plan(message: &str) -> UniversalPlan {
    UniversalPlan {
        kind: PlanKind::Aggregate,
        filters: vec![Condition::new(DEFAULT_TIME_FIELD, FilterOp::Exists)],
        time_range: infer_time(message).year.map(TimeRange::for_year),
        group_by: vec![guess_group_by(message)],
        metrics: vec![Metric::count_as("count")],
        sort: vec![SortKey::new("count", SortDirection::Desc)],
        limit: Some(1),
        ..Default::default()
    }
}
