//! Plan grammars and their validation boundary.
//!
//! Two grammars exist side by side:
//!
//! - [`UniversalPlan`]: filters, a time window, grouping, metrics, sort and
//!   limit. Compiled by [`crate::query`] into store queries.
//! - [`Plan`]: the older intent-based grammar with four fixed questions,
//!   answered by the chat assistant.
//!
//! Both are produced by an untrusted model, so the only way to obtain one
//! from text is [`parse_universal`] / [`parse_legacy`], which reject
//! anything off-grammar with a structured issue list.

mod legacy;
mod universal;
mod validate;


pub use legacy::{Intent, Plan, PlanChart, PlanFilters, PlanTime};
pub use universal::{
    ChartKind, ChartSpec, Condition, FilterOp, GroupKey, Metric, MetricOp, PlanKind,
    SortDirection, SortKey, TimeBucket, TimeRange, TimeUnit, UniversalPlan, DEFAULT_TIME_FIELD,
    MAX_PLAN_LIMIT,
};
pub use validate::{parse_legacy, parse_universal, validate_legacy, validate_universal, YEAR_RANGE};
