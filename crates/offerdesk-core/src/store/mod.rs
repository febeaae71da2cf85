//! The document store the assistant queries.
//!
//! [`OfferStore`] is the seam: `count`, `find` and `aggregate` over filters
//! and pipelines built by [`crate::query`]. [`SqliteStore`] implements it on
//! top of [`crate::db::Database`], narrowing by offer date in SQL and
//! evaluating everything else with [`eval`].

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use serde_json::Value;
use tokio::task;

use crate::{
    db::{Database, ImportSummary, OfferDateRange, OfferRow},
    error::{DeskError, Result},
    models::Offer,
    plan::{SortDirection, DEFAULT_TIME_FIELD},
    query::{Filter, Operand, Pipeline, Predicate, Stage},
};

pub mod eval;

use eval::{Deadline, Limits};

/// Default cap on documents a blocking stage may hold when disk use is off.
pub const DEFAULT_ROW_BUDGET: usize = 100_000;

/// Options for [`OfferStore::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Top-level fields to return; empty returns whole documents
    pub projection: Vec<String>,
    pub sort: Vec<(String, SortDirection)>,
    pub limit: Option<u32>,
}

/// Options for [`OfferStore::aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub max_time: Duration,
    pub allow_disk_use: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            max_time: Duration::from_secs(10),
            allow_disk_use: false,
        }
    }
}

/// Read access to placement offers.
pub trait OfferStore: Send + Sync {
    fn count(&self, filter: &Filter) -> Result<u64>;

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Value>>;

    /// Runs a pipeline. Implementations must refuse write stages.
    fn aggregate(&self, pipeline: &Pipeline, options: &AggregateOptions) -> Result<Vec<Value>>;
}

/// Offer store backed by a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    row_budget: usize,
}

impl SqliteStore {
    /// Opens the store, creating the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        Database::new(&db_path)?;
        Ok(Self {
            db_path,
            row_budget: DEFAULT_ROW_BUDGET,
        })
    }

    pub fn with_row_budget(mut self, row_budget: usize) -> Self {
        self.row_budget = row_budget;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Upserts offers by dedupe key, recomputing each remaining fee first.
    pub fn import_offers(&self, offers: Vec<Offer>) -> Result<ImportSummary> {
        let rows = offers
            .into_iter()
            .map(|mut offer| {
                offer.recompute_remaining_fee();
                Ok(OfferRow {
                    dedupe_key: offer.dedupe_key()?,
                    offer_date_ms: offer.offer_date.map(|t| t.as_millisecond()),
                    document: offer.to_document()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut db = Database::new(&self.db_path)?;
        let summary = db.upsert_offers(&rows)?;
        debug!(
            "Imported offers: {} inserted, {} updated",
            summary.inserted, summary.updated
        );
        Ok(summary)
    }

    /// Reads a JSON array of offers from `path` and imports it.
    pub async fn import_file(&self, path: PathBuf) -> Result<ImportSummary> {
        let store = self.clone();
        task::spawn_blocking(move || store.import_offers(read_offers(&path)?))
            .await
            .map_err(|e| DeskError::Configuration {
                message: format!("Task join error: {e}"),
            })?
    }

    /// Total stored offers, unfiltered.
    pub fn total(&self) -> Result<u64> {
        Database::new(&self.db_path)?.count_offers()
    }

    fn load(&self, filter: Option<&Filter>) -> Result<Vec<Value>> {
        let range = filter.map(offer_date_pushdown).unwrap_or_default();
        let db = Database::new(&self.db_path)?;
        let documents = db.load_documents(range)?;
        debug!(
            "Loaded {} documents (offer date range {:?}..={:?})",
            documents.len(),
            range.min_ms,
            range.max_ms
        );
        Ok(documents)
    }
}

/// Reads a JSON array of offer records.
pub fn read_offers<P: AsRef<Path>>(path: P) -> Result<Vec<Offer>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| DeskError::FileSystem {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Inclusive millisecond bounds implied by instant predicates on the offer
/// date. Never narrower than the predicate; the evaluator re-checks.
fn offer_date_pushdown(filter: &Filter) -> OfferDateRange {
    let ms = |operand: &Option<Operand>| match operand {
        Some(Operand::Instant(instant)) => Some(instant.as_millisecond()),
        _ => None,
    };
    match filter.get(DEFAULT_TIME_FIELD) {
        Some(Predicate::Equals(Operand::Instant(instant))) => OfferDateRange {
            min_ms: Some(instant.as_millisecond()),
            max_ms: Some(instant.as_millisecond()),
        },
        Some(Predicate::Operators(ops)) => OfferDateRange {
            min_ms: ms(&ops.gte).or(ms(&ops.gt)),
            max_ms: ms(&ops.lt).or(ms(&ops.lte)),
        },
        _ => OfferDateRange::default(),
    }
}

impl OfferStore for SqliteStore {
    fn count(&self, filter: &Filter) -> Result<u64> {
        let documents = self.load(Some(filter))?;
        let matched = eval::filter_documents(documents, filter, &Deadline::none())?;
        Ok(matched.len() as u64)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Value>> {
        let documents = self.load(Some(filter))?;
        let mut matched = eval::filter_documents(documents, filter, &Deadline::none())?;
        eval::sort_documents(&mut matched, &options.sort);
        if let Some(limit) = options.limit {
            matched.truncate(limit as usize);
        }
        if options.projection.is_empty() {
            return Ok(matched);
        }
        Ok(matched
            .iter()
            .map(|document| eval::project_fields(document, &options.projection))
            .collect())
    }

    fn aggregate(&self, pipeline: &Pipeline, options: &AggregateOptions) -> Result<Vec<Value>> {
        pipeline.ensure_read_only()?;
        let limits = Limits {
            deadline: Deadline::after(options.max_time),
            row_budget: (!options.allow_disk_use).then_some(self.row_budget),
        };
        let leading = match pipeline.stages.first() {
            Some(Stage::Match(filter)) => Some(filter),
            _ => None,
        };
        let documents = self.load(leading)?;
        eval::run_pipeline(documents, pipeline, &limits)
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{query::Operators, time_window::month_range};

    fn store_with(offers: Value) -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(temp_dir.path().join("offers.db")).unwrap();
        let offers: Vec<Offer> = serde_json::from_value(offers).unwrap();
        store.import_offers(offers).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_pushdown_uses_inclusive_bounds() {
        let window = month_range(2025, 7).unwrap();
        let mut filter = Filter::new();
        filter.set("offerDate", Predicate::Operators(Operators::window(window)));
        let range = offer_date_pushdown(&filter);
        assert_eq!(range.min_ms, Some(window.start.as_millisecond()));
        assert_eq!(range.max_ms, Some(window.end.as_millisecond()));

        let mut filter = Filter::new();
        filter.set("offerDate", Predicate::Operators(Operators::not_null()));
        assert!(offer_date_pushdown(&filter).is_unbounded());
    }

    #[test]
    fn test_window_end_instant_is_excluded() {
        let (store, _dir) = store_with(json!([
            {"studentName": "A", "companyName": "X", "offerDate": "2025-06-30T18:30:00Z"},
            {"studentName": "B", "companyName": "X", "offerDate": "2025-07-31T18:29:59Z"},
            {"studentName": "C", "companyName": "X", "offerDate": "2025-07-31T18:30:00Z"},
            {"studentName": "D", "companyName": "X"}
        ]));
        let mut filter = Filter::new();
        filter.set(
            "offerDate",
            Predicate::Operators(Operators::window(month_range(2025, 7).unwrap())),
        );
        assert_eq!(store.count(&filter).unwrap(), 2);
        assert_eq!(store.total().unwrap(), 4);
    }

    #[test]
    fn test_find_sorts_limits_and_projects() {
        let (store, _dir) = store_with(json!([
            {"studentName": "Late", "companyName": "X", "offerDate": "2025-07-20T05:00:00Z"},
            {"studentName": "Early", "companyName": "Y", "offerDate": "2025-07-02T05:00:00Z"}
        ]));
        let rows = store
            .find(
                &Filter::new(),
                &FindOptions {
                    projection: vec!["studentName".to_string()],
                    sort: vec![("offerDate".to_string(), SortDirection::Asc)],
                    limit: Some(1),
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["studentName"], "Early");
        assert!(rows[0].get("companyName").is_none());
        assert!(rows[0].get("_id").is_some());
    }

    #[test]
    fn test_aggregate_refuses_write_stage() {
        let (store, _dir) = store_with(json!([]));
        let pipeline = Pipeline::parse(&json!([{"$merge": "elsewhere"}])).unwrap();
        let err = store
            .aggregate(&pipeline, &AggregateOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeskError::UnsafePipeline { ref stage } if stage == "$merge"));
    }

    #[test]
    fn test_aggregate_row_budget() {
        let (store, _dir) = store_with(json!([
            {"studentName": "A", "companyName": "X", "offerDate": "2025-07-01T05:00:00Z"},
            {"studentName": "B", "companyName": "X", "offerDate": "2025-07-02T05:00:00Z"}
        ]));
        let store = store.with_row_budget(1);
        let pipeline =
            Pipeline::parse(&json!([{"$group": {"_id": "$companyName", "n": {"$sum": 1}}}]))
                .unwrap();

        assert!(store
            .aggregate(&pipeline, &AggregateOptions::default())
            .is_err());

        let rows = store
            .aggregate(
                &pipeline,
                &AggregateOptions {
                    allow_disk_use: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rows, vec![json!({"_id": "X", "n": 2})]);
    }

    #[test]
    fn test_equality_on_instant_pushes_down() {
        let instant: Timestamp = "2025-07-02T05:00:00Z".parse().unwrap();
        let mut filter = Filter::new();
        filter.set("offerDate", Predicate::Equals(Operand::Instant(instant)));
        let range = offer_date_pushdown(&filter);
        assert_eq!(range.min_ms, range.max_ms);
    }
}
