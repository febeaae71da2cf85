//! The question-answering assistant.
//!
//! [`Assistant`] ties the pieces together for one question at a time: it
//! asks the [`PlanOracle`] for a plan, validates and repairs it, compiles it
//! into a store query, runs that query against the [`OfferStore`] and shapes
//! the rows into an [`Answer`](crate::models::Answer).
//!
//! ## Submodules
//!
//! - [`builder`]: wiring from paths and settings
//! - [`ask`]: the general plan flow, plus `explain` and operator pipelines
//! - [`chat`]: the intent-based flow
//! - [`reports`]: month and year debug reports
//! - [`summary`]: answer shaping for aggregates and charts
//!
//! Every call is independent. Nothing is cached between questions and the
//! two external calls (model, then store) run one after the other.

use std::{sync::Arc, time::Duration};

use tokio::task;

use crate::{
    catalog::FieldCatalog,
    error::{DeskError, Result},
    oracle::PlanOracle,
    store::{AggregateOptions, OfferStore},
};

pub mod ask;
pub mod builder;
pub mod chat;
pub mod reports;
pub mod summary;

pub use ask::{CompiledQuery, Explanation};
pub use builder::AssistantBuilder;
pub use reports::{MonthCount, MonthReport, YearReport};

/// Execution limits and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Time budget for one store execution
    pub max_time: Duration,
    /// Timeout for one model call
    pub oracle_timeout: Duration,
    /// Row limit for lists when the plan sets none
    pub default_list_limit: u32,
    /// Whether aggregations may spill past the in-memory row budget
    pub allow_disk_use: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_time: Duration::from_secs(10),
            oracle_timeout: Duration::from_secs(30),
            default_list_limit: 50,
            allow_disk_use: false,
        }
    }
}

impl Settings {
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            max_time: self.max_time,
            allow_disk_use: self.allow_disk_use,
        }
    }
}

/// Answers questions about placement offers.
#[derive(Clone)]
pub struct Assistant {
    oracle: Arc<dyn PlanOracle>,
    store: Arc<dyn OfferStore>,
    catalog: Arc<FieldCatalog>,
    settings: Settings,
}

impl Assistant {
    pub fn new(
        oracle: Arc<dyn PlanOracle>,
        store: Arc<dyn OfferStore>,
        catalog: FieldCatalog,
        settings: Settings,
    ) -> Self {
        Self {
            oracle,
            store,
            catalog: Arc::new(catalog),
            settings,
        }
    }

    /// The same assistant with a different model, e.g. one replaying a
    /// stored plan.
    pub fn with_oracle(&self, oracle: Arc<dyn PlanOracle>) -> Self {
        Self {
            oracle,
            ..self.clone()
        }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs a blocking store call off the async runtime.
    ///
    /// Storage-level failures are reported as execution errors; request
    /// errors the store detects (bad operators, unsafe stages) pass through.
    async fn on_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn OfferStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| DeskError::Configuration {
                message: format!("Task join error: {e}"),
            })?
            .map_err(into_execution)
    }
}

fn into_execution(error: DeskError) -> DeskError {
    match error {
        DeskError::Database { .. }
        | DeskError::FileSystem { .. }
        | DeskError::Serialization { .. } => DeskError::execution(error.to_string()),
        other => other,
    }
}

/// Rejects an empty question.
fn require_message(message: &str) -> Result<&str> {
    let message = message.trim();
    if message.is_empty() {
        return Err(DeskError::invalid_request("message required"));
    }
    Ok(message)
}
